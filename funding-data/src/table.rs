//! Presentation-agnostic export of a [`Snapshot`]: plain string rows plus a per-row
//! [`RateClass`] computed by a [`RateStyleRule`].

use crate::{
    record::{FundingRecord, MarkPrice, RETRIEVED_AT_FORMAT, Reported, Snapshot},
    normalise::format_price,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Styling class of a funding rate cell.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateClass {
    Positive,
    Negative,
    Neutral,
    Unknown,
}

/// Rate colouring rule handed to the presentation layer.
///
/// Rates strictly above `positive_threshold_pct` (in percent, eg/ `0.01` == `0.01%`) are
/// [`RateClass::Positive`], rates strictly below zero are [`RateClass::Negative`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub struct RateStyleRule {
    pub positive_threshold_pct: Decimal,
}

impl Default for RateStyleRule {
    fn default() -> Self {
        Self::new(dec!(0.01))
    }
}

impl RateStyleRule {
    pub fn new(positive_threshold_pct: Decimal) -> Self {
        Self {
            positive_threshold_pct,
        }
    }

    /// Classify a fractional funding rate (eg/ `0.0000125`).
    pub fn classify(&self, funding_rate: Reported<Decimal>) -> RateClass {
        match funding_rate {
            Reported::Unknown => RateClass::Unknown,
            Reported::Value(rate) => {
                let percent = rate * Decimal::ONE_HUNDRED;
                if percent > self.positive_threshold_pct {
                    RateClass::Positive
                } else if percent < Decimal::ZERO {
                    RateClass::Negative
                } else {
                    RateClass::Neutral
                }
            }
        }
    }
}

/// One rendered [`FundingRecord`].
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize)]
pub struct SnapshotRow {
    pub symbol: String,
    pub funding_rate: String,
    pub funding_time: String,
    pub max_leverage: String,
    pub price: String,
    pub retrieved_at: String,
    pub class: RateClass,
    /// Funding time was back-computed from the next funding boundary.
    pub derived_time: bool,
}

impl SnapshotRow {
    pub const COLUMNS: [&'static str; 6] = [
        "Symbol",
        "Funding Rate",
        "Funding Time",
        "Max Leverage",
        "Price",
        "Retrieved At",
    ];

    pub fn new(record: &FundingRecord, rule: &RateStyleRule) -> Self {
        Self {
            symbol: record.symbol.to_string(),
            funding_rate: record.funding_rate_display(),
            funding_time: record.funding_time.to_string(),
            max_leverage: record.max_leverage.to_string(),
            price: record.price_display(),
            retrieved_at: record.retrieved_at.format(RETRIEVED_AT_FORMAT).to_string(),
            class: rule.classify(record.funding_rate),
            derived_time: record
                .funding_time
                .value()
                .is_some_and(|time| time.is_derived()),
        }
    }

    /// Cells in [`Self::COLUMNS`] order.
    pub fn cells(&self) -> [&str; 6] {
        [
            &self.symbol,
            &self.funding_rate,
            &self.funding_time,
            &self.max_leverage,
            &self.price,
            &self.retrieved_at,
        ]
    }
}

/// One rendered [`MarkPrice`].
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize)]
pub struct MarkPriceRow {
    pub symbol: String,
    pub mark_price: String,
    pub retrieved_at: String,
}

impl MarkPriceRow {
    pub const COLUMNS: [&'static str; 3] = ["Symbol", "Mark Price", "Retrieved At"];
}

impl From<&MarkPrice> for MarkPriceRow {
    fn from(mark: &MarkPrice) -> Self {
        Self {
            symbol: mark.symbol.to_string(),
            mark_price: format_price(mark.price),
            retrieved_at: mark.retrieved_at.format(RETRIEVED_AT_FORMAT).to_string(),
        }
    }
}

impl Snapshot {
    /// Rendered rows, in snapshot (symbol ascending) order.
    pub fn rows(&self, rule: &RateStyleRule) -> Vec<SnapshotRow> {
        self.records
            .iter()
            .map(|record| SnapshotRow::new(record, rule))
            .collect()
    }

    /// Rendered bulk mark-price table, `None` for exchanges without a price feed.
    pub fn mark_price_rows(&self) -> Option<Vec<MarkPriceRow>> {
        self.mark_prices
            .as_ref()
            .map(|prices| prices.iter().map(MarkPriceRow::from).collect())
    }
}
