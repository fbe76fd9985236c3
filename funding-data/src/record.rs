use crate::{exchange::ExchangeId, symbol::Symbol};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Timezone every displayed timestamp is converted into.
pub const REFERENCE_TZ: Tz = chrono_tz::US::Pacific;

/// Display format for funding window timestamps.
pub const FUNDING_TIME_FORMAT: &str = "%H:%M | %m/%d/%y";

/// Display format for retrieval timestamps.
pub const RETRIEVED_AT_FORMAT: &str = "%H:%M:%S | %m/%d/%y";

/// Rendered form of [`Reported::Unknown`].
pub const UNKNOWN: &str = "N/A";

/// Timestamp in the [`REFERENCE_TZ`].
pub type LocalTime = DateTime<Tz>;

/// Convert a UTC timestamp into the [`REFERENCE_TZ`].
pub fn to_reference_tz(time: DateTime<Utc>) -> LocalTime {
    time.with_timezone(&REFERENCE_TZ)
}

/// Field value as reported by an exchange, or an explicit `Unknown` sentinel when the exchange
/// did not report it (or the request for it failed).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reported<T> {
    Value(T),
    #[default]
    Unknown,
}

impl<T> Reported<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Reported::Value(value) => Some(value),
            Reported::Unknown => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Reported::Unknown)
    }

    pub fn map<U, F>(self, op: F) -> Reported<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Reported::Value(value) => Reported::Value(op(value)),
            Reported::Unknown => Reported::Unknown,
        }
    }
}

impl<T> From<Option<T>> for Reported<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Reported::Unknown, Reported::Value)
    }
}

impl<T: Display> Display for Reported<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Reported::Value(value) => value.fmt(f),
            Reported::Unknown => f.write_str(UNKNOWN),
        }
    }
}

/// Funding window timestamp.
///
/// Some exchanges only publish the *next* funding boundary, in which case the current window
/// start is back-computed and marked [`FundingTime::Derived`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(tag = "source", content = "time", rename_all = "snake_case")]
pub enum FundingTime {
    Reported(LocalTime),
    Derived(LocalTime),
}

impl FundingTime {
    pub fn time(&self) -> &LocalTime {
        match self {
            FundingTime::Reported(time) | FundingTime::Derived(time) => time,
        }
    }

    pub fn is_derived(&self) -> bool {
        matches!(self, FundingTime::Derived(_))
    }
}

impl Display for FundingTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.time().format(FUNDING_TIME_FORMAT))
    }
}

/// Normalised funding state of one symbol on one exchange.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct FundingRecord {
    pub symbol: Symbol,
    /// Fractional funding rate (eg/ `0.0000125` == `0.00125%`).
    pub funding_rate: Reported<Decimal>,
    pub funding_time: Reported<FundingTime>,
    pub max_leverage: Reported<u32>,
    /// Last traded or mark price, depending on the exchange.
    pub price: Reported<Decimal>,
    pub retrieved_at: LocalTime,
}

impl FundingRecord {
    /// Record for a symbol whose rate request failed or returned nothing. Leverage comes from
    /// listing metadata, so it survives.
    pub fn unknown(symbol: Symbol, max_leverage: Reported<u32>, retrieved_at: LocalTime) -> Self {
        Self {
            symbol,
            funding_rate: Reported::Unknown,
            funding_time: Reported::Unknown,
            max_leverage,
            price: Reported::Unknown,
            retrieved_at,
        }
    }

    /// Funding rate rendered as a fixed 6 decimal place percentage, or [`UNKNOWN`].
    pub fn funding_rate_display(&self) -> String {
        match self.funding_rate {
            Reported::Value(rate) => crate::normalise::format_rate_percent(rate),
            Reported::Unknown => UNKNOWN.to_string(),
        }
    }

    /// Price with trailing zeroes dropped and no scientific notation, or [`UNKNOWN`].
    pub fn price_display(&self) -> String {
        match self.price {
            Reported::Value(price) => crate::normalise::format_price(price),
            Reported::Unknown => UNKNOWN.to_string(),
        }
    }
}

/// Mark price of one asset from a bulk price feed.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct MarkPrice {
    pub symbol: Symbol,
    pub price: Decimal,
    pub retrieved_at: LocalTime,
}

/// Completed, immutable table of [`FundingRecord`]s for one exchange, sorted by symbol.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Snapshot {
    pub exchange: ExchangeId,
    /// Time the batch that produced this snapshot started.
    pub started_at: LocalTime,
    pub completed_at: LocalTime,
    pub records: Vec<FundingRecord>,
    /// Full bulk price feed, for exchanges that publish one.
    pub mark_prices: Option<Vec<MarkPrice>>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, symbol: &Symbol) -> Option<&FundingRecord> {
        self.records
            .binary_search_by(|record| record.symbol.cmp(symbol))
            .ok()
            .map(|index| &self.records[index])
    }
}
