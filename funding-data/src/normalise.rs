//! Conversion of raw exchange payloads into [`FundingRecord`]s.
//!
//! Every function here is pure: the caller supplies the retrieval time and listing metadata,
//! so identical payloads always produce identical records.

use crate::{
    exchange::{
        RawRate,
        apex::ticker::ApexTicker,
        hyperliquid::funding::HyperliquidFunding,
    },
    record::{FundingRecord, FundingTime, LocalTime, Reported, to_reference_tz},
    symbol::Symbol,
};
use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;

/// Decimal places of the rendered funding rate percentage.
pub const RATE_PERCENT_DP: u32 = 6;

/// Assumed funding cadence used to back-compute the current funding window from the next
/// funding boundary.
///
/// Apex settles hourly at the time of writing. Re-check the exchange documentation if the
/// cadence changes, since the derived window would silently shift.
pub const FUNDING_CADENCE: TimeDelta = TimeDelta::hours(1);

/// Normalise one symbol's raw rate payload, dispatching on the adapter variant that produced it.
///
/// `raw` is `None` when the adapter reported the symbol as absent or the request failed, in
/// which case every rate derived field is [`Reported::Unknown`].
pub fn normalise(
    symbol: Symbol,
    raw: Option<&RawRate>,
    max_leverage: Reported<u32>,
    retrieved_at: DateTime<Utc>,
) -> FundingRecord {
    let retrieved_at = to_reference_tz(retrieved_at);
    match raw {
        Some(RawRate::Ticker(ticker)) => normalise_ticker(symbol, ticker, max_leverage, retrieved_at),
        Some(RawRate::FundingHistory(funding)) => {
            normalise_funding_history(symbol, funding, max_leverage, retrieved_at)
        }
        None => FundingRecord::unknown(symbol, max_leverage, retrieved_at),
    }
}

/// Ticker-poll payload: rate and last price come from the ticker, the funding window is
/// derived from the next funding boundary.
pub fn normalise_ticker(
    symbol: Symbol,
    ticker: &ApexTicker,
    max_leverage: Reported<u32>,
    retrieved_at: LocalTime,
) -> FundingRecord {
    let funding_time = ticker
        .next_funding_time
        .as_deref()
        .and_then(|raw| {
            let parsed = parse_utc(raw);
            if parsed.is_none() {
                debug!(%symbol, raw, "unparseable nextFundingTime");
            }
            parsed
        })
        .map(|next| FundingTime::Derived(to_reference_tz(current_window_start(next))));

    FundingRecord {
        symbol,
        funding_rate: ticker.funding_rate.into(),
        funding_time: funding_time.into(),
        max_leverage,
        price: ticker.last_price.into(),
        retrieved_at,
    }
}

/// Bulk-snapshot payload: rate and time come straight from the most recent funding history
/// entry. Price is joined later from the bulk price feed.
pub fn normalise_funding_history(
    symbol: Symbol,
    funding: &HyperliquidFunding,
    max_leverage: Reported<u32>,
    retrieved_at: LocalTime,
) -> FundingRecord {
    FundingRecord {
        symbol,
        funding_rate: funding.funding_rate.into(),
        funding_time: Reported::Value(FundingTime::Reported(to_reference_tz(funding.time))),
        max_leverage,
        price: Reported::Unknown,
        retrieved_at,
    }
}

/// Start of the funding window that ends at `next_funding_time`.
pub fn current_window_start(next_funding_time: DateTime<Utc>) -> DateTime<Utc> {
    next_funding_time - FUNDING_CADENCE
}

/// Parse an ISO-8601 / RFC 3339 UTC timestamp, with or without fractional seconds.
pub fn parse_utc(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|time| time.with_timezone(&Utc))
}

/// Render a fractional funding rate as a percentage with [`RATE_PERCENT_DP`] decimal places.
///
/// eg/ `0.0000125` -> `"0.001250%"`, `0` -> `"0.000000%"`.
pub fn format_rate_percent(rate: Decimal) -> String {
    let percent = (rate * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(RATE_PERCENT_DP, RoundingStrategy::MidpointAwayFromZero);
    format!("{percent:.prec$}%", prec = RATE_PERCENT_DP as usize)
}

/// Render a price without trailing zeroes and without scientific notation.
///
/// eg/ `"64000.500"` -> `"64000.5"`, `"0.00001230"` -> `"0.0000123"`.
pub fn format_price(price: Decimal) -> String {
    price.normalize().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_format_rate_percent() {
        struct TestCase {
            input: Decimal,
            expected: &'static str,
        }

        let tests = vec![
            TestCase {
                // TC0: typical hourly rate
                input: dec!(0.0000125),
                expected: "0.001250%",
            },
            TestCase {
                // TC1: zero is a legitimate rate
                input: Decimal::ZERO,
                expected: "0.000000%",
            },
            TestCase {
                // TC2: negative rate
                input: dec!(-0.00031),
                expected: "-0.031000%",
            },
            TestCase {
                // TC3: rounding beyond 6 dp
                input: dec!(0.000012345678),
                expected: "0.001235%",
            },
            TestCase {
                // TC4: large rate
                input: dec!(0.04),
                expected: "4.000000%",
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(format_rate_percent(test.input), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_format_price() {
        struct TestCase {
            input: Decimal,
            expected: &'static str,
        }

        let tests = vec![
            TestCase {
                // TC0: trailing zeroes dropped
                input: dec!(64000.500),
                expected: "64000.5",
            },
            TestCase {
                // TC1: small magnitude without scientific notation
                input: dec!(0.00001230),
                expected: "0.0000123",
            },
            TestCase {
                // TC2: integral price keeps no decimal point
                input: dec!(3100.00),
                expected: "3100",
            },
            TestCase {
                // TC3: large magnitude
                input: dec!(123456789.1),
                expected: "123456789.1",
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(format_price(test.input), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_parse_utc() {
        assert_eq!(parse_utc("2024-01-01T05:00:00Z"), Some(utc(2024, 1, 1, 5, 0, 0)));
        assert_eq!(
            parse_utc("2024-01-01T05:00:00.000Z"),
            Some(utc(2024, 1, 1, 5, 0, 0))
        );
        assert_eq!(parse_utc("05:00 01/01/24"), None);
        assert_eq!(parse_utc(""), None);
    }

    #[test]
    fn test_normalise_ticker_derives_current_window() {
        let ticker = ApexTicker {
            symbol: "BTCUSDC".to_string(),
            funding_rate: Some(dec!(0.0000125)),
            last_price: Some(dec!(43000.50)),
            next_funding_time: Some("2024-01-01T05:00:00Z".to_string()),
        };
        let retrieved_at = to_reference_tz(utc(2024, 1, 1, 4, 30, 0));

        let record = normalise_ticker(
            Symbol::new("BTC-USDC"),
            &ticker,
            Reported::Value(100),
            retrieved_at,
        );

        let expected_time = to_reference_tz(utc(2024, 1, 1, 4, 0, 0));
        assert_eq!(
            record.funding_time,
            Reported::Value(FundingTime::Derived(expected_time))
        );
        assert_ne!(
            record.funding_time,
            Reported::Value(FundingTime::Reported(expected_time))
        );
        assert_eq!(record.funding_rate_display(), "0.001250%");
        assert_eq!(record.price_display(), "43000.5");
        assert_eq!(record.max_leverage, Reported::Value(100));
        assert_eq!(record.retrieved_at, retrieved_at);
    }

    #[test]
    fn test_normalise_ticker_missing_fields_are_unknown() {
        let ticker = ApexTicker {
            symbol: "DOGEUSDT".to_string(),
            funding_rate: None,
            last_price: None,
            next_funding_time: Some("not a timestamp".to_string()),
        };

        let record = normalise(
            Symbol::new("DOGE-USDT"),
            Some(&RawRate::Ticker(ticker)),
            Reported::Unknown,
            utc(2024, 1, 1, 0, 0, 0),
        );

        assert!(record.funding_rate.is_unknown());
        assert!(record.funding_time.is_unknown());
        assert!(record.max_leverage.is_unknown());
        assert!(record.price.is_unknown());
    }

    #[test]
    fn test_normalise_funding_history_is_reported() {
        let funding = HyperliquidFunding {
            coin: "ETH".to_string(),
            funding_rate: Some(Decimal::ZERO),
            premium: None,
            time: utc(2024, 3, 10, 10, 0, 0),
        };

        let record = normalise(
            Symbol::new("ETH"),
            Some(&RawRate::FundingHistory(funding)),
            Reported::Value(50),
            utc(2024, 3, 10, 10, 5, 0),
        );

        // 10:00Z on 2024-03-10 is after the DST switch, so PDT (UTC-7)
        assert_eq!(
            record.funding_time,
            Reported::Value(FundingTime::Reported(to_reference_tz(utc(2024, 3, 10, 10, 0, 0))))
        );
        assert_eq!(
            record.funding_time.value().map(ToString::to_string),
            Some("03:00 | 03/10/24".to_string())
        );
        assert_eq!(record.funding_rate_display(), "0.000000%");
        assert!(record.price.is_unknown());
    }

    #[test]
    fn test_normalise_absent_keeps_leverage() {
        let record = normalise(Symbol::new("XRP"), None, Reported::Value(20), utc(2024, 1, 1, 0, 0, 0));
        assert_eq!(
            record,
            FundingRecord::unknown(
                Symbol::new("XRP"),
                Reported::Value(20),
                to_reference_tz(utc(2024, 1, 1, 0, 0, 0))
            )
        );
    }
}
