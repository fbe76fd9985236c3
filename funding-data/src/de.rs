//! Lenient deserializers for upstream numeric fields that arrive as JSON strings, numbers,
//! empty strings or not at all.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use std::str::FromStr;
use tracing::warn;

#[derive(Deserialize)]
#[serde(untagged)]
enum StrOrNumber {
    Str(String),
    Number(serde_json::Number),
}

impl StrOrNumber {
    fn into_text(self) -> Option<String> {
        match self {
            StrOrNumber::Str(raw) if raw.trim().is_empty() => None,
            StrOrNumber::Str(raw) => Some(raw.trim().to_string()),
            StrOrNumber::Number(number) => Some(number.to_string()),
        }
    }
}

/// Parse a decimal, accepting scientific notation (eg/ `1.25e-5`).
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

/// Deserialize an optional [`Decimal`] from a string or number. Empty strings are `None`.
pub fn de_opt_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<StrOrNumber> = Option::deserialize(deserializer)?;
    match value.and_then(StrOrNumber::into_text) {
        Some(raw) => parse_decimal(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid decimal: {raw}"))),
        None => Ok(None),
    }
}

/// Deserialize an optional integer leverage multiplier from a string or number. Integral
/// decimals (eg/ `"20.00"`) are accepted.
pub fn de_opt_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<StrOrNumber> = Option::deserialize(deserializer)?;
    let Some(raw) = value.and_then(StrOrNumber::into_text) else {
        return Ok(None);
    };

    if let Ok(leverage) = raw.parse::<u32>() {
        return Ok(Some(leverage));
    }

    parse_decimal(&raw)
        .filter(|decimal| decimal.fract().is_zero() && !decimal.is_sign_negative())
        .and_then(|decimal| u32::try_from(decimal.mantissa() / 10_i128.pow(decimal.scale())).ok())
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid leverage: {raw}")))
}

/// Like [`de_opt_decimal`], but an unparseable value is logged and treated as absent, so one
/// bad element never fails a bulk payload.
pub fn de_opt_decimal_or_unknown<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(or_unknown(value, |value| de_opt_decimal(value)))
}

/// Like [`de_opt_u32`], but an unparseable value is logged and treated as unknown.
pub fn de_opt_u32_or_unknown<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(or_unknown(value, |value| de_opt_u32(value)))
}

fn or_unknown<T, F>(value: Option<serde_json::Value>, parse: F) -> Option<T>
where
    F: FnOnce(serde_json::Value) -> Result<Option<T>, serde_json::Error>,
{
    let value = value?;
    let raw = value.to_string();
    parse(value).unwrap_or_else(|error| {
        warn!(%raw, %error, "ignoring unparseable upstream field");
        None
    })
}

/// Deserialize a `u64` epoch milliseconds timestamp as a [`DateTime<Utc>`].
pub fn de_u64_epoch_ms_as_datetime_utc<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let epoch_ms = u64::deserialize(deserializer)?;
    i64::try_from(epoch_ms)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .ok_or_else(|| serde::de::Error::custom(format!("epoch ms out of range: {epoch_ms}")))
}
