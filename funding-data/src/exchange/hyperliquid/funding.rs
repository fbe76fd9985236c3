use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

/// One entry of the [`Hyperliquid`](super::Hyperliquid)
/// `POST /info {"type": "fundingHistory", "coin": "ETH", "startTime": 1697864400000}` response.
///
/// ### Raw Payload Examples
/// ```json
/// [
///   {"coin": "ETH", "fundingRate": "0.0000125", "premium": "0.00031774", "time": 1697868000000}
/// ]
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HyperliquidFunding {
    pub coin: String,
    #[serde(default, deserialize_with = "crate::de::de_opt_decimal")]
    pub funding_rate: Option<Decimal>,
    #[serde(default, deserialize_with = "crate::de::de_opt_decimal")]
    pub premium: Option<Decimal>,
    #[serde(deserialize_with = "crate::de::de_u64_epoch_ms_as_datetime_utc")]
    pub time: DateTime<Utc>,
}

/// Most recent entry of a funding history response, `None` if it is empty.
pub fn most_recent(history: Vec<HyperliquidFunding>) -> Option<HyperliquidFunding> {
    history.into_iter().max_by_key(|entry| entry.time)
}
