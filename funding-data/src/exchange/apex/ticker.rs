use rust_decimal::Decimal;
use serde::Deserialize;

/// [`Apex`](super::Apex) `GET /api/v1/ticker?symbol=BTCUSDC` response.
///
/// ### Raw Payload Examples
/// ```json
/// {
///   "data": [
///     {
///       "symbol": "BTCUSDC",
///       "price24hPcnt": "0.012",
///       "lastPrice": "43000.5",
///       "fundingRate": "0.0000125",
///       "nextFundingTime": "2024-01-01T05:00:00Z"
///     }
///   ],
///   "timeCost": 101
/// }
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ApexTickerResponse {
    #[serde(default)]
    pub data: Option<Vec<ApexTicker>>,
}

impl ApexTickerResponse {
    /// First ticker of the response, `None` if the exchange returned no data.
    pub fn into_ticker(self) -> Option<ApexTicker> {
        self.data.and_then(|tickers| tickers.into_iter().next())
    }
}

/// Subset of Apex ticker fields needed to derive a funding record.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApexTicker {
    #[serde(default)]
    pub symbol: String,
    #[serde(default, deserialize_with = "crate::de::de_opt_decimal")]
    pub funding_rate: Option<Decimal>,
    #[serde(default, deserialize_with = "crate::de::de_opt_decimal")]
    pub last_price: Option<Decimal>,
    /// Next funding boundary, UTC `YYYY-MM-DDTHH:MM:SSZ`.
    #[serde(default)]
    pub next_funding_time: Option<String>,
}
