use crate::{
    exchange::{Listing, PriceFeed},
    symbol::Symbol,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

/// [`Hyperliquid`](super::Hyperliquid) `POST /info {"type": "meta"}` response.
///
/// ### Raw Payload Examples
/// ```json
/// {
///   "universe": [
///     {"name": "BTC", "szDecimals": 5, "maxLeverage": 50},
///     {"name": "ETH", "szDecimals": 4, "maxLeverage": 50},
///     {"name": "FTM", "szDecimals": 0, "maxLeverage": 10, "isDelisted": true}
///   ]
/// }
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct HyperliquidMeta {
    pub universe: Vec<HyperliquidAsset>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HyperliquidAsset {
    pub name: String,
    #[serde(default, deserialize_with = "crate::de::de_opt_u32_or_unknown")]
    pub max_leverage: Option<u32>,
    #[serde(default)]
    pub is_delisted: bool,
}

impl HyperliquidMeta {
    /// Listed (non-delisted) assets in universe order, with leverage metadata.
    pub fn listing(&self) -> Listing {
        self.universe
            .iter()
            .filter(|asset| !asset.is_delisted)
            .map(|asset| (Symbol::new(&asset.name), asset.max_leverage))
            .collect()
    }
}

/// Per-asset context of the `metaAndAssetCtxs` response, index aligned with
/// [`HyperliquidMeta::universe`].
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HyperliquidAssetCtx {
    #[serde(default, deserialize_with = "crate::de::de_opt_decimal_or_unknown")]
    pub mark_px: Option<Decimal>,
    #[serde(default, deserialize_with = "crate::de::de_opt_decimal_or_unknown")]
    pub funding: Option<Decimal>,
}

/// [`Hyperliquid`](super::Hyperliquid) `POST /info {"type": "metaAndAssetCtxs"}` response,
/// a two element array of `[meta, assetCtxs]`.
///
/// ### Raw Payload Examples
/// ```json
/// [
///   {"universe": [{"name": "BTC", "szDecimals": 5, "maxLeverage": 50}]},
///   [{"funding": "0.0000125", "openInterest": "688.11", "markPx": "64012.0", "oraclePx": "64030.0"}]
/// ]
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct HyperliquidMetaAndAssetCtxs(pub HyperliquidMeta, pub Vec<HyperliquidAssetCtx>);

impl HyperliquidMetaAndAssetCtxs {
    /// Pair each universe asset with its context by index. Assets without a context or
    /// without a mark price are left out of the feed.
    pub fn price_feed(&self, retrieved_at: DateTime<Utc>) -> PriceFeed {
        let Self(meta, contexts) = self;
        let prices = meta
            .universe
            .iter()
            .zip(contexts.iter())
            .filter_map(|(asset, context)| {
                context
                    .mark_px
                    .map(|mark_px| (Symbol::new(&asset.name), mark_px))
            });

        PriceFeed::new(prices, retrieved_at)
    }
}
