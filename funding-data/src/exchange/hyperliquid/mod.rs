use self::{
    funding::{HyperliquidFunding, most_recent},
    meta::{HyperliquidMeta, HyperliquidMetaAndAssetCtxs},
};
use crate::{
    error::{ConfigError, FetchError},
    exchange::{ExchangeAdapter, ExchangeId, Listing, PriceFeed, RawRate, http::RestClient},
    symbol::Symbol,
};
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Funding history types for [`Hyperliquid`].
pub mod funding;

/// Universe metadata and bulk asset context (mark price) types for [`Hyperliquid`].
pub mod meta;

/// [`Hyperliquid`] REST server base url.
///
/// See docs: <https://hyperliquid.gitbook.io/hyperliquid-docs/for-developers/api/info-endpoint>
pub const BASE_URL_HYPERLIQUID: &str = "https://api.hyperliquid.xyz";

/// Every info request is a `POST` to this path.
pub const PATH_INFO: &str = "/info";

/// How far back funding history is requested. The most recent entry inside it is used.
pub const FUNDING_LOOKBACK: TimeDelta = TimeDelta::hours(1);

/// Body of a [`PATH_INFO`] request.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InfoRequest<'a> {
    Meta,
    MetaAndAssetCtxs,
    FundingHistory {
        coin: &'a str,
        #[serde(rename = "startTime")]
        start_time: i64,
    },
}

/// Hyperliquid bulk-snapshot adapter.
///
/// One `meta` call yields the symbol universe and leverage. Funding requires one
/// `fundingHistory` call per symbol, while mark prices for every asset arrive in a single
/// `metaAndAssetCtxs` call that is joined onto the funding table afterwards.
#[derive(Debug, Clone)]
pub struct Hyperliquid {
    rest: RestClient,
}

impl Hyperliquid {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        RestClient::new(base_url, timeout).map(|rest| Self { rest })
    }
}

#[async_trait]
impl ExchangeAdapter for Hyperliquid {
    fn id(&self) -> ExchangeId {
        ExchangeId::Hyperliquid
    }

    async fn list_symbols(&self) -> Result<Listing, FetchError> {
        let meta = self
            .rest
            .post::<_, HyperliquidMeta>(PATH_INFO, &InfoRequest::Meta)
            .await
            .map_err(|error| match error {
                FetchError::Malformed(reason) | FetchError::Timeout(reason) => {
                    FetchError::UpstreamUnavailable(reason)
                }
                other => other,
            })?;

        let listing = meta.listing();
        debug!(symbols = listing.symbols().len(), "listed Hyperliquid universe");
        Ok(listing)
    }

    async fn fetch_rate(&self, symbol: &Symbol) -> Result<Option<RawRate>, FetchError> {
        let start_time = (Utc::now() - FUNDING_LOOKBACK).timestamp_millis();
        let request = InfoRequest::FundingHistory {
            coin: symbol.as_str(),
            start_time,
        };

        self.rest
            .post::<_, Vec<HyperliquidFunding>>(PATH_INFO, &request)
            .await
            .map(|history| most_recent(history).map(RawRate::FundingHistory))
            .map_err(|error| error.for_symbol(symbol.as_str()))
    }

    async fn fetch_prices(&self) -> Result<Option<PriceFeed>, FetchError> {
        let response = self
            .rest
            .post::<_, HyperliquidMetaAndAssetCtxs>(PATH_INFO, &InfoRequest::MetaAndAssetCtxs)
            .await?;

        Ok(Some(response.price_feed(Utc::now())))
    }
}
