use self::{
    apex::{Apex, ticker::ApexTicker},
    hyperliquid::{Hyperliquid, funding::HyperliquidFunding},
};
use crate::{
    config::{Config, ExchangeConfig},
    error::{ConfigError, FetchError},
    record::{LocalTime, MarkPrice, Reported, to_reference_tz},
    symbol::Symbol,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use derive_more::Display;
use fnv::FnvHashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{fmt::Debug, str::FromStr, sync::Arc};

/// Ticker-poll [`ExchangeAdapter`] for the Apex Pro REST API.
pub mod apex;

/// Bulk-snapshot [`ExchangeAdapter`] for the Hyperliquid info API.
pub mod hyperliquid;

/// Shared JSON REST client with a bounded request timeout.
pub mod http;

/// Unique identifier for every supported exchange.
#[derive(
    Copy,
    Clone,
    Debug,
    Display,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Deserialize,
    Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeId {
    #[display("apex")]
    Apex,
    #[display("hyperliquid")]
    Hyperliquid,
}

impl ExchangeId {
    pub const ALL: [ExchangeId; 2] = [ExchangeId::Apex, ExchangeId::Hyperliquid];

    /// Dense index, used for fixed size per exchange storage.
    pub const fn index(self) -> usize {
        match self {
            ExchangeId::Apex => 0,
            ExchangeId::Hyperliquid => 1,
        }
    }

    /// Human readable exchange name.
    pub fn name(&self) -> &'static str {
        match self {
            ExchangeId::Apex => "Apex",
            ExchangeId::Hyperliquid => "Hyperliquid",
        }
    }
}

impl FromStr for ExchangeId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "apex" => Ok(ExchangeId::Apex),
            "hyperliquid" => Ok(ExchangeId::Hyperliquid),
            other => Err(ConfigError::UnknownExchange(other.to_string())),
        }
    }
}

/// Raw, exchange specific funding payload for one symbol, prior to normalisation.
#[derive(Clone, Debug, PartialEq)]
pub enum RawRate {
    /// Per-symbol ticker (rate, last price, next funding boundary).
    Ticker(ApexTicker),
    /// Most recent funding history entry (rate, funding time).
    FundingHistory(HyperliquidFunding),
}

/// Ordered tradable symbol universe of an exchange plus per-symbol leverage metadata.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Listing {
    symbols: Vec<Symbol>,
    max_leverage: FnvHashMap<Symbol, u32>,
}

impl Listing {
    pub fn new(symbols: Vec<Symbol>, max_leverage: FnvHashMap<Symbol, u32>) -> Self {
        Self {
            symbols,
            max_leverage,
        }
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Leverage multiplier from listing metadata, `Unknown` if the exchange had no entry.
    pub fn max_leverage(&self, symbol: &Symbol) -> Reported<u32> {
        self.max_leverage.get(symbol).copied().into()
    }
}

impl FromIterator<(Symbol, Option<u32>)> for Listing {
    fn from_iter<T: IntoIterator<Item = (Symbol, Option<u32>)>>(iter: T) -> Self {
        let mut listing = Listing::default();
        for (symbol, leverage) in iter {
            if let Some(leverage) = leverage {
                listing.max_leverage.entry(symbol.clone()).or_insert(leverage);
            }
            listing.symbols.push(symbol);
        }
        listing
    }
}

/// Secondary bulk price feed covering every asset of an exchange, indexed by
/// [`Symbol::normalised`] for joining.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PriceFeed {
    prices: Vec<MarkPrice>,
    index: FnvHashMap<SmolStr, Decimal>,
}

impl PriceFeed {
    pub fn new<Iter>(prices: Iter, retrieved_at: DateTime<Utc>) -> Self
    where
        Iter: IntoIterator<Item = (Symbol, Decimal)>,
    {
        let retrieved_at: LocalTime = to_reference_tz(retrieved_at);
        let prices = prices
            .into_iter()
            .map(|(symbol, price)| MarkPrice {
                symbol,
                price,
                retrieved_at,
            })
            .collect::<Vec<_>>();

        let index = prices
            .iter()
            .map(|mark| (mark.symbol.normalised(), mark.price))
            .collect();

        Self { prices, index }
    }

    /// Price for a symbol, `Unknown` when the feed has no matching entry.
    pub fn price(&self, symbol: &Symbol) -> Reported<Decimal> {
        self.index.get(&symbol.normalised()).copied().into()
    }

    pub fn mark_prices(&self) -> &[MarkPrice] {
        &self.prices
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// Capability to enumerate an exchange's perpetual markets and fetch per-symbol funding data.
///
/// Implementations own their HTTP timeouts: a request that exceeds it surfaces as
/// [`FetchError::Timeout`] and is treated as a per-symbol failure by the
/// [`BatchFetcher`](crate::batch::BatchFetcher).
#[async_trait]
pub trait ExchangeAdapter: Debug + Send + Sync {
    fn id(&self) -> ExchangeId;

    /// Ordered symbol universe. Fails with [`FetchError::UpstreamUnavailable`] if the metadata
    /// endpoint is unreachable or returns malformed JSON.
    async fn list_symbols(&self) -> Result<Listing, FetchError>;

    /// Raw funding payload for one symbol, `None` if the exchange reported nothing for it.
    async fn fetch_rate(&self, symbol: &Symbol) -> Result<Option<RawRate>, FetchError>;

    /// Secondary bulk price feed, for exchanges whose rate payload carries no price.
    async fn fetch_prices(&self) -> Result<Option<PriceFeed>, FetchError> {
        Ok(None)
    }
}

/// Construct the [`ExchangeAdapter`] for an [`ExchangeId`] from its configuration.
pub fn build_adapter(
    exchange: ExchangeId,
    config: &Config,
) -> Result<Arc<dyn ExchangeAdapter>, ConfigError> {
    let ExchangeConfig { base_url, .. } = config.exchange(exchange);
    let adapter: Arc<dyn ExchangeAdapter> = match exchange {
        ExchangeId::Apex => Arc::new(Apex::new(base_url, config.http_timeout)?),
        ExchangeId::Hyperliquid => Arc::new(Hyperliquid::new(base_url, config.http_timeout)?),
    };
    Ok(adapter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_exchange_id_from_str() {
        assert_eq!("apex".parse::<ExchangeId>().unwrap(), ExchangeId::Apex);
        assert_eq!(" Hyperliquid ".parse::<ExchangeId>().unwrap(), ExchangeId::Hyperliquid);
        assert!("binance".parse::<ExchangeId>().is_err());
        assert_eq!(ExchangeId::Hyperliquid.to_string(), "hyperliquid");
    }

    #[test]
    fn test_listing_keeps_order_and_first_leverage() {
        let listing = Listing::from_iter([
            (Symbol::new("ETH-USDC"), Some(50)),
            (Symbol::new("BTC-USDC"), None),
            (Symbol::new("ETH-USDC"), Some(20)),
        ]);

        assert_eq!(
            listing.symbols(),
            &[
                Symbol::new("ETH-USDC"),
                Symbol::new("BTC-USDC"),
                Symbol::new("ETH-USDC")
            ]
        );
        assert_eq!(listing.max_leverage(&Symbol::new("ETH-USDC")), Reported::Value(50));
        assert_eq!(listing.max_leverage(&Symbol::new("BTC-USDC")), Reported::Unknown);
    }

    #[test]
    fn test_price_feed_joins_on_normalised_symbol() {
        let feed = PriceFeed::new(
            [
                (Symbol::new("BTC"), dec!(64000.5)),
                (Symbol::new("kPEPE"), dec!(0.0123)),
            ],
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        );

        assert_eq!(feed.price(&Symbol::new("BTC")), Reported::Value(dec!(64000.5)));
        assert_eq!(feed.price(&Symbol::new("kPEPE")), Reported::Value(dec!(0.0123)));
        assert_eq!(feed.price(&Symbol::new("KPEPE")), Reported::Unknown);
        assert_eq!(feed.price(&Symbol::new("SOL")), Reported::Unknown);
        assert_eq!(feed.len(), 2);
    }
}
