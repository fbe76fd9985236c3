use crate::{
    error::FetchError,
    exchange::{
        ExchangeAdapter, ExchangeId, Listing, PriceFeed, RawRate,
        apex::ticker::ApexTicker,
        hyperliquid::funding::HyperliquidFunding,
    },
    symbol::Symbol,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};
use tokio::sync::Notify;

pub fn symbols(symbols: &[&str]) -> Vec<Symbol> {
    symbols.iter().map(Symbol::new).collect()
}

pub fn listing(entries: &[(&str, Option<u32>)]) -> Listing {
    entries
        .iter()
        .map(|(symbol, leverage)| (Symbol::new(symbol), *leverage))
        .collect()
}

pub fn ticker(symbol: &str, funding_rate: Decimal, last_price: Decimal) -> RawRate {
    RawRate::Ticker(ApexTicker {
        symbol: symbol.replace('-', ""),
        funding_rate: Some(funding_rate),
        last_price: Some(last_price),
        next_funding_time: Some("2024-01-01T05:00:00Z".to_string()),
    })
}

pub fn funding(coin: &str, funding_rate: Decimal, time: DateTime<Utc>) -> RawRate {
    RawRate::FundingHistory(HyperliquidFunding {
        coin: coin.to_string(),
        funding_rate: Some(funding_rate),
        premium: None,
        time,
    })
}

type Scripted = VecDeque<Result<Option<RawRate>, FetchError>>;

/// Scripted [`ExchangeAdapter`].
///
/// Each symbol replays its queued responses in order and then keeps returning the last one.
/// Symbols with nothing queued are `Absent`.
#[derive(Debug)]
pub struct MockAdapter {
    exchange: ExchangeId,
    listing: Result<Listing, FetchError>,
    rates: Mutex<FnvHashMap<Symbol, Scripted>>,
    prices: Result<Option<PriceFeed>, FetchError>,
    gate: Option<Arc<Notify>>,
    rate_gate: Option<Arc<Notify>>,
    pub list_calls: AtomicUsize,
    pub rate_calls: Mutex<Vec<Symbol>>,
}

impl MockAdapter {
    pub fn new(exchange: ExchangeId, listing: Result<Listing, FetchError>) -> Self {
        Self {
            exchange,
            listing,
            rates: Mutex::new(FnvHashMap::default()),
            prices: Ok(None),
            gate: None,
            rate_gate: None,
            list_calls: AtomicUsize::new(0),
            rate_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_rate(self, symbol: &str, response: Result<Option<RawRate>, FetchError>) -> Self {
        self.rates
            .lock()
            .entry(Symbol::new(symbol))
            .or_default()
            .push_back(response);
        self
    }

    pub fn with_prices(mut self, prices: Result<Option<PriceFeed>, FetchError>) -> Self {
        self.prices = prices;
        self
    }

    /// Block `list_symbols` until the [`Notify`] is signalled.
    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Block every `fetch_rate` until the [`Notify`] is signalled.
    pub fn with_rate_gate(mut self, gate: Arc<Notify>) -> Self {
        self.rate_gate = Some(gate);
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn rate_calls(&self) -> Vec<Symbol> {
        self.rate_calls.lock().clone()
    }
}

#[async_trait]
impl ExchangeAdapter for MockAdapter {
    fn id(&self) -> ExchangeId {
        self.exchange
    }

    async fn list_symbols(&self) -> Result<Listing, FetchError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.listing.clone()
    }

    async fn fetch_rate(&self, symbol: &Symbol) -> Result<Option<RawRate>, FetchError> {
        self.rate_calls.lock().push(symbol.clone());
        if let Some(gate) = &self.rate_gate {
            gate.notified().await;
        }

        let mut rates = self.rates.lock();
        let Some(script) = rates.get_mut(symbol) else {
            return Ok(None);
        };

        if script.len() > 1 {
            script.pop_front().unwrap_or(Ok(None))
        } else {
            script.front().cloned().unwrap_or(Ok(None))
        }
    }

    async fn fetch_prices(&self) -> Result<Option<PriceFeed>, FetchError> {
        self.prices.clone()
    }
}
