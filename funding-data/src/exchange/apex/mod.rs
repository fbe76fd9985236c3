use self::{symbols::ApexSymbols, ticker::ApexTickerResponse};
use crate::{
    error::{ConfigError, FetchError},
    exchange::{ExchangeAdapter, ExchangeId, Listing, RawRate, http::RestClient},
    symbol::Symbol,
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Contract configuration (symbol universe + leverage) types for [`Apex`].
pub mod symbols;

/// Per-symbol ticker (funding rate, last price, next funding time) types for [`Apex`].
pub mod ticker;

/// [`Apex`] REST server base url.
///
/// See docs: <https://api-docs.pro.apex.exchange/#publicapi-v2>
pub const BASE_URL_APEX: &str = "https://pro.apex.exchange";

/// Contract configuration endpoint, spanning the USDC and USDT configurations.
pub const PATH_SYMBOLS: &str = "/api/v2/symbols";

/// Per-symbol ticker endpoint.
pub const PATH_TICKER: &str = "/api/v1/ticker";

/// Apex Pro ticker-poll adapter.
///
/// The contract configuration endpoint yields the symbol universe and leverage, but every
/// symbol's funding rate and price require a separate ticker request.
#[derive(Debug, Clone)]
pub struct Apex {
    rest: RestClient,
}

impl Apex {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        RestClient::new(base_url, timeout).map(|rest| Self { rest })
    }

    /// Ticker endpoints take the symbol without separators (eg/ `BTC-USDC` -> `BTCUSDC`).
    pub fn ticker_symbol(symbol: &Symbol) -> String {
        symbol.normalised().to_string()
    }
}

#[async_trait]
impl ExchangeAdapter for Apex {
    fn id(&self) -> ExchangeId {
        ExchangeId::Apex
    }

    async fn list_symbols(&self) -> Result<Listing, FetchError> {
        let response = self
            .rest
            .get::<ApexSymbols>(PATH_SYMBOLS, &[])
            .await
            .map_err(|error| match error {
                FetchError::Malformed(reason) | FetchError::Timeout(reason) => {
                    FetchError::UpstreamUnavailable(reason)
                }
                other => other,
            })?;

        let data = response.data.ok_or_else(|| {
            FetchError::UpstreamUnavailable(format!("{PATH_SYMBOLS} response missing data"))
        })?;

        let listing = data.listing();
        debug!(symbols = listing.symbols().len(), "listed Apex perpetual contracts");
        Ok(listing)
    }

    async fn fetch_rate(&self, symbol: &Symbol) -> Result<Option<RawRate>, FetchError> {
        let ticker_symbol = Self::ticker_symbol(symbol);
        self.rest
            .get::<ApexTickerResponse>(PATH_TICKER, &[("symbol", ticker_symbol.as_str())])
            .await
            .map(|response| response.into_ticker().map(RawRate::Ticker))
            .map_err(|error| error.for_symbol(symbol.as_str()))
    }
}
