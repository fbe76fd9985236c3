use crate::exchange::ExchangeId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors an [`ExchangeAdapter`](crate::exchange::ExchangeAdapter) can return.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Error)]
pub enum FetchError {
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("rate limited by upstream: {0}")]
    RateLimited(String),

    #[error("symbol unavailable: {symbol}: {reason}")]
    SymbolUnavailable { symbol: String, reason: String },

    #[error("malformed record for {symbol}: {reason}")]
    MalformedRecord { symbol: String, reason: String },

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl FetchError {
    /// Determine if the caller must back off before retrying.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FetchError::RateLimited(_))
    }

    /// Determine if an error only affects the single symbol being fetched, meaning the batch
    /// records the symbol as unknown and moves on.
    pub fn is_per_symbol(&self) -> bool {
        matches!(
            self,
            FetchError::SymbolUnavailable { .. }
                | FetchError::MalformedRecord { .. }
                | FetchError::Timeout(_)
        )
    }

    /// Attribute a transport or decoding error to the symbol that was being fetched.
    pub fn for_symbol(self, symbol: &str) -> Self {
        match self {
            FetchError::UpstreamUnavailable(reason) => FetchError::SymbolUnavailable {
                symbol: symbol.to_string(),
                reason,
            },
            FetchError::Malformed(reason) => FetchError::MalformedRecord {
                symbol: symbol.to_string(),
                reason,
            },
            other => other,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            FetchError::Timeout(error.to_string())
        } else if error.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS) {
            FetchError::RateLimited(error.to_string())
        } else {
            FetchError::UpstreamUnavailable(error.to_string())
        }
    }
}

/// Errors raised while building a [`Config`](crate::config::Config) or its adapters.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Error)]
pub enum ConfigError {
    #[error("unknown exchange: {0}")]
    UnknownExchange(String),

    #[error("invalid base url {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Errors that terminate one exchange's batch. The previously published snapshot stays
/// readable.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Error)]
pub enum BatchError {
    #[error("{exchange} listing failed: {source}")]
    Listing {
        exchange: ExchangeId,
        source: FetchError,
    },

    #[error("{0} refresh already in flight")]
    InFlight(ExchangeId),
}

impl BatchError {
    /// Determine if the error means the exchange has no usable table for this cycle.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, BatchError::Listing { .. })
    }
}
