use crate::{
    batch::BatchConfig,
    de::parse_decimal,
    exchange::{ExchangeId, apex::BASE_URL_APEX, hyperliquid::BASE_URL_HYPERLIQUID},
    symbol::Symbol,
    table::RateStyleRule,
};
use std::{fmt::Display, str::FromStr, time::Duration};
use tracing::warn;

/// Default automatic refresh interval (15 minutes).
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Default batch wide pause after the exchange reports a rate limit.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

/// Default per request timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Per exchange settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeConfig {
    pub base_url: String,
    /// Delay between consecutive per-symbol requests.
    pub throttle: Duration,
    /// Exact-match symbols never fetched (eg/ non-tradable pseudo symbols).
    pub excluded: Vec<Symbol>,
}

/// Funding dashboard configuration, read once from the environment.
///
/// | variable | default |
/// |---|---|
/// | `FUNDING_EXCHANGES` | `apex,hyperliquid` |
/// | `FUNDING_REFRESH_INTERVAL_SECS` | `900` |
/// | `FUNDING_SYMBOL_LIMIT` | `0` (unlimited) |
/// | `FUNDING_COOLDOWN_SECS` | `60` |
/// | `FUNDING_HTTP_TIMEOUT_SECS` | `10` |
/// | `FUNDING_POSITIVE_THRESHOLD_PCT` | `0.01` |
/// | `APEX_BASE_URL` / `APEX_THROTTLE_MS` / `APEX_EXCLUDED` | `https://pro.apex.exchange` / `100` / none |
/// | `HYPERLIQUID_BASE_URL` / `HYPERLIQUID_THROTTLE_MS` / `HYPERLIQUID_EXCLUDED` | `https://api.hyperliquid.xyz` / `50` / none |
///
/// Exclusions are exact matches against listed perpetual symbols. The `meta` universe lists
/// perpetuals only, so spot pairs such as `PURR/USDC` never need excluding.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub exchanges: Vec<ExchangeId>,
    pub refresh_interval: Duration,
    /// Maximum symbols fetched per batch, 0 meaning unlimited.
    pub symbol_limit: usize,
    pub cooldown: Duration,
    pub http_timeout: Duration,
    pub rate_style: RateStyleRule,
    pub apex: ExchangeConfig,
    pub hyperliquid: ExchangeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exchanges: ExchangeId::ALL.to_vec(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            symbol_limit: 0,
            cooldown: DEFAULT_COOLDOWN,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            rate_style: RateStyleRule::default(),
            apex: ExchangeConfig {
                base_url: BASE_URL_APEX.to_string(),
                throttle: Duration::from_millis(100),
                excluded: Vec::new(),
            },
            hyperliquid: ExchangeConfig {
                base_url: BASE_URL_HYPERLIQUID.to_string(),
                throttle: Duration::from_millis(50),
                excluded: Vec::new(),
            },
        }
    }
}

impl Config {
    /// Read configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration from an arbitrary key lookup, falling back to defaults for missing
    /// or unparseable values.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let exchanges = lookup("FUNDING_EXCHANGES")
            .map(|raw| {
                raw.split(',')
                    .filter(|name| !name.trim().is_empty())
                    .filter_map(|name| match name.parse::<ExchangeId>() {
                        Ok(exchange) => Some(exchange),
                        Err(error) => {
                            warn!(%error, "ignoring FUNDING_EXCHANGES entry");
                            None
                        }
                    })
                    .collect::<Vec<_>>()
            })
            .filter(|exchanges| !exchanges.is_empty())
            .unwrap_or(defaults.exchanges);

        let rate_style = lookup("FUNDING_POSITIVE_THRESHOLD_PCT")
            .and_then(|raw| {
                let threshold = parse_decimal(raw.trim());
                if threshold.is_none() {
                    warn!(%raw, "invalid FUNDING_POSITIVE_THRESHOLD_PCT, using default");
                }
                threshold
            })
            .map(RateStyleRule::new)
            .unwrap_or(defaults.rate_style);

        Self {
            exchanges,
            refresh_interval: secs_or(&lookup, "FUNDING_REFRESH_INTERVAL_SECS", defaults.refresh_interval),
            symbol_limit: parse_or(&lookup, "FUNDING_SYMBOL_LIMIT", defaults.symbol_limit),
            cooldown: secs_or(&lookup, "FUNDING_COOLDOWN_SECS", defaults.cooldown),
            http_timeout: secs_or(&lookup, "FUNDING_HTTP_TIMEOUT_SECS", defaults.http_timeout),
            rate_style,
            apex: exchange_from_lookup(&lookup, "APEX", defaults.apex),
            hyperliquid: exchange_from_lookup(&lookup, "HYPERLIQUID", defaults.hyperliquid),
        }
    }

    pub fn exchange(&self, exchange: ExchangeId) -> &ExchangeConfig {
        match exchange {
            ExchangeId::Apex => &self.apex,
            ExchangeId::Hyperliquid => &self.hyperliquid,
        }
    }

    /// [`BatchConfig`] for one exchange.
    pub fn batch(&self, exchange: ExchangeId) -> BatchConfig {
        let ExchangeConfig {
            throttle, excluded, ..
        } = self.exchange(exchange);

        BatchConfig {
            throttle: *throttle,
            cooldown: self.cooldown,
            symbol_limit: self.symbol_limit,
            excluded: excluded.clone(),
        }
    }

    pub fn with_exchanges(mut self, exchanges: Vec<ExchangeId>) -> Self {
        self.exchanges = exchanges;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_symbol_limit(mut self, limit: usize) -> Self {
        self.symbol_limit = limit;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_base_url(mut self, exchange: ExchangeId, base_url: impl Into<String>) -> Self {
        match exchange {
            ExchangeId::Apex => self.apex.base_url = base_url.into(),
            ExchangeId::Hyperliquid => self.hyperliquid.base_url = base_url.into(),
        }
        self
    }
}

fn exchange_from_lookup<F>(lookup: &F, prefix: &str, defaults: ExchangeConfig) -> ExchangeConfig
where
    F: Fn(&str) -> Option<String>,
{
    let base_url = lookup(&format!("{prefix}_BASE_URL"))
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .unwrap_or(defaults.base_url);

    let throttle_ms = parse_or(
        lookup,
        &format!("{prefix}_THROTTLE_MS"),
        defaults.throttle.as_millis() as u64,
    );

    let excluded = lookup(&format!("{prefix}_EXCLUDED"))
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|symbol| !symbol.is_empty())
                .map(Symbol::new)
                .collect()
        })
        .unwrap_or(defaults.excluded);

    ExchangeConfig {
        base_url,
        throttle: Duration::from_millis(throttle_ms),
        excluded,
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|error| {
            warn!(key, %raw, %error, "invalid configuration value, using default");
            default
        }),
        None => default,
    }
}

fn secs_or<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    Duration::from_secs(parse_or(lookup, key, default.as_secs()))
}
