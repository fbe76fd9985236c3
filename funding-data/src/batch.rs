use crate::{
    error::{BatchError, FetchError},
    exchange::{ExchangeAdapter, ExchangeId, PriceFeed},
    normalise::normalise,
    record::{FundingRecord, Snapshot, to_reference_tz},
    symbol::Symbol,
};
use chrono::Utc;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Phase of one exchange's refresh cycle.
///
/// `Idle -> Listing -> Fetching -> Merged`, or `Listing -> Failed` when the symbol universe
/// cannot be listed.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPhase {
    #[default]
    Idle,
    Listing,
    Fetching,
    Merged,
    Failed,
}

/// Observable progress of the active batch. `completed` never decreases within a batch.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub struct BatchProgress {
    pub phase: BatchPhase,
    pub completed: usize,
    pub total: usize,
}

impl BatchProgress {
    pub fn is_active(&self) -> bool {
        matches!(self.phase, BatchPhase::Listing | BatchPhase::Fetching)
    }

    /// Completed fraction in `[0, 1]`, 0 before the total is known.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BatchConfig {
    /// Delay between consecutive per-symbol requests.
    pub throttle: Duration,
    /// Batch wide pause after a rate limit, before the single retry. Also the minimum gap
    /// between retries of an exchange that has never published a snapshot.
    pub cooldown: Duration,
    /// Maximum symbols fetched, 0 meaning unlimited.
    pub symbol_limit: usize,
    /// Exact-match symbols filtered out before fetching.
    pub excluded: Vec<Symbol>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            throttle: Duration::from_millis(50),
            cooldown: Duration::from_secs(60),
            symbol_limit: 0,
            excluded: Vec::new(),
        }
    }
}

/// Symbols to fetch: listed order, exclusions removed, duplicates dropped, then truncated to
/// the symbol limit.
pub fn select_symbols(listed: &[Symbol], excluded: &[Symbol], symbol_limit: usize) -> Vec<Symbol> {
    let selected = listed
        .iter()
        .filter(|symbol| !excluded.contains(symbol))
        .unique()
        .cloned();

    match symbol_limit {
        0 => selected.collect(),
        limit => selected.take(limit).collect(),
    }
}

/// Left join of a bulk price feed onto funding records by normalised symbol. Every record is
/// kept, records absent from the feed get an `Unknown` price.
pub fn merge_prices(records: &mut [FundingRecord], feed: &PriceFeed) {
    for record in records.iter_mut() {
        let price = feed.price(&record.symbol);
        if price.is_unknown() {
            debug!(symbol = %record.symbol, "no mark price for symbol");
        }
        record.price = price;
    }
}

/// Drives one exchange's refresh cycle: list, sequentially fetch every symbol, normalise and
/// merge into a [`Snapshot`].
#[derive(Debug)]
pub struct BatchFetcher {
    adapter: Arc<dyn ExchangeAdapter>,
    config: BatchConfig,
    symbol_limit: AtomicUsize,
    progress: watch::Sender<BatchProgress>,
}

impl BatchFetcher {
    pub fn new(adapter: Arc<dyn ExchangeAdapter>, config: BatchConfig) -> Self {
        Self {
            adapter,
            symbol_limit: AtomicUsize::new(config.symbol_limit),
            config,
            progress: watch::Sender::new(BatchProgress::default()),
        }
    }

    pub fn exchange(&self) -> ExchangeId {
        self.adapter.id()
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn symbol_limit(&self) -> usize {
        self.symbol_limit.load(Ordering::Relaxed)
    }

    /// Takes effect from the next [`Self::run`].
    pub fn set_symbol_limit(&self, limit: usize) {
        self.symbol_limit.store(limit, Ordering::Relaxed);
    }

    pub fn progress(&self) -> watch::Receiver<BatchProgress> {
        self.progress.subscribe()
    }

    /// Run one full cycle. Only a listing failure is fatal, every per-symbol failure is
    /// recorded as `Unknown` fields and the batch continues.
    pub async fn run(&self) -> Result<Snapshot, BatchError> {
        let exchange = self.exchange();
        let started_at = Utc::now();

        self.set_progress(BatchPhase::Listing, 0, 0);
        let listing = match self.retry_rate_limited(|| self.adapter.list_symbols()).await {
            Ok(listing) => listing,
            Err(source) => {
                self.set_progress(BatchPhase::Failed, 0, 0);
                warn!(%exchange, %source, "listing failed, keeping previous snapshot");
                return Err(BatchError::Listing { exchange, source });
            }
        };

        let symbols = select_symbols(
            listing.symbols(),
            &self.config.excluded,
            self.symbol_limit(),
        );
        let total = symbols.len();
        info!(
            %exchange,
            listed = listing.symbols().len(),
            fetching = total,
            "starting funding batch"
        );

        self.set_progress(BatchPhase::Fetching, 0, total);
        let mut records = Vec::with_capacity(total);
        for (index, symbol) in symbols.into_iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.config.throttle).await;
            }

            let raw = match self
                .retry_rate_limited(|| self.adapter.fetch_rate(&symbol))
                .await
            {
                Ok(raw) => raw,
                Err(error) if error.is_per_symbol() => {
                    warn!(%exchange, %symbol, %error, "symbol unavailable, recording unknown fields");
                    None
                }
                Err(error) => {
                    warn!(%exchange, %symbol, %error, "fetch failed after retry, recording unknown fields");
                    None
                }
            };

            let max_leverage = listing.max_leverage(&symbol);
            records.push(normalise(symbol, raw.as_ref(), max_leverage, Utc::now()));
            self.set_progress(BatchPhase::Fetching, index + 1, total);
        }

        let feed = match self.retry_rate_limited(|| self.adapter.fetch_prices()).await {
            Ok(feed) => feed,
            Err(error) => {
                warn!(%exchange, %error, "failed to fetch price feed, prices unknown");
                Some(PriceFeed::default())
            }
        };

        let mut records = records
            .into_iter()
            .sorted_by(|a, b| a.symbol.cmp(&b.symbol))
            .collect::<Vec<_>>();

        if let Some(feed) = &feed {
            merge_prices(&mut records, feed);
        }

        let snapshot = Snapshot {
            exchange,
            started_at: to_reference_tz(started_at),
            completed_at: to_reference_tz(Utc::now()),
            records,
            mark_prices: feed.map(|feed| feed.mark_prices().to_vec()),
        };

        self.set_progress(BatchPhase::Merged, total, total);
        info!(%exchange, records = snapshot.len(), "funding batch merged");
        Ok(snapshot)
    }

    async fn retry_rate_limited<T, Op, Fut>(&self, op: Op) -> Result<T, FetchError>
    where
        Op: Fn() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        match op().await {
            Err(error) if error.is_rate_limited() => {
                warn!(
                    exchange = %self.exchange(),
                    cooldown = ?self.config.cooldown,
                    %error,
                    "rate limited, pausing batch before retry"
                );
                tokio::time::sleep(self.config.cooldown).await;
                op().await
            }
            result => result,
        }
    }

    fn set_progress(&self, phase: BatchPhase, completed: usize, total: usize) {
        self.progress.send_replace(BatchProgress {
            phase,
            completed,
            total,
        });
    }
}
