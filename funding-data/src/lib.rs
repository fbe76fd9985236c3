//! Funding Data - perpetual funding rate snapshots
//!
//! Polls perpetual futures exchanges over REST and produces one normalised, symbol sorted
//! funding table per exchange:
//! - apex: ticker-poll adapter (one ticker request per symbol)
//! - hyperliquid: bulk-snapshot adapter (funding history per symbol, one bulk mark price call)
//!
//! The library includes:
//! - Exchange adapters behind a single [`ExchangeAdapter`] capability
//! - Pure normalisation of raw payloads into [`FundingRecord`]s
//! - A sequential, throttled [`BatchFetcher`] isolating per-symbol failures
//! - A [`SnapshotStore`] with atomic snapshot swaps and single-flight refresh guards
//! - Refresh orchestration ([`Refresher`], [`Scheduler`]) driven by an explicit [`RefreshState`]
//! - A presentation agnostic row export with a [`RateStyleRule`] colour classification

pub mod batch;
pub mod config;
pub mod de;
pub mod error;
pub mod exchange;
pub mod normalise;
pub mod record;
pub mod refresh;
pub mod scheduler;
pub mod store;
pub mod symbol;
pub mod table;

#[cfg(test)]
mod test_util;

// Re-export commonly used types for convenience
pub use batch::{BatchConfig, BatchFetcher, BatchPhase, BatchProgress};
pub use config::{Config, ExchangeConfig};
pub use error::{BatchError, ConfigError, FetchError};
pub use exchange::{ExchangeAdapter, ExchangeId, Listing, PriceFeed, RawRate, build_adapter};
pub use record::{FundingRecord, FundingTime, MarkPrice, Reported, Snapshot};
pub use refresh::{RefreshPolicy, RefreshReason, RefreshState, RefreshTrigger, Refresher};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use store::{FeedStatus, SnapshotStore};
pub use symbol::Symbol;
pub use table::{MarkPriceRow, RateClass, RateStyleRule, SnapshotRow};
