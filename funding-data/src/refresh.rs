use crate::{
    batch::{BatchFetcher, BatchProgress},
    config::Config,
    error::{BatchError, ConfigError},
    exchange::{ExchangeId, build_adapter},
    store::SnapshotStore,
};
use chrono::{DateTime, TimeDelta, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// What asked for a refresh cycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshTrigger {
    /// Operator request, always due.
    Manual,
    /// Periodic check, due on cold start, for a cold exchange past its retry cooldown, or once
    /// the interval elapsed.
    Scheduled,
}

/// Why a refresh cycle was started.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshReason {
    Manual,
    ColdStart,
    IntervalElapsed,
}

/// Refresh bookkeeping, owned by the orchestration step and passed in and out of every cycle.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RefreshState {
    /// Completion time of the most recent full cycle that ran a batch.
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub refresh_interval: Duration,
    /// Symbols still to fetch across active batches, `None` while idle.
    pub pending_symbol_count: Option<usize>,
}

impl RefreshState {
    pub fn new(refresh_interval: Duration) -> Self {
        Self {
            last_refreshed_at: None,
            refresh_interval,
            pending_symbol_count: None,
        }
    }

    /// When the interval next elapses, `None` before the first cycle.
    pub fn next_refresh_at(&self) -> Option<DateTime<Utc>> {
        self.last_refreshed_at
            .map(|last| last + self.interval_delta())
    }

    fn interval_delta(&self) -> TimeDelta {
        TimeDelta::from_std(self.refresh_interval).unwrap_or(TimeDelta::MAX)
    }
}

/// Decides whether a refresh cycle is due.
#[derive(Clone, Copy, Debug, Default)]
pub struct RefreshPolicy;

impl RefreshPolicy {
    /// A cycle over every exchange is due on a manual trigger, before the first cycle, or once
    /// `refresh_interval` has elapsed since the last cycle.
    pub fn due(
        state: &RefreshState,
        trigger: RefreshTrigger,
        now: DateTime<Utc>,
    ) -> Option<RefreshReason> {
        if trigger == RefreshTrigger::Manual {
            return Some(RefreshReason::Manual);
        }

        match state.last_refreshed_at {
            None => Some(RefreshReason::ColdStart),
            Some(last) if now - last >= state.interval_delta() => {
                Some(RefreshReason::IntervalElapsed)
            }
            Some(_) => None,
        }
    }

    /// An exchange with no snapshot is retried on its own once `retry_after` has passed since
    /// its last attempt.
    pub fn cold_retry_due(
        is_cold: bool,
        last_attempt: Option<DateTime<Utc>>,
        retry_after: Duration,
        now: DateTime<Utc>,
    ) -> bool {
        let retry_after = TimeDelta::from_std(retry_after).unwrap_or(TimeDelta::MAX);
        is_cold && last_attempt.is_none_or(|last| now - last >= retry_after)
    }
}

/// Runs refresh cycles over every enabled exchange and publishes results into the
/// [`SnapshotStore`].
#[derive(Debug)]
pub struct Refresher {
    fetchers: Vec<BatchFetcher>,
    store: Arc<SnapshotStore>,
}

impl Refresher {
    pub fn new(fetchers: Vec<BatchFetcher>, store: Arc<SnapshotStore>) -> Self {
        Self { fetchers, store }
    }

    /// Build one [`BatchFetcher`] per enabled exchange.
    pub fn from_config(config: &Config, store: Arc<SnapshotStore>) -> Result<Self, ConfigError> {
        let fetchers = config
            .exchanges
            .iter()
            .map(|&exchange| {
                build_adapter(exchange, config)
                    .map(|adapter| BatchFetcher::new(adapter, config.batch(exchange)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(fetchers, store))
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    pub fn exchanges(&self) -> impl Iterator<Item = ExchangeId> + '_ {
        self.fetchers.iter().map(BatchFetcher::exchange)
    }

    pub fn progress(&self, exchange: ExchangeId) -> Option<watch::Receiver<BatchProgress>> {
        self.fetcher(exchange).map(BatchFetcher::progress)
    }

    fn fetcher(&self, exchange: ExchangeId) -> Option<&BatchFetcher> {
        self.fetchers
            .iter()
            .find(|fetcher| fetcher.exchange() == exchange)
    }

    pub fn symbol_limit(&self) -> usize {
        self.fetchers
            .first()
            .map(BatchFetcher::symbol_limit)
            .unwrap_or_default()
    }

    /// Operator control bounding every exchange's next batch, 0 meaning unlimited.
    pub fn set_symbol_limit(&self, limit: usize) {
        info!(limit, "symbol limit updated");
        self.fetchers
            .iter()
            .for_each(|fetcher| fetcher.set_symbol_limit(limit));
    }

    /// Determine if every enabled exchange has published at least one snapshot.
    pub fn has_snapshots(&self) -> bool {
        self.exchanges()
            .all(|exchange| !self.store.is_cold(exchange))
    }

    pub fn is_in_flight(&self) -> bool {
        self.exchanges()
            .any(|exchange| self.store.is_in_flight(exchange))
    }

    /// Symbols not yet fetched across active batches.
    pub fn pending_symbol_count(&self) -> usize {
        self.fetchers
            .iter()
            .map(|fetcher| *fetcher.progress().borrow())
            .filter(BatchProgress::is_active)
            .map(|progress| progress.total.saturating_sub(progress.completed))
            .sum()
    }

    /// Determine if any exchange is due for a refresh.
    pub fn is_due(
        &self,
        state: &RefreshState,
        trigger: RefreshTrigger,
        now: DateTime<Utc>,
    ) -> bool {
        !self
            .due_fetchers(RefreshPolicy::due(state, trigger, now), now)
            .is_empty()
    }

    /// Every fetcher when a full cycle is due, otherwise only cold exchanges whose retry
    /// cooldown has passed.
    fn due_fetchers(
        &self,
        cycle: Option<RefreshReason>,
        now: DateTime<Utc>,
    ) -> Vec<(&BatchFetcher, RefreshReason)> {
        self.fetchers
            .iter()
            .filter_map(|fetcher| {
                let exchange = fetcher.exchange();
                cycle
                    .or_else(|| {
                        RefreshPolicy::cold_retry_due(
                            self.store.is_cold(exchange),
                            self.store.last_attempt(exchange),
                            fetcher.config().cooldown,
                            now,
                        )
                        .then_some(RefreshReason::ColdStart)
                    })
                    .map(|reason| (fetcher, reason))
            })
            .collect()
    }

    /// Run the exchanges the policy says are due.
    ///
    /// Exchanges refresh concurrently with each other. An exchange whose previous batch is
    /// still in flight is skipped, so overlapping triggers never start a second batch. Only a
    /// full cycle moves `last_refreshed_at`, a lone cold-start retry leaves the interval alone.
    pub async fn refresh(&self, state: RefreshState, trigger: RefreshTrigger) -> RefreshState {
        let now = Utc::now();
        let cycle = RefreshPolicy::due(&state, trigger, now);
        let due = self.due_fetchers(cycle, now);
        if due.is_empty() {
            return state;
        }

        info!(?cycle, exchanges = due.len(), "starting refresh cycle");
        let results = join_all(
            due.into_iter()
                .map(|(fetcher, reason)| self.refresh_exchange(fetcher, reason)),
        )
        .await;

        let ran = results
            .iter()
            .any(|result| result.as_ref().err().is_none_or(BatchError::is_unavailable));

        if !ran {
            debug!("refresh already in flight for every due exchange, ignoring trigger");
            return state;
        }
        if cycle.is_none() {
            return state;
        }

        RefreshState {
            last_refreshed_at: Some(Utc::now()),
            pending_symbol_count: None,
            ..state
        }
    }

    async fn refresh_exchange(
        &self,
        fetcher: &BatchFetcher,
        reason: RefreshReason,
    ) -> Result<(), BatchError> {
        let exchange = fetcher.exchange();
        let guard = self.store.try_begin(exchange).inspect_err(|_| {
            debug!(%exchange, "batch already in flight, skipping");
        })?;
        debug!(%exchange, ?reason, "refreshing exchange");

        match fetcher.run().await {
            Ok(snapshot) => {
                guard.publish(snapshot);
                Ok(())
            }
            Err(error) => {
                warn!(%exchange, %error, "refresh failed");
                guard.fail(&error);
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        batch::{BatchConfig, BatchPhase},
        error::FetchError,
        exchange::ExchangeAdapter,
        store::FeedStatus,
        test_util::{MockAdapter, listing, ticker},
    };
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use tokio::sync::Notify;

    fn refresher(adapters: Vec<Arc<dyn ExchangeAdapter>>) -> Refresher {
        let fetchers = adapters
            .into_iter()
            .map(|adapter| BatchFetcher::new(adapter, BatchConfig::default()))
            .collect();
        Refresher::new(fetchers, Arc::new(SnapshotStore::new()))
    }

    #[test]
    fn test_refresh_policy_due() {
        struct TestCase {
            input: (Option<DateTime<Utc>>, RefreshTrigger),
            expected: Option<RefreshReason>,
        }

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let minutes_ago = |minutes: i64| Some(now - TimeDelta::minutes(minutes));

        let tests = vec![
            TestCase {
                // TC0: manual always runs
                input: (minutes_ago(1), RefreshTrigger::Manual),
                expected: Some(RefreshReason::Manual),
            },
            TestCase {
                // TC1: nothing fetched yet
                input: (None, RefreshTrigger::Scheduled),
                expected: Some(RefreshReason::ColdStart),
            },
            TestCase {
                // TC2: interval not elapsed
                input: (minutes_ago(14), RefreshTrigger::Scheduled),
                expected: None,
            },
            TestCase {
                // TC3: interval elapsed exactly
                input: (minutes_ago(15), RefreshTrigger::Scheduled),
                expected: Some(RefreshReason::IntervalElapsed),
            },
            TestCase {
                // TC4: interval long elapsed
                input: (minutes_ago(16), RefreshTrigger::Scheduled),
                expected: Some(RefreshReason::IntervalElapsed),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let (last_refreshed_at, trigger) = test.input;
            let state = RefreshState {
                last_refreshed_at,
                ..RefreshState::new(Duration::from_secs(15 * 60))
            };
            let actual = RefreshPolicy::due(&state, trigger, now);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_refresh_policy_cold_retry_due() {
        struct TestCase {
            input: (bool, Option<DateTime<Utc>>),
            expected: bool,
        }

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let seconds_ago = |seconds: i64| Some(now - TimeDelta::seconds(seconds));

        let tests = vec![
            TestCase {
                // TC0: cold, never attempted
                input: (true, None),
                expected: true,
            },
            TestCase {
                // TC1: cold, failed attempt inside the cooldown
                input: (true, seconds_ago(30)),
                expected: false,
            },
            TestCase {
                // TC2: cold, cooldown passed exactly
                input: (true, seconds_ago(60)),
                expected: true,
            },
            TestCase {
                // TC3: has a snapshot, waits for the interval
                input: (false, seconds_ago(600)),
                expected: false,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let (is_cold, last_attempt) = test.input;
            let actual =
                RefreshPolicy::cold_retry_due(is_cold, last_attempt, Duration::from_secs(60), now);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_refresh_state_next_refresh_at() {
        let last = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let state = RefreshState {
            last_refreshed_at: Some(last),
            ..RefreshState::new(Duration::from_secs(900))
        };

        assert_eq!(state.next_refresh_at(), Some(last + TimeDelta::minutes(15)));
        assert_eq!(RefreshState::new(Duration::from_secs(900)).next_refresh_at(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresher_cold_start_populates_store() {
        let apex = MockAdapter::new(ExchangeId::Apex, Ok(listing(&[("BTC-USDC", Some(50))])))
            .with_rate("BTC-USDC", Ok(Some(ticker("BTC-USDC", dec!(0.0000125), dec!(64000)))));
        let hyperliquid = MockAdapter::new(
            ExchangeId::Hyperliquid,
            Err(FetchError::UpstreamUnavailable("503".to_string())),
        );

        let refresher = refresher(vec![Arc::new(apex), Arc::new(hyperliquid)]);
        let state = refresher
            .refresh(RefreshState::new(Duration::from_secs(900)), RefreshTrigger::Scheduled)
            .await;

        assert!(state.last_refreshed_at.is_some());
        assert_eq!(refresher.store().status(ExchangeId::Apex), FeedStatus::Ready);
        assert_eq!(refresher.store().snapshot(ExchangeId::Apex).unwrap().len(), 1);

        // listing failure on one exchange never affects the other
        assert!(matches!(
            refresher.store().status(ExchangeId::Hyperliquid),
            FeedStatus::Unavailable { .. }
        ));
        assert!(!refresher.has_snapshots());

        // scheduled trigger right after is not due, the cold exchange is inside its cooldown
        let again = refresher.refresh(state.clone(), RefreshTrigger::Scheduled).await;
        assert_eq!(again, state);
        assert!(!refresher.is_due(&state, RefreshTrigger::Scheduled, Utc::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresher_retries_cold_exchange_alone() {
        let apex = Arc::new(
            MockAdapter::new(ExchangeId::Apex, Ok(listing(&[("BTC-USDC", Some(50))])))
                .with_rate("BTC-USDC", Ok(Some(ticker("BTC-USDC", dec!(0.0000125), dec!(64000))))),
        );
        let hyperliquid = Arc::new(MockAdapter::new(
            ExchangeId::Hyperliquid,
            Err(FetchError::UpstreamUnavailable("503".to_string())),
        ));
        let config = BatchConfig {
            cooldown: Duration::ZERO,
            ..BatchConfig::default()
        };
        let refresher = Refresher::new(
            vec![
                BatchFetcher::new(apex.clone(), config.clone()),
                BatchFetcher::new(hyperliquid.clone(), config),
            ],
            Arc::new(SnapshotStore::new()),
        );

        let state = refresher
            .refresh(RefreshState::new(Duration::from_secs(900)), RefreshTrigger::Scheduled)
            .await;
        assert_eq!(apex.list_calls(), 1);
        assert_eq!(hyperliquid.list_calls(), 1);

        // cooldown passed: only the cold exchange runs again, the interval is untouched
        assert!(refresher.is_due(&state, RefreshTrigger::Scheduled, Utc::now()));
        let retried = refresher.refresh(state.clone(), RefreshTrigger::Scheduled).await;

        assert_eq!(retried, state);
        assert_eq!(apex.list_calls(), 1);
        assert_eq!(apex.rate_calls().len(), 1);
        assert_eq!(hyperliquid.list_calls(), 2);
        assert_eq!(refresher.store().status(ExchangeId::Apex), FeedStatus::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresher_coalesces_trigger_while_in_flight() {
        let gate = Arc::new(Notify::new());
        let adapter = Arc::new(
            MockAdapter::new(ExchangeId::Hyperliquid, Ok(listing(&[("BTC", Some(50))])))
                .with_gate(gate.clone()),
        );
        let refresher = Arc::new(refresher(vec![adapter.clone()]));
        let initial = RefreshState::new(Duration::from_secs(900));

        let in_flight = tokio::spawn({
            let refresher = refresher.clone();
            let initial = initial.clone();
            async move { refresher.refresh(initial, RefreshTrigger::Manual).await }
        });

        while adapter.list_calls() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(refresher.is_in_flight());

        // second manual trigger while Listing: no-op
        let coalesced = refresher.refresh(initial.clone(), RefreshTrigger::Manual).await;
        assert_eq!(coalesced, initial);
        assert_eq!(adapter.list_calls(), 1);

        gate.notify_one();
        let completed = in_flight.await.unwrap();

        assert!(completed.last_refreshed_at.is_some());
        assert_eq!(adapter.list_calls(), 1);
        assert!(!refresher.is_in_flight());
        assert_eq!(
            refresher.store().snapshot(ExchangeId::Hyperliquid).unwrap().len(),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresher_coalesces_trigger_while_fetching() {
        let gate = Arc::new(Notify::new());
        let adapter = Arc::new(
            MockAdapter::new(ExchangeId::Apex, Ok(listing(&[("BTC-USDC", Some(50))])))
                .with_rate("BTC-USDC", Ok(Some(ticker("BTC-USDC", dec!(0.0000125), dec!(64000)))))
                .with_rate_gate(gate.clone()),
        );
        let refresher = Arc::new(refresher(vec![adapter.clone()]));
        let initial = RefreshState::new(Duration::from_secs(900));
        let mut progress = refresher.progress(ExchangeId::Apex).unwrap();

        let in_flight = tokio::spawn({
            let refresher = refresher.clone();
            let initial = initial.clone();
            async move { refresher.refresh(initial, RefreshTrigger::Manual).await }
        });

        progress
            .wait_for(|progress| progress.phase == BatchPhase::Fetching)
            .await
            .unwrap();
        while adapter.rate_calls().is_empty() {
            tokio::task::yield_now().await;
        }

        // second manual trigger while Fetching: no-op
        let coalesced = refresher.refresh(initial.clone(), RefreshTrigger::Manual).await;
        assert_eq!(coalesced, initial);
        assert_eq!(adapter.list_calls(), 1);
        assert_eq!(adapter.rate_calls().len(), 1);

        gate.notify_one();
        let completed = in_flight.await.unwrap();

        assert!(completed.last_refreshed_at.is_some());
        assert_eq!(adapter.list_calls(), 1);
        assert_eq!(adapter.rate_calls().len(), 1);
        assert_eq!(refresher.store().status(ExchangeId::Apex), FeedStatus::Ready);
        assert_eq!(refresher.store().snapshot(ExchangeId::Apex).unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresher_symbol_limit() {
        let adapter = Arc::new(MockAdapter::new(
            ExchangeId::Hyperliquid,
            Ok(listing(&[("BTC", None), ("ETH", None), ("SOL", None)])),
        ));
        let refresher = refresher(vec![adapter.clone()]);

        refresher.set_symbol_limit(2);
        assert_eq!(refresher.symbol_limit(), 2);

        refresher
            .refresh(RefreshState::new(Duration::from_secs(900)), RefreshTrigger::Manual)
            .await;

        assert_eq!(adapter.rate_calls().len(), 2);
        assert_eq!(
            refresher.store().snapshot(ExchangeId::Hyperliquid).unwrap().len(),
            2
        );
    }
}
