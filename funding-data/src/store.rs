use crate::{error::BatchError, exchange::ExchangeId, record::Snapshot};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tracing::debug;

/// Health of one exchange's table, kept distinct from per-cell `N/A` values.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FeedStatus {
    /// No refresh has completed yet.
    #[default]
    Loading,
    Ready,
    /// Last refresh failed, the previous snapshot is still served.
    Stale { error: String },
    /// Refresh failed and there is no previous snapshot.
    Unavailable { error: String },
}

impl FeedStatus {
    pub fn is_degraded(&self) -> bool {
        matches!(self, FeedStatus::Stale { .. } | FeedStatus::Unavailable { .. })
    }
}

#[derive(Debug, Default)]
struct SlotState {
    snapshot: Option<Arc<Snapshot>>,
    status: FeedStatus,
    last_attempt_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct ExchangeSlot {
    state: RwLock<SlotState>,
    in_flight: AtomicBool,
}

/// Latest completed [`Snapshot`] per exchange.
///
/// Snapshots are published by swapping the whole `Arc`, so readers only ever observe complete
/// tables. At most one refresh per exchange may hold a [`RefreshGuard`] at a time.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    slots: [ExchangeSlot; ExchangeId::ALL.len()],
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, exchange: ExchangeId) -> &ExchangeSlot {
        &self.slots[exchange.index()]
    }

    pub fn snapshot(&self, exchange: ExchangeId) -> Option<Arc<Snapshot>> {
        self.slot(exchange).state.read().snapshot.clone()
    }

    pub fn status(&self, exchange: ExchangeId) -> FeedStatus {
        self.slot(exchange).state.read().status.clone()
    }

    /// Snapshot and status read under one lock.
    pub fn view(&self, exchange: ExchangeId) -> (Option<Arc<Snapshot>>, FeedStatus) {
        let state = self.slot(exchange).state.read();
        (state.snapshot.clone(), state.status.clone())
    }

    /// Determine if no snapshot was ever published for the exchange.
    pub fn is_cold(&self, exchange: ExchangeId) -> bool {
        self.slot(exchange).state.read().snapshot.is_none()
    }

    /// When the exchange's most recent refresh finished, successful or not.
    pub fn last_attempt(&self, exchange: ExchangeId) -> Option<DateTime<Utc>> {
        self.slot(exchange).state.read().last_attempt_at
    }

    pub fn is_in_flight(&self, exchange: ExchangeId) -> bool {
        self.slot(exchange).in_flight.load(Ordering::Acquire)
    }

    /// Claim the exchange's refresh slot, failing with [`BatchError::InFlight`] if another
    /// refresh already holds it.
    pub fn try_begin(&self, exchange: ExchangeId) -> Result<RefreshGuard<'_>, BatchError> {
        self.slot(exchange)
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| RefreshGuard {
                store: self,
                exchange,
            })
            .map_err(|_| BatchError::InFlight(exchange))
    }
}

/// Exclusive right to publish the next snapshot of one exchange. Releases the slot on drop.
#[derive(Debug)]
pub struct RefreshGuard<'a> {
    store: &'a SnapshotStore,
    exchange: ExchangeId,
}

impl RefreshGuard<'_> {
    pub fn exchange(&self) -> ExchangeId {
        self.exchange
    }

    /// Atomically replace the served snapshot.
    pub fn publish(self, snapshot: Snapshot) {
        let mut state = self.store.slot(self.exchange).state.write();
        debug!(exchange = %self.exchange, records = snapshot.len(), "publishing snapshot");
        state.snapshot = Some(Arc::new(snapshot));
        state.status = FeedStatus::Ready;
        state.last_attempt_at = Some(Utc::now());
    }

    /// Record a failed refresh, keeping any previous snapshot.
    pub fn fail(self, error: &BatchError) {
        let mut state = self.store.slot(self.exchange).state.write();
        let error = error.to_string();
        state.status = match state.snapshot {
            Some(_) => FeedStatus::Stale { error },
            None => FeedStatus::Unavailable { error },
        };
        state.last_attempt_at = Some(Utc::now());
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.store
            .slot(self.exchange)
            .in_flight
            .store(false, Ordering::Release);
    }
}
