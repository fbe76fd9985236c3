use chrono::{DateTime, Utc};
use funding_data::{
    BatchProgress, ExchangeId, FeedStatus, MarkPriceRow, RateStyleRule, RefreshState, Refresher,
    Snapshot, SnapshotRow,
    record::{RETRIEVED_AT_FORMAT, to_reference_tz},
};
use serde::Serialize;
use std::sync::Arc;

/// Everything rendered for one exchange, captured once per frame.
#[derive(Clone, Debug, PartialEq)]
pub struct ExchangeView {
    pub exchange: ExchangeId,
    pub snapshot: Option<Arc<Snapshot>>,
    pub status: FeedStatus,
    pub progress: BatchProgress,
}

impl ExchangeView {
    pub fn export(&self, rule: &RateStyleRule) -> ExchangeExport {
        let snapshot = self.snapshot.as_deref();
        ExchangeExport {
            exchange: self.exchange,
            status: self.status.clone(),
            started_at: snapshot.map(|snapshot| {
                snapshot.started_at.format(RETRIEVED_AT_FORMAT).to_string()
            }),
            rows: snapshot
                .map(|snapshot| snapshot.rows(rule))
                .unwrap_or_default(),
            mark_prices: snapshot.and_then(Snapshot::mark_price_rows),
        }
    }
}

/// Point in time view of every enabled exchange plus the refresh bookkeeping.
#[derive(Clone, Debug, PartialEq)]
pub struct DashboardView {
    pub exchanges: Vec<ExchangeView>,
    pub refresh: RefreshState,
}

impl DashboardView {
    pub fn capture(refresher: &Refresher, refresh: RefreshState) -> Self {
        let store = refresher.store();
        let exchanges = refresher
            .exchanges()
            .map(|exchange| {
                let (snapshot, status) = store.view(exchange);
                let progress = refresher
                    .progress(exchange)
                    .map(|progress| *progress.borrow())
                    .unwrap_or_default();

                ExchangeView {
                    exchange,
                    snapshot,
                    status,
                    progress,
                }
            })
            .collect();

        Self { exchanges, refresh }
    }

    pub fn exchange(&self, exchange: ExchangeId) -> Option<&ExchangeView> {
        self.exchanges.iter().find(|view| view.exchange == exchange)
    }

    pub fn last_refreshed(&self) -> String {
        format_local(self.refresh.last_refreshed_at)
    }

    pub fn next_refresh(&self) -> String {
        format_local(self.refresh.next_refresh_at())
    }
}

fn format_local(time: Option<DateTime<Utc>>) -> String {
    time.map(|time| to_reference_tz(time).format(RETRIEVED_AT_FORMAT).to_string())
        .unwrap_or_else(|| "never".to_string())
}

/// JSON export of one exchange's table.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExchangeExport {
    pub exchange: ExchangeId,
    pub status: FeedStatus,
    pub started_at: Option<String>,
    pub rows: Vec<SnapshotRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mark_prices: Option<Vec<MarkPriceRow>>,
}
