/// Funding Snapshot
///
/// Runs a single refresh cycle over every enabled exchange and prints the resulting tables
/// as JSON on stdout. Logs go to stderr.
use std::{error::Error, io::Write, sync::Arc};

use funding_dashboard::{DashboardView, ExchangeExport, logging::init_stderr_logging};
use funding_data::{Config, RefreshState, RefreshTrigger, Refresher, SnapshotStore};
use serde::Serialize;
use tracing::info;

#[derive(Serialize)]
struct Export {
    refreshed_at: String,
    exchanges: Vec<ExchangeExport>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_stderr_logging();

    let config = Config::from_env();
    let refresher = Refresher::from_config(&config, Arc::new(SnapshotStore::new()))?;

    let state = refresher
        .refresh(
            RefreshState::new(config.refresh_interval),
            RefreshTrigger::Manual,
        )
        .await;

    let view = DashboardView::capture(&refresher, state);
    let export = Export {
        refreshed_at: view.last_refreshed(),
        exchanges: view
            .exchanges
            .iter()
            .map(|exchange| exchange.export(&config.rate_style))
            .collect(),
    };

    info!(
        exchanges = export.exchanges.len(),
        rows = export.exchanges.iter().map(|exchange| exchange.rows.len()).sum::<usize>(),
        "funding snapshot complete"
    );

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &export)?;
    writeln!(stdout)?;
    Ok(())
}
