/// Funding Dashboard - shared library
///
/// Common functionality for the two binaries:
/// - funding-dashboard: interactive terminal dashboard
/// - funding-snapshot: one refresh cycle exported as JSON
pub mod app;
pub mod logging;
pub mod ui;
pub mod view;

pub use app::{Action, App};
pub use view::{DashboardView, ExchangeExport, ExchangeView};
