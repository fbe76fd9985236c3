use std::{fs::OpenOptions, io, path::Path, sync::Mutex};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

/// Log file of the interactive dashboard, which owns stdout.
pub const DEFAULT_LOG_FILE: &str = "funding-dashboard.log";

/// Log file path from `FUNDING_LOG_FILE`, falling back to [`DEFAULT_LOG_FILE`].
pub fn log_file() -> String {
    std::env::var("FUNDING_LOG_FILE")
        .ok()
        .filter(|path| !path.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string())
}

fn env_filter() -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy()
}

// Initialise an INFO `Subscriber` for `Tracing` logs, appending to a file
pub fn init_file_logging(path: impl AsRef<Path>) -> io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();

    Ok(())
}

// Initialise an INFO `Subscriber` for `Tracing` logs on stderr, keeping stdout for output
pub fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(cfg!(debug_assertions))
        .with_writer(io::stderr)
        .init()
}
