use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_DIR: &str = "logs";
const LOG_FILE: &str = "econ_metrics.log";

/// Daily-rotated file writer under `dir`. Lines are flushed when the guard drops.
pub fn file_writer(dir: &Path) -> (NonBlocking, WorkerGuard) {
    // Ensure logs directory exists
    let _ = fs::create_dir_all(dir);
    let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE);
    tracing_appender::non_blocking(file_appender)
}

/// Initializes the logging system with both console and file output.
///
/// The returned guard must be held until the process exits; dropping it
/// flushes and stops the background file writer.
#[must_use = "dropping the guard stops file logging"]
pub fn init_logging() -> WorkerGuard {
    let (non_blocking_writer, guard) = file_writer(Path::new(LOG_DIR));

    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);

    // Console output goes to stderr so stdout stays clean for reports
    let console_layer = fmt::layer().with_target(true).with_writer(std::io::stderr);

    // Respect RUST_LOG if set; otherwise info for our crate
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("econ_metrics=info,warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    guard
}
