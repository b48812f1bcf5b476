//! Diagnostic logging to stderr.
//!
//! Filter comes from `POSTBRIDGE_LOG` (standard `EnvFilter` syntax) and
//! defaults to `warn`, so normal command output on stdout stays clean.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "POSTBRIDGE_LOG";

const DEFAULT_FILTER: &str = "warn";

/// Installs the global subscriber. Keep the guard alive until exit so
/// buffered lines are flushed.
pub fn init() -> WorkerGuard {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(false)
        .try_init();

    guard
}
