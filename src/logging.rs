//! Logging configuration for gold-runner.
//!
//! Diagnostics go to stderr so that stdout stays free for piping. The level
//! defaults to `info` and can be changed with `RUST_LOG`.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "info";

/// Initializes logging to stderr.
pub fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Builds the filter from `RUST_LOG`, falling back to the default level.
///
/// sqlx statement logging is capped at `warn` unless `RUST_LOG` asks for it.
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{DEFAULT_FILTER},sqlx=warn")))
}
