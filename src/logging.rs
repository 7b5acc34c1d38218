//! Tracing subscriber setup for applications using the default stream.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info,loggable=debug";

/// Install a human-readable `tracing` subscriber.
///
/// Reads the filter from the `RUST_LOG` environment variable and defaults to
/// `info,loggable=debug`, leaving severity filtering of this crate's records
/// to the [`LoggingPolicy`](crate::LoggingPolicy). Does nothing if a global
/// subscriber is already installed.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init();
}

/// Initialize tracing for tests (captured by the test harness).
#[cfg(test)]
pub(crate) fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("loggable=debug")
        .try_init();
}
