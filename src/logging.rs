//! Log subscriber setup for binaries.
//!
//! Library code only emits `tracing` events; installing a subscriber is
//! left to the application.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Filter built from `RUST_LOG`, or from the configured level when unset.
pub fn filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Install a stderr fmt subscriber. Later calls are no-ops.
pub fn init(config: &LoggingConfig) {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(config.ansi);

    let _ = tracing_subscriber::registry()
        .with(filter(config))
        .with(fmt_layer)
        .try_init();
}
