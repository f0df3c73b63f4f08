//! Opt-in `tracing` subscriber installation.
//!
//! The library only emits events; hosts that have no subscriber of their
//! own can call [`init_logging`] once at startup.

use crate::core::config::LoggingConfig;
use crate::core::{Result, TelemetryError};

/// Environment variable consulted before `RUST_LOG`
pub const LOG_ENV_VAR: &str = "TRENDLINE_LOG";

/// Initialize logging based on configuration.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(config.with_thread_ids)
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| TelemetryError::config(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}
