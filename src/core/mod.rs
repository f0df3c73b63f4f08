//! Ambient plumbing shared by every module: errors, configuration and
//! logging setup.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{
    AggregationConfig, CoercionPolicy, Config, ConfigBuilder, LogLevel, LoggingConfig,
    RegistryConfig,
};
pub use error::{Result, TelemetryError};
pub use logging::init_logging;
