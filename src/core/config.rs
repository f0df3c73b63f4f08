//! Configuration management for the telemetry core.
//!
//! This module provides configuration handling with:
//! - YAML string and file support
//! - Programmatic builder
//! - Validation and defaults

use crate::core::{Result, TelemetryError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Complete configuration for a `Telemetry` instance
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Aggregation engine configuration
    pub aggregation: AggregationConfig,
    /// Registry configuration
    pub registry: RegistryConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Aggregation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Smallest total window width for millisecond granularity
    #[serde(with = "humantime_serde")]
    pub min_millisecond_interval: Duration,
    /// What to do when a sample value cannot be converted to a number
    pub coercion: CoercionPolicy,
    /// Percentile reported by value sets, in (0, 1]
    pub percentile: f64,
}

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Initial capacity of registry maps
    pub initial_capacity: usize,
    /// Lock an event definition when its first instance is created
    pub lock_on_first_instance: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Include thread ids in log lines
    pub with_thread_ids: bool,
}

/// Handling of non-numeric values under a trendable policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoercionPolicy {
    /// Use 0 for the offending value and count the substitution
    SubstituteZero,
    /// Abort the series with `CoercionFailure`
    Fail,
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Per-sample detail
    Trace,
    /// Locks, queries and timings
    Debug,
    /// Registry lifecycle
    Info,
    /// Substituted or dropped values
    Warn,
    /// Failures only
    Error,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        AggregationConfig {
            min_millisecond_interval: Duration::from_millis(16),
            coercion: CoercionPolicy::SubstituteZero,
            percentile: 0.95,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            initial_capacity: 64,
            lock_on_first_instance: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            with_thread_ids: false,
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.aggregation.min_millisecond_interval.is_zero() {
            return Err(TelemetryError::config("min_millisecond_interval must be greater than 0"));
        }

        let p = self.aggregation.percentile;
        if !(p > 0.0 && p <= 1.0) {
            return Err(TelemetryError::config(format!(
                "percentile must be in (0, 1], got {}",
                p
            )));
        }

        Ok(())
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| TelemetryError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Load configuration from a YAML file
    pub fn from_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), "Loaded telemetry configuration file");
        self.from_yaml(&content)
    }

    /// Set the millisecond granularity floor
    pub fn min_millisecond_interval(mut self, floor: Duration) -> Self {
        self.config.aggregation.min_millisecond_interval = floor;
        self
    }

    /// Set the coercion policy
    pub fn coercion(mut self, policy: CoercionPolicy) -> Self {
        self.config.aggregation.coercion = policy;
        self
    }

    /// Set the reported percentile
    pub fn percentile(mut self, percentile: f64) -> Self {
        self.config.aggregation.percentile = percentile;
        self
    }

    /// Set the initial registry capacity
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.config.registry.initial_capacity = capacity;
        self
    }

    /// Lock event definitions on first instance creation
    pub fn lock_on_first_instance(mut self, enable: bool) -> Self {
        self.config.registry.lock_on_first_instance = enable;
        self
    }

    /// Set log level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
