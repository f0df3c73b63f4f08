//! Trendline - in-process metric registry and trend aggregation.
//!
//! Trendline records telemetry samples against named metric definitions
//! and down-samples them into display-ready series with running summary
//! statistics.
//!
//! # Features
//!
//! - **Typed definitions**: event metrics with value columns, or
//!   counter-sampled metrics with a sampling type
//! - **Atomic registries**: create-or-get of definitions and instances in a
//!   single critical section
//! - **Sequenced storage**: process-wide sequence numbers order every sample
//! - **Trend aggregation**: count, sum, average and their running variants
//!   over fixed or per-sample windows
//!
//! # Architecture
//!
//! - `core`: configuration, errors and logging setup
//! - `metrics`: definitions, columns, instances and sample stores
//! - `aggregation`: windowing engine and value sets
//! - `telemetry`: the root object that owns everything else
//!
//! # Example
//!
//! ```
//! use chrono::{Duration, Utc};
//! use trendline::aggregation::Granularity;
//! use trendline::Telemetry;
//!
//! let telemetry = Telemetry::default();
//! let logins = telemetry.define_event_metric("App", "Auth", "Logins")?;
//! let instance = telemetry.get_or_create_instance(&logins, None)?;
//!
//! let t0 = Utc::now();
//! for offset in [0, 2, 4, 6, 8] {
//!     telemetry.write_sample(&instance, &[], Some(t0 + Duration::seconds(offset)))?;
//! }
//!
//! let series = telemetry.compute_series(
//!     &instance,
//!     Some(t0),
//!     Some(t0 + Duration::seconds(10)),
//!     Granularity::seconds(5),
//!     None,
//! )?;
//! assert_eq!(series.values().numbers(), vec![3.0, 2.0]);
//! # Ok::<(), trendline::TelemetryError>(())
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod aggregation;
pub mod core;
pub mod metrics;
pub mod telemetry;

// Re-export core types for convenience
pub use crate::core::{Config, ConfigBuilder, Result, TelemetryError};
pub use crate::telemetry::Telemetry;
