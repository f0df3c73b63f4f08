//! Aggregation of raw samples into display series.
//!
//! An [`AggregationEngine`] walks a copy of an instance's samples, splits it
//! into windows by [`Granularity`] and reduces each window to one [`Value`]
//! according to the trend of the chosen value column, or the sampling type
//! of a counter-sampled metric.

pub mod engine;
pub mod granularity;
pub mod sampled;
pub mod trend;
pub mod value_set;

pub use engine::{AggregationEngine, Series, SeriesQuery};
pub use granularity::{Granularity, IntervalUnit};
pub use sampled::{compute_sampled_window, SampledState};
pub use trend::{effective_value, RunningState};
pub use value_set::{Value, ValueSet};
