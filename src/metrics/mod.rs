//! Metric registries and raw sample storage.
//!
//! Writers go through three steps:
//! - obtain or define a [`MetricDefinition`] in the [`DefinitionRegistry`]
//! - obtain or create a [`MetricInstance`] under that definition
//! - append samples to the instance's [`SampleStore`]

pub mod columns;
pub mod definition;
pub mod instance;
pub mod keyed;
pub mod registry;
pub mod sample;
pub mod sequence;
pub mod store;
pub mod types;

pub use columns::{ColumnOptions, ValueColumn, ValueColumnSet};
pub use definition::{DefinitionPayload, EventDefinition, MetricDefinition, MetricKey, SampledDefinition};
pub use instance::{InstanceSchema, MetricInstance};
pub use registry::DefinitionRegistry;
pub use sample::{Sample, SamplePacket, SamplePayload, SampleValue};
pub use sequence::{AtomicSequence, SequenceSource};
pub use store::SampleStore;
pub use types::{DefinitionId, DefinitionKind, InstanceId, MetricKind, SamplingType, Trend, ValueType};
