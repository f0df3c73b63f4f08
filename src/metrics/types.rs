//! Core metric types shared by the registries, sample store and
//! aggregation engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_DEFINITION_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a metric definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct DefinitionId(u64);

/// Process-unique identifier of a metric instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct InstanceId(u64);

impl DefinitionId {
    pub(crate) fn next() -> Self {
        DefinitionId(NEXT_DEFINITION_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline(always)]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl InstanceId {
    pub(crate) fn next() -> Self {
        InstanceId(NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline(always)]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DefinitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "def-{}", self.0)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "inst-{}", self.0)
    }
}

/// Declared type of a value column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Bool,
    Int,
    UInt,
    Float,
    Duration,
    DateTime,
    Text,
}

impl ValueType {
    /// Numeric and duration columns can be trended out of the box.
    pub fn is_trendable(self) -> bool {
        matches!(self, ValueType::Int | ValueType::UInt | ValueType::Float | ValueType::Duration)
    }

    /// Trend assigned to a new column of this type when none is given
    pub fn default_trend(self) -> Trend {
        if self.is_trendable() {
            Trend::Average
        } else {
            Trend::Count
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::UInt => "uint",
            ValueType::Float => "float",
            ValueType::Duration => "duration",
            ValueType::DateTime => "datetime",
            ValueType::Text => "text",
        };
        f.write_str(name)
    }
}

/// Aggregation policy applied to the samples of one window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    /// Number of samples carrying a value
    Count,
    /// Sum of the window's values
    Sum,
    /// Mean of the window's values
    Average,
    /// Sum carried across every window of the series
    RunningSum,
    /// Mean carried across every window of the series
    RunningAverage,
}

impl Trend {
    /// Running trends seed each window with the previous window's state.
    #[inline]
    pub fn is_running(self) -> bool {
        matches!(self, Trend::RunningSum | Trend::RunningAverage)
    }

    #[inline]
    pub fn is_average(self) -> bool {
        matches!(self, Trend::Average | Trend::RunningAverage)
    }
}

/// How raw counter samples are turned into display values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingType {
    /// Each sample is the value itself
    RawCount,
    /// Each sample is a raw numerator over a base
    RawFraction,
    /// Each sample is a delta since the previous sample
    IncrementalCount,
    /// Each sample is a numerator/base delta since the previous sample
    IncrementalFraction,
    /// Each sample is a running total
    TotalCount,
    /// Each sample is a running numerator/base total
    TotalFraction,
}

impl SamplingType {
    /// Fraction types divide the numerator by the sample base.
    #[inline]
    pub fn is_fraction(self) -> bool {
        matches!(
            self,
            SamplingType::RawFraction | SamplingType::IncrementalFraction | SamplingType::TotalFraction
        )
    }
}

/// Tag of a metric definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    Event,
    CounterSampled,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Event => f.write_str("event"),
            MetricKind::CounterSampled => f.write_str("counter-sampled"),
        }
    }
}

/// Requested shape of a new definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefinitionKind {
    /// Event metric with a value column set
    Event,
    /// Counter metric sampled with the given type
    CounterSampled(SamplingType),
}

impl DefinitionKind {
    pub fn kind(self) -> MetricKind {
        match self {
            DefinitionKind::Event => MetricKind::Event,
            DefinitionKind::CounterSampled(_) => MetricKind::CounterSampled,
        }
    }
}

impl fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefinitionKind::Event => f.write_str("event"),
            DefinitionKind::CounterSampled(sampling) => write!(f, "counter-sampled({:?})", sampling),
        }
    }
}

/// Lowercase a name so registry lookups are case-insensitive
#[inline]
pub(crate) fn normalize(name: &str) -> String {
    name.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trendable_types() {
        assert!(ValueType::Int.is_trendable());
        assert!(ValueType::Duration.is_trendable());
        assert!(!ValueType::DateTime.is_trendable());
        assert!(!ValueType::Text.is_trendable());

        assert_eq!(ValueType::Float.default_trend(), Trend::Average);
        assert_eq!(ValueType::Bool.default_trend(), Trend::Count);
    }

    #[test]
    fn test_trend_flags() {
        assert!(Trend::RunningSum.is_running());
        assert!(!Trend::Sum.is_running());
        assert!(Trend::RunningAverage.is_average());
        assert!(!Trend::Count.is_average());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = DefinitionId::next();
        let b = DefinitionId::next();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
    }

    #[test]
    fn test_definition_kind_tag() {
        assert_eq!(DefinitionKind::Event.kind(), MetricKind::Event);
        assert_eq!(
            DefinitionKind::CounterSampled(SamplingType::TotalCount).kind(),
            MetricKind::CounterSampled
        );
        assert!(SamplingType::TotalFraction.is_fraction());
    }
}
