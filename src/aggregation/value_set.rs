//! Computed display values and their running statistics.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::fmt;

/// One computed point of a series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Value {
    sequence: u64,
    timestamp: DateTime<Utc>,
    value: f64,
}

impl Value {
    /// Position within the owning value set; unique and increasing
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

struct ValueSetInner {
    values: Vec<Value>,
    next_sequence: u64,
    min: Option<Value>,
    max: Option<Value>,
    average: f64,
    percentile: Option<Option<f64>>,
}

/// Ordered values of one aggregation call.
///
/// Min, max and average are maintained on every `add`; the percentile is
/// computed on first access and cached until the next `add`.
pub struct ValueSet {
    percentile: f64,
    inner: Mutex<ValueSetInner>,
}

impl ValueSet {
    /// `percentile` in (0, 1], e.g. 0.95
    pub fn new(percentile: f64) -> Self {
        Self::with_capacity(percentile, 0)
    }

    pub fn with_capacity(percentile: f64, capacity: usize) -> Self {
        Self {
            percentile,
            inner: Mutex::new(ValueSetInner {
                values: Vec::with_capacity(capacity),
                next_sequence: 0,
                min: None,
                max: None,
                average: 0.0,
                percentile: None,
            }),
        }
    }

    pub fn add(&self, timestamp: DateTime<Utc>, value: f64) -> Value {
        let mut inner = self.inner.lock();

        inner.next_sequence += 1;
        let entry = Value {
            sequence: inner.next_sequence,
            timestamp,
            value,
        };

        if inner.min.map_or(true, |min| value < min.value || min.value.is_nan()) {
            inner.min = Some(entry);
        }
        if inner.max.map_or(true, |max| value > max.value || max.value.is_nan()) {
            inner.max = Some(entry);
        }

        inner.values.push(entry);
        // Online mean: avg += (x - avg) / n, never sum / n.
        let n = inner.values.len() as f64;
        inner.average += (value - inner.average) / n;
        inner.percentile = None;

        entry
    }

    pub fn len(&self) -> usize {
        self.inner.lock().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.inner.lock().values.get(index).copied()
    }

    /// Copy of the values in order
    pub fn values(&self) -> Vec<Value> {
        self.inner.lock().values.clone()
    }

    /// Just the numbers, in order
    pub fn numbers(&self) -> Vec<f64> {
        self.inner.lock().values.iter().map(Value::value).collect()
    }

    pub fn min(&self) -> Option<Value> {
        self.inner.lock().min
    }

    pub fn max(&self) -> Option<Value> {
        self.inner.lock().max
    }

    /// Running mean; 0 for an empty set
    pub fn average(&self) -> f64 {
        self.inner.lock().average
    }

    /// Configured percentile of the values; `None` for an empty set
    pub fn percentile(&self) -> Option<f64> {
        let mut inner = self.inner.lock();
        if let Some(cached) = inner.percentile {
            return cached;
        }

        let mut sorted: Vec<f64> = inner.values.iter().map(Value::value).collect();
        sorted.sort_unstable_by(f64::total_cmp);

        let rank = (self.percentile * sorted.len() as f64).ceil() as usize;
        let result = sorted.get(rank.saturating_sub(1)).copied();
        inner.percentile = Some(result);
        result
    }

    pub fn into_values(self) -> Vec<Value> {
        self.inner.into_inner().values
    }
}

impl fmt::Debug for ValueSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ValueSet")
            .field("len", &inner.values.len())
            .field("min", &inner.min.map(|v| v.value))
            .field("max", &inner.max.map(|v| v.value))
            .field("average", &inner.average)
            .finish()
    }
}
