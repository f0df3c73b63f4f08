//! Raw samples and the packet used to build them.

use crate::core::{Result, TelemetryError};
use crate::metrics::columns::ValueColumnSet;
use crate::metrics::types::ValueType;
use chrono::{DateTime, Utc};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Value slots of one event sample; most metrics have a handful of columns
pub type ValueSlots = SmallVec<[Option<SampleValue>; 4]>;

/// A single recorded column value
#[derive(Debug, Clone, PartialEq)]
pub enum SampleValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Duration(chrono::Duration),
    DateTime(DateTime<Utc>),
    Text(String),
}

impl SampleValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            SampleValue::Bool(_) => ValueType::Bool,
            SampleValue::Int(_) => ValueType::Int,
            SampleValue::UInt(_) => ValueType::UInt,
            SampleValue::Float(_) => ValueType::Float,
            SampleValue::Duration(_) => ValueType::Duration,
            SampleValue::DateTime(_) => ValueType::DateTime,
            SampleValue::Text(_) => ValueType::Text,
        }
    }
}

impl fmt::Display for SampleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleValue::Bool(v) => write!(f, "{}", v),
            SampleValue::Int(v) => write!(f, "{}", v),
            SampleValue::UInt(v) => write!(f, "{}", v),
            SampleValue::Float(v) => write!(f, "{}", v),
            SampleValue::Duration(v) => write!(f, "{}", v),
            SampleValue::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            SampleValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<bool> for SampleValue {
    fn from(v: bool) -> Self {
        SampleValue::Bool(v)
    }
}

impl From<i64> for SampleValue {
    fn from(v: i64) -> Self {
        SampleValue::Int(v)
    }
}

impl From<i32> for SampleValue {
    fn from(v: i32) -> Self {
        SampleValue::Int(i64::from(v))
    }
}

impl From<u64> for SampleValue {
    fn from(v: u64) -> Self {
        SampleValue::UInt(v)
    }
}

impl From<f64> for SampleValue {
    fn from(v: f64) -> Self {
        SampleValue::Float(v)
    }
}

impl From<chrono::Duration> for SampleValue {
    fn from(v: chrono::Duration) -> Self {
        SampleValue::Duration(v)
    }
}

impl From<std::time::Duration> for SampleValue {
    fn from(v: std::time::Duration) -> Self {
        SampleValue::Duration(chrono::Duration::from_std(v).unwrap_or(chrono::Duration::MAX))
    }
}

impl From<DateTime<Utc>> for SampleValue {
    fn from(v: DateTime<Utc>) -> Self {
        SampleValue::DateTime(v)
    }
}

impl From<&str> for SampleValue {
    fn from(v: &str) -> Self {
        SampleValue::Text(v.to_owned())
    }
}

impl From<String> for SampleValue {
    fn from(v: String) -> Self {
        SampleValue::Text(v)
    }
}

/// Kind-specific content of a sample
#[derive(Debug, Clone, PartialEq)]
pub enum SamplePayload {
    /// One slot per value column, parallel to the locked column set
    Event(ValueSlots),
    /// Counter reading; `base` is the denominator for fraction types
    Sampled { raw: f64, base: Option<f64> },
}

/// One immutable, sequence-numbered observation on an instance
#[derive(Debug, Clone)]
pub struct Sample {
    sequence: u64,
    timestamp: DateTime<Utc>,
    payload: SamplePayload,
}

impl Sample {
    pub(crate) fn new(sequence: u64, timestamp: DateTime<Utc>, payload: SamplePayload) -> Self {
        Self {
            sequence,
            timestamp,
            payload,
        }
    }

    /// Total-order key, unique across the process
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    #[inline]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn payload(&self) -> &SamplePayload {
        &self.payload
    }

    /// Event value slots, `None` for counter samples
    pub fn values(&self) -> Option<&[Option<SampleValue>]> {
        match &self.payload {
            SamplePayload::Event(slots) => Some(slots.as_slice()),
            SamplePayload::Sampled { .. } => None,
        }
    }

    /// Value at a column index; absent slots and counter samples give `None`
    #[inline]
    pub fn value(&self, index: usize) -> Option<&SampleValue> {
        self.values().and_then(|slots| slots.get(index)).and_then(Option::as_ref)
    }

    /// Counter reading as `(raw, base)`, `None` for event samples
    pub fn raw(&self) -> Option<(f64, Option<f64>)> {
        match self.payload {
            SamplePayload::Sampled { raw, base } => Some((raw, base)),
            SamplePayload::Event(_) => None,
        }
    }
}

impl PartialEq for Sample {
    fn eq(&self, other: &Self) -> bool {
        self.sequence == other.sequence
    }
}

impl Eq for Sample {}

impl PartialOrd for Sample {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Sample {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sequence.cmp(&other.sequence)
    }
}

/// Mutable slot buffer for one event sample, sized to a locked column set.
///
/// Writers fill slots by index or column name, then hand the packet to
/// the instance, which turns it into an immutable [`Sample`].
#[derive(Debug)]
pub struct SamplePacket {
    columns: Arc<ValueColumnSet>,
    slots: ValueSlots,
}

impl SamplePacket {
    pub(crate) fn new(columns: Arc<ValueColumnSet>) -> Self {
        let mut slots = ValueSlots::new();
        slots.resize(columns.len(), None);
        Self { columns, slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SampleValue> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Write a slot by index; `None` clears it
    pub fn set(&mut self, index: usize, value: Option<SampleValue>) -> Result<()> {
        let slot = self
            .slots
            .get_mut(index)
            .ok_or_else(|| TelemetryError::unknown_column(self.columns.definition_key(), index))?;
        *slot = value;
        Ok(())
    }

    /// Write a slot by case-insensitive column name
    pub fn set_named(&mut self, name: &str, value: impl Into<SampleValue>) -> Result<()> {
        let column = self.columns.get(name)?;
        let index = column
            .index()
            .ok_or_else(|| TelemetryError::unknown_column(self.columns.definition_key(), name))?;
        self.set(index, Some(value.into()))
    }

    /// Fill slots from the front; more values than columns is an error
    pub fn fill(&mut self, values: &[Option<SampleValue>]) -> Result<()> {
        if values.len() > self.slots.len() {
            return Err(TelemetryError::unknown_column(
                self.columns.definition_key(),
                self.slots.len(),
            ));
        }
        for (slot, value) in self.slots.iter_mut().zip(values) {
            slot.clone_from(value);
        }
        Ok(())
    }

    pub(crate) fn columns(&self) -> &Arc<ValueColumnSet> {
        &self.columns
    }

    pub(crate) fn into_slots(self) -> ValueSlots {
        self.slots
    }
}
