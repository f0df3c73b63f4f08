//! Metric instances: one concrete time series under a definition.

use crate::core::{Result, TelemetryError};
use crate::metrics::columns::ValueColumnSet;
use crate::metrics::keyed::Keyed;
use crate::metrics::sample::{Sample, SamplePacket, SamplePayload, SampleValue};
use crate::metrics::sequence::SequenceSource;
use crate::metrics::store::SampleStore;
use crate::metrics::types::{normalize, DefinitionId, InstanceId, MetricKind, SamplingType};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

/// What an instance needs to know about its definition's shape.
///
/// Held by value so instances do not point back at their definition.
#[derive(Debug, Clone)]
pub enum InstanceSchema {
    Event(Arc<ValueColumnSet>),
    CounterSampled(SamplingType),
}

impl InstanceSchema {
    pub fn kind(&self) -> MetricKind {
        match self {
            InstanceSchema::Event(_) => MetricKind::Event,
            InstanceSchema::CounterSampled(_) => MetricKind::CounterSampled,
        }
    }
}

/// Composite key of an instance: definition key plus instance name.
/// An absent or empty name is the definition's default instance.
pub(crate) fn instance_key(definition_key: &str, name: Option<&str>) -> String {
    format!("{}~{}", definition_key, normalize(name.unwrap_or_default()))
}

pub struct MetricInstance {
    id: InstanceId,
    definition_id: DefinitionId,
    definition_key: String,
    name: Option<String>,
    key: String,
    schema: InstanceSchema,
    samples: SampleStore,
}

impl MetricInstance {
    pub(crate) fn new(
        definition_id: DefinitionId,
        definition_key: String,
        normalized_definition_key: &str,
        name: Option<&str>,
        schema: InstanceSchema,
        sequence: Arc<dyn SequenceSource>,
    ) -> Self {
        let name = name.filter(|n| !n.is_empty()).map(str::to_owned);
        Self {
            id: InstanceId::next(),
            definition_id,
            key: instance_key(normalized_definition_key, name.as_deref()),
            definition_key,
            name,
            schema,
            samples: SampleStore::new(sequence),
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn definition_id(&self) -> DefinitionId {
        self.definition_id
    }

    /// Display key of the owning definition
    pub fn definition_key(&self) -> &str {
        &self.definition_key
    }

    /// Instance name; `None` for the default instance
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_default(&self) -> bool {
        self.name.is_none()
    }

    pub fn kind(&self) -> MetricKind {
        self.schema.kind()
    }

    pub fn schema(&self) -> &InstanceSchema {
        &self.schema
    }

    /// Value columns of an event instance
    pub fn columns(&self) -> Option<&Arc<ValueColumnSet>> {
        match &self.schema {
            InstanceSchema::Event(columns) => Some(columns),
            InstanceSchema::CounterSampled(_) => None,
        }
    }

    pub fn sampling_type(&self) -> Option<SamplingType> {
        match self.schema {
            InstanceSchema::CounterSampled(sampling) => Some(sampling),
            InstanceSchema::Event(_) => None,
        }
    }

    pub fn samples(&self) -> &SampleStore {
        &self.samples
    }

    fn event_columns(&self) -> Result<&Arc<ValueColumnSet>> {
        self.columns().ok_or_else(|| self.incompatible(MetricKind::Event))
    }

    fn incompatible(&self, requested: MetricKind) -> TelemetryError {
        TelemetryError::IncompatibleDefinition {
            key: self.definition_key.clone(),
            existing: self.kind().to_string(),
            requested: requested.to_string(),
        }
    }

    /// Empty packet with one slot per value column.
    ///
    /// The first packet freezes the definition's column set; sample shape
    /// cannot change once samples exist.
    pub fn create_packet(&self) -> Result<SamplePacket> {
        let columns = self.event_columns()?;
        if !columns.is_locked() {
            let count = columns.lock();
            tracing::debug!(definition = %self.definition_key, columns = count, "Locked definition on first packet");
        }
        Ok(SamplePacket::new(Arc::clone(columns)))
    }

    /// Turn a filled packet into a sample
    pub fn write_packet(&self, packet: SamplePacket, timestamp: Option<DateTime<Utc>>) -> Result<Arc<Sample>> {
        let columns = self.event_columns()?;
        if !Arc::ptr_eq(packet.columns(), columns) {
            return Err(TelemetryError::IncompatibleDefinition {
                key: self.definition_key.clone(),
                existing: self.kind().to_string(),
                requested: format!("packet for {}", packet.columns().definition_key()),
            });
        }
        Ok(self.samples.append(SamplePayload::Event(packet.into_slots()), timestamp))
    }

    /// Record an event sample; `values` is parallel to the column set and
    /// may be shorter than it
    pub fn write_sample(&self, values: &[Option<SampleValue>], timestamp: Option<DateTime<Utc>>) -> Result<Arc<Sample>> {
        let mut packet = self.create_packet()?;
        packet.fill(values)?;
        self.write_packet(packet, timestamp)
    }

    /// Record a counter reading; `base` is the denominator for fraction types
    pub fn write_sampled(&self, raw: f64, base: Option<f64>, timestamp: Option<DateTime<Utc>>) -> Result<Arc<Sample>> {
        if self.sampling_type().is_none() {
            return Err(self.incompatible(MetricKind::CounterSampled));
        }
        Ok(self.samples.append(SamplePayload::Sampled { raw, base }, timestamp))
    }

    /// Load a stored sample with its original sequence number
    pub fn rehydrate_sample(&self, sequence: u64, timestamp: DateTime<Utc>, payload: SamplePayload) -> Result<Arc<Sample>> {
        let expected = match payload {
            SamplePayload::Event(_) => MetricKind::Event,
            SamplePayload::Sampled { .. } => MetricKind::CounterSampled,
        };
        if expected != self.kind() {
            return Err(self.incompatible(expected));
        }
        self.samples.rehydrate(sequence, timestamp, payload)
    }
}

impl Keyed for MetricInstance {
    type Id = InstanceId;

    fn id(&self) -> InstanceId {
        self.id
    }

    fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Debug for MetricInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricInstance")
            .field("id", &self.id)
            .field("definition", &self.definition_key)
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("samples", &self.samples.len())
            .finish()
    }
}
