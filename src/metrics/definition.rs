//! Metric definitions: the schema of a named measurable quantity.
//!
//! A definition is a single entity tagged by [`MetricKind`] and carrying a
//! kind-specific payload. Callers narrow it with [`MetricDefinition::as_event`]
//! or [`MetricDefinition::as_sampled`], which return `None` on a mismatch.

use crate::core::{Result, TelemetryError};
use crate::metrics::columns::{ColumnOptions, ValueColumn, ValueColumnSet};
use crate::metrics::instance::{instance_key, InstanceSchema, MetricInstance};
use crate::metrics::keyed::{Entry, Keyed, KeyedCollection};
use crate::metrics::sequence::SequenceSource;
use crate::metrics::types::{normalize, DefinitionId, DefinitionKind, InstanceId, MetricKind, SamplingType, ValueType};
use std::fmt;
use std::sync::Arc;

/// Composite identity of a definition. Compared case-insensitively.
#[derive(Debug, Clone)]
pub struct MetricKey {
    pub type_name: String,
    pub category: String,
    pub counter: String,
}

impl MetricKey {
    pub fn new(type_name: impl Into<String>, category: impl Into<String>, counter: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            category: category.into(),
            counter: counter.into(),
        }
    }

    /// Lowercase registry key.
    ///
    /// `~` and `\` inside a part are escaped so distinct parts never join
    /// to the same key.
    pub fn normalized(&self) -> String {
        [&self.type_name, &self.category, &self.counter]
            .iter()
            .map(|part| escape_part(&normalize(part)))
            .collect::<Vec<_>>()
            .join("~")
    }

    fn parts(&self) -> [String; 3] {
        [
            normalize(&self.type_name),
            normalize(&self.category),
            normalize(&self.counter),
        ]
    }
}

fn escape_part(part: &str) -> String {
    part.replace('\\', "\\\\").replace('~', "\\~")
}

impl PartialEq for MetricKey {
    fn eq(&self, other: &Self) -> bool {
        self.parts() == other.parts()
    }
}

impl Eq for MetricKey {}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}~{}~{}", self.type_name, self.category, self.counter)
    }
}

/// Payload of an event metric definition
#[derive(Debug)]
pub struct EventDefinition {
    columns: Arc<ValueColumnSet>,
}

impl EventDefinition {
    pub fn columns(&self) -> &Arc<ValueColumnSet> {
        &self.columns
    }
}

/// Payload of a counter-sampled metric definition
#[derive(Debug, Clone, Copy)]
pub struct SampledDefinition {
    sampling_type: SamplingType,
}

impl SampledDefinition {
    pub fn sampling_type(&self) -> SamplingType {
        self.sampling_type
    }
}

#[derive(Debug)]
pub enum DefinitionPayload {
    Event(EventDefinition),
    CounterSampled(SampledDefinition),
}

pub struct MetricDefinition {
    id: DefinitionId,
    key: MetricKey,
    normalized_key: String,
    payload: DefinitionPayload,
    instances: KeyedCollection<MetricInstance>,
    sequence: Arc<dyn SequenceSource>,
    lock_on_first_instance: bool,
}

impl MetricDefinition {
    pub(crate) fn new(
        key: MetricKey,
        kind: DefinitionKind,
        sequence: Arc<dyn SequenceSource>,
        capacity: usize,
        lock_on_first_instance: bool,
    ) -> Self {
        let payload = match kind {
            DefinitionKind::Event => DefinitionPayload::Event(EventDefinition {
                columns: Arc::new(ValueColumnSet::new(key.to_string())),
            }),
            DefinitionKind::CounterSampled(sampling_type) => {
                DefinitionPayload::CounterSampled(SampledDefinition { sampling_type })
            },
        };

        Self {
            id: DefinitionId::next(),
            normalized_key: key.normalized(),
            key,
            payload,
            instances: KeyedCollection::with_capacity(capacity),
            sequence,
            lock_on_first_instance,
        }
    }

    pub fn id(&self) -> DefinitionId {
        self.id
    }

    pub fn key(&self) -> &MetricKey {
        &self.key
    }

    pub fn kind(&self) -> MetricKind {
        match self.payload {
            DefinitionPayload::Event(_) => MetricKind::Event,
            DefinitionPayload::CounterSampled(_) => MetricKind::CounterSampled,
        }
    }

    /// Kind plus payload parameters, as requested at definition time
    pub fn definition_kind(&self) -> DefinitionKind {
        match &self.payload {
            DefinitionPayload::Event(_) => DefinitionKind::Event,
            DefinitionPayload::CounterSampled(sampled) => DefinitionKind::CounterSampled(sampled.sampling_type),
        }
    }

    pub fn payload(&self) -> &DefinitionPayload {
        &self.payload
    }

    pub fn as_event(&self) -> Option<&EventDefinition> {
        match &self.payload {
            DefinitionPayload::Event(event) => Some(event),
            DefinitionPayload::CounterSampled(_) => None,
        }
    }

    pub fn as_sampled(&self) -> Option<&SampledDefinition> {
        match &self.payload {
            DefinitionPayload::CounterSampled(sampled) => Some(sampled),
            DefinitionPayload::Event(_) => None,
        }
    }

    fn incompatible(&self, requested: impl fmt::Display) -> TelemetryError {
        TelemetryError::IncompatibleDefinition {
            key: self.key.to_string(),
            existing: self.definition_kind().to_string(),
            requested: requested.to_string(),
        }
    }

    /// Value columns; fails for counter-sampled definitions
    pub fn columns(&self) -> Result<&Arc<ValueColumnSet>> {
        self.as_event()
            .map(EventDefinition::columns)
            .ok_or_else(|| self.incompatible(MetricKind::Event))
    }

    /// Add a value column to an open event definition
    pub fn add_value_column(&self, name: &str, value_type: ValueType, options: ColumnOptions) -> Result<Arc<ValueColumn>> {
        self.columns()?.add(name, value_type, options)
    }

    /// Freeze the definition. Idempotent; counter definitions have nothing
    /// to freeze.
    pub fn lock(&self) {
        if let Some(event) = self.as_event() {
            let count = event.columns.lock();
            tracing::debug!(definition = %self.key, columns = count, "Locked metric definition");
        }
    }

    pub fn is_locked(&self) -> bool {
        self.as_event().map_or(true, |event| event.columns.is_locked())
    }

    /// Return the named instance, creating it on first use.
    ///
    /// `None` or an empty name selects the default instance. Concurrent
    /// callers asking for the same name get the same instance.
    pub fn get_or_create_instance(&self, name: Option<&str>) -> Result<Arc<MetricInstance>> {
        let key = instance_key(&self.normalized_key, name);
        let entry = self.instances.get_or_try_insert_with(&key, || {
            if self.lock_on_first_instance {
                self.lock();
            }
            let schema = match &self.payload {
                DefinitionPayload::Event(event) => InstanceSchema::Event(Arc::clone(&event.columns)),
                DefinitionPayload::CounterSampled(sampled) => InstanceSchema::CounterSampled(sampled.sampling_type),
            };
            Ok(MetricInstance::new(
                self.id,
                self.key.to_string(),
                &self.normalized_key,
                name,
                schema,
                Arc::clone(&self.sequence),
            ))
        })?;

        if let Entry::Created(instance) = &entry {
            tracing::debug!(
                definition = %self.key,
                instance = instance.name().unwrap_or("<default>"),
                "Created metric instance"
            );
        }
        Ok(entry.into_inner())
    }

    /// Existing instance by name, without creating it
    pub fn instance(&self, name: Option<&str>) -> Option<Arc<MetricInstance>> {
        self.instances.get_by_key(&instance_key(&self.normalized_key, name))
    }

    pub fn instance_by_id(&self, id: InstanceId) -> Option<Arc<MetricInstance>> {
        self.instances.get_by_id(id)
    }

    /// Instances in creation order
    pub fn instances(&self) -> Vec<Arc<MetricInstance>> {
        self.instances.snapshot()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }
}

impl Keyed for MetricDefinition {
    type Id = DefinitionId;

    fn id(&self) -> DefinitionId {
        self.id
    }

    fn key(&self) -> &str {
        &self.normalized_key
    }
}

impl fmt::Debug for MetricDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricDefinition")
            .field("id", &self.id)
            .field("key", &self.key.to_string())
            .field("payload", &self.payload)
            .field("instances", &self.instances.len())
            .finish()
    }
}
