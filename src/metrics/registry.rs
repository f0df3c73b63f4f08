//! Registry of metric definitions.
//!
//! The registry is an ordinary value owned by whoever initializes
//! telemetry; there is no process-wide instance.

use crate::core::config::RegistryConfig;
use crate::core::{Result, TelemetryError};
use crate::metrics::definition::{MetricDefinition, MetricKey};
use crate::metrics::keyed::{Entry, KeyedCollection};
use crate::metrics::sequence::{AtomicSequence, SequenceSource};
use crate::metrics::types::{DefinitionId, DefinitionKind, SamplingType};
use std::fmt;
use std::sync::Arc;

pub struct DefinitionRegistry {
    definitions: KeyedCollection<MetricDefinition>,
    sequence: Arc<dyn SequenceSource>,
    config: RegistryConfig,
}

impl DefinitionRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self::with_sequence(config, Arc::new(AtomicSequence::new()))
    }

    /// Share a sequence source with e.g. a persisted packet stream
    pub fn with_sequence(config: RegistryConfig, sequence: Arc<dyn SequenceSource>) -> Self {
        Self {
            definitions: KeyedCollection::with_capacity(config.initial_capacity),
            sequence,
            config,
        }
    }

    pub fn sequence(&self) -> &Arc<dyn SequenceSource> {
        &self.sequence
    }

    /// Return the definition for `key`, creating it if absent.
    ///
    /// Lookup and insert happen in one critical section. An existing
    /// definition of a different kind (or sampling type) is an
    /// `IncompatibleDefinition` error.
    pub fn define(&self, kind: DefinitionKind, key: MetricKey) -> Result<Arc<MetricDefinition>> {
        let normalized = key.normalized();
        let entry = self.definitions.get_or_try_insert_with(&normalized, move || {
            Ok(MetricDefinition::new(
                key,
                kind,
                Arc::clone(&self.sequence),
                self.config.initial_capacity,
                self.config.lock_on_first_instance,
            ))
        })?;

        match entry {
            Entry::Created(definition) => {
                tracing::debug!(definition = %definition.key(), kind = %kind, "Created metric definition");
                Ok(definition)
            },
            Entry::Existing(definition) if definition.definition_kind() == kind => Ok(definition),
            Entry::Existing(definition) => {
                tracing::warn!(
                    definition = %definition.key(),
                    existing = %definition.definition_kind(),
                    requested = %kind,
                    "Incompatible metric definition requested"
                );
                Err(TelemetryError::IncompatibleDefinition {
                    key: definition.key().to_string(),
                    existing: definition.definition_kind().to_string(),
                    requested: kind.to_string(),
                })
            },
        }
    }

    pub fn define_event(&self, type_name: &str, category: &str, counter: &str) -> Result<Arc<MetricDefinition>> {
        self.define(DefinitionKind::Event, MetricKey::new(type_name, category, counter))
    }

    pub fn define_sampled(
        &self,
        type_name: &str,
        category: &str,
        counter: &str,
        sampling_type: SamplingType,
    ) -> Result<Arc<MetricDefinition>> {
        self.define(
            DefinitionKind::CounterSampled(sampling_type),
            MetricKey::new(type_name, category, counter),
        )
    }

    pub fn get(&self, id: DefinitionId) -> Option<Arc<MetricDefinition>> {
        self.definitions.get_by_id(id)
    }

    pub fn get_by_key(&self, key: &MetricKey) -> Option<Arc<MetricDefinition>> {
        self.definitions.get_by_key(&key.normalized())
    }

    pub fn find(&self, type_name: &str, category: &str, counter: &str) -> Option<Arc<MetricDefinition>> {
        self.get_by_key(&MetricKey::new(type_name, category, counter))
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Definitions in creation order
    pub fn definitions(&self) -> Vec<Arc<MetricDefinition>> {
        self.definitions.snapshot()
    }
}

impl Default for DefinitionRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl fmt::Debug for DefinitionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefinitionRegistry")
            .field("definitions", &self.definitions.len())
            .field("sequence", &self.sequence.current())
            .finish()
    }
}
