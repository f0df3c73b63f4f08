//! Root object tying configuration, registry and aggregation together.

use crate::aggregation::{AggregationEngine, Granularity, Series, SeriesQuery};
use crate::core::{Config, Result};
use crate::metrics::{
    AtomicSequence, ColumnOptions, DefinitionKind, DefinitionRegistry, MetricDefinition, MetricInstance, MetricKey,
    Sample, SampleValue, SamplingType, SequenceSource, ValueColumn, ValueType,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// One telemetry context.
///
/// Construct it once during startup and pass it by reference; every
/// definition, instance and sample lives inside it.
///
/// ```
/// use trendline::aggregation::Granularity;
/// use trendline::metrics::{ColumnOptions, SampleValue, ValueType};
/// use trendline::Telemetry;
///
/// let telemetry = Telemetry::default();
/// let requests = telemetry.define_event_metric("App", "Http", "Requests")?;
/// let latency = telemetry.add_value_column(&requests, "latency", ValueType::Float, ColumnOptions::new())?;
///
/// let instance = telemetry.get_or_create_instance(&requests, Some("api"))?;
/// telemetry.write_sample(&instance, &[Some(SampleValue::Float(12.5))], None)?;
///
/// let series = telemetry.compute_series(&instance, None, None, Granularity::Shortest, Some(&latency))?;
/// assert_eq!(series.values().numbers(), vec![12.5]);
/// # Ok::<(), trendline::TelemetryError>(())
/// ```
#[derive(Debug)]
pub struct Telemetry {
    config: Config,
    registry: DefinitionRegistry,
    engine: AggregationEngine,
}

impl Telemetry {
    pub fn new(config: Config) -> Result<Self> {
        Self::with_sequence(config, Arc::new(AtomicSequence::new()))
    }

    /// Use an external sequence source, e.g. one resumed from persisted
    /// samples
    pub fn with_sequence(config: Config, sequence: Arc<dyn SequenceSource>) -> Result<Self> {
        config.validate()?;
        tracing::debug!(
            coercion = ?config.aggregation.coercion,
            percentile = config.aggregation.percentile,
            sequence = sequence.current(),
            "Initialized telemetry"
        );
        Ok(Self::from_parts(config, sequence))
    }

    fn from_parts(config: Config, sequence: Arc<dyn SequenceSource>) -> Self {
        Self {
            registry: DefinitionRegistry::with_sequence(config.registry.clone(), sequence),
            engine: AggregationEngine::new(config.aggregation.clone()),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &DefinitionRegistry {
        &self.registry
    }

    pub fn engine(&self) -> &AggregationEngine {
        &self.engine
    }

    /// Define a metric or return the existing one under the same key
    pub fn define_metric(
        &self,
        kind: DefinitionKind,
        type_name: &str,
        category: &str,
        counter: &str,
    ) -> Result<Arc<MetricDefinition>> {
        self.registry.define(kind, MetricKey::new(type_name, category, counter))
    }

    pub fn define_event_metric(&self, type_name: &str, category: &str, counter: &str) -> Result<Arc<MetricDefinition>> {
        self.define_metric(DefinitionKind::Event, type_name, category, counter)
    }

    pub fn define_sampled_metric(
        &self,
        type_name: &str,
        category: &str,
        counter: &str,
        sampling_type: SamplingType,
    ) -> Result<Arc<MetricDefinition>> {
        self.define_metric(DefinitionKind::CounterSampled(sampling_type), type_name, category, counter)
    }

    pub fn add_value_column(
        &self,
        definition: &MetricDefinition,
        name: &str,
        value_type: ValueType,
        options: ColumnOptions,
    ) -> Result<Arc<ValueColumn>> {
        definition.add_value_column(name, value_type, options)
    }

    /// Freeze the definition's columns; calling it again is a no-op
    pub fn lock_definition(&self, definition: &MetricDefinition) {
        definition.lock();
    }

    pub fn get_or_create_instance(&self, definition: &MetricDefinition, name: Option<&str>) -> Result<Arc<MetricInstance>> {
        definition.get_or_create_instance(name)
    }

    pub fn write_sample(
        &self,
        instance: &MetricInstance,
        values: &[Option<SampleValue>],
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Arc<Sample>> {
        instance.write_sample(values, timestamp)
    }

    pub fn write_sampled(
        &self,
        instance: &MetricInstance,
        raw: f64,
        base: Option<f64>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Arc<Sample>> {
        instance.write_sampled(raw, base, timestamp)
    }

    /// Aggregate `instance` over `[start, end]`.
    ///
    /// Missing bounds default to the earliest and latest sample. Without a
    /// trend column every window counts its samples.
    pub fn compute_series(
        &self,
        instance: &MetricInstance,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        granularity: Granularity,
        trend: Option<&Arc<ValueColumn>>,
    ) -> Result<Series> {
        let mut query = SeriesQuery::new(granularity);
        if let Some(start) = start {
            query = query.start(start);
        }
        if let Some(end) = end {
            query = query.end(end);
        }
        if let Some(column) = trend {
            query = query.trend_column(Arc::clone(column));
        }
        self.query(instance, &query)
    }

    pub fn query(&self, instance: &MetricInstance, query: &SeriesQuery) -> Result<Series> {
        self.engine.compute(instance, query)
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::from_parts(Config::default(), Arc::new(AtomicSequence::new()))
    }
}
