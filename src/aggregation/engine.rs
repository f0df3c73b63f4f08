//! Down-sampling of an instance's samples into a series of display values.
//!
//! The engine copies the instance's samples under the store lock and does
//! all window arithmetic on that copy, so writers are never held up by a
//! slow query.

use crate::aggregation::granularity::Granularity;
use crate::aggregation::sampled::{compute_sampled_window, SampledState};
use crate::aggregation::trend::{TrendCalculator, TrendTarget};
use crate::aggregation::value_set::{Value, ValueSet};
use crate::core::config::AggregationConfig;
use crate::core::{Result, TelemetryError};
use crate::metrics::columns::ValueColumn;
use crate::metrics::instance::{InstanceSchema, MetricInstance};
use crate::metrics::sample::Sample;
use crate::metrics::types::SamplingType;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Default)]
enum TrendSelector {
    /// Count occurrences
    #[default]
    None,
    /// The definition's default value column, if one is set
    Default,
    Named(String),
    Column(Arc<ValueColumn>),
}

/// Parameters of one `compute` call.
///
/// ```
/// use trendline::aggregation::{Granularity, SeriesQuery};
///
/// let query = SeriesQuery::new(Granularity::seconds(5)).trend_named("latency");
/// assert!(!query.granularity().is_shortest());
/// ```
#[derive(Debug, Clone)]
pub struct SeriesQuery {
    granularity: Granularity,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    trend: TrendSelector,
}

impl SeriesQuery {
    pub fn new(granularity: Granularity) -> Self {
        Self {
            granularity,
            start: None,
            end: None,
            trend: TrendSelector::None,
        }
    }

    /// One value per raw sample
    pub fn shortest() -> Self {
        Self::new(Granularity::Shortest)
    }

    pub fn range(self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start(start).end(end)
    }

    pub fn start(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    pub fn trend_column(mut self, column: Arc<ValueColumn>) -> Self {
        self.trend = TrendSelector::Column(column);
        self
    }

    pub fn trend_named(mut self, name: impl Into<String>) -> Self {
        self.trend = TrendSelector::Named(name.into());
        self
    }

    /// Trend the definition's default value column; counts when none is set
    pub fn default_trend(mut self) -> Self {
        self.trend = TrendSelector::Default;
        self
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }
}

/// Result of one aggregation call
#[derive(Debug)]
pub struct Series {
    values: ValueSet,
    granularity: Granularity,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    coercion_failures: usize,
    skipped_samples: usize,
}

impl Series {
    pub fn values(&self) -> &ValueSet {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values.into_values()
    }

    /// Resolved `[start, end]`; `None` when the store was empty and no
    /// range was given
    pub fn range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.start.zip(self.end)
    }

    /// Granularity after the millisecond floor was applied
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Values that could not be converted and were counted as 0
    pub fn coercion_failures(&self) -> usize {
        self.coercion_failures
    }

    /// In-range samples stamped before the window the scan had reached
    pub fn skipped_samples(&self) -> usize {
        self.skipped_samples
    }
}

enum WindowEvaluator<'a> {
    Event(TrendCalculator<'a>),
    Sampled {
        sampling_type: SamplingType,
        state: SampledState,
    },
}

impl WindowEvaluator<'_> {
    fn observe_skipped(&mut self, sample: &Sample) {
        if let WindowEvaluator::Sampled { sampling_type, state } = self {
            state.observe_baseline(*sampling_type, sample);
        }
    }

    fn evaluate(&mut self, samples: &[Arc<Sample>]) -> Result<f64> {
        match self {
            WindowEvaluator::Event(calculator) => calculator.compute_window_value(samples),
            WindowEvaluator::Sampled { sampling_type, state } => {
                Ok(compute_sampled_window(*sampling_type, samples, state))
            },
        }
    }

    fn coercion_failures(&self) -> usize {
        match self {
            WindowEvaluator::Event(calculator) => calculator.coercion_failures(),
            WindowEvaluator::Sampled { .. } => 0,
        }
    }
}

/// Computes series for metric instances
#[derive(Debug, Clone, Default)]
pub struct AggregationEngine {
    config: AggregationConfig,
}

impl AggregationEngine {
    pub fn new(config: AggregationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Aggregate `instance` according to `query`
    pub fn compute(&self, instance: &MetricInstance, query: &SeriesQuery) -> Result<Series> {
        let started = Instant::now();
        query.granularity.validate()?;
        if let Some((start, end)) = query.start.zip(query.end) {
            check_range(start, end)?;
        }

        let column = resolve_trend(instance, &query.trend)?;
        if column.is_some() {
            lock_columns(instance);
        }
        let target = match &column {
            Some(column) => {
                let index = column
                    .index()
                    .ok_or_else(|| TelemetryError::unknown_column(instance.definition_key(), column.name()))?;
                Some(TrendTarget { column, index })
            },
            None => None,
        };

        let (mut evaluator, snapshot) = match instance.schema() {
            InstanceSchema::Event(_) => {
                let snapshot = match query.start {
                    Some(start) => instance.samples().snapshot_from(start),
                    None => instance.samples().snapshot(),
                };
                let calculator = TrendCalculator::new(target, self.config.coercion);
                (WindowEvaluator::Event(calculator), snapshot)
            },
            // Earlier readings seed the baseline of total types.
            InstanceSchema::CounterSampled(sampling_type) => (
                WindowEvaluator::Sampled {
                    sampling_type: *sampling_type,
                    state: SampledState::default(),
                },
                instance.samples().snapshot(),
            ),
        };

        let granularity = query.granularity.with_floor(self.config.min_millisecond_interval);
        let values = ValueSet::with_capacity(self.config.percentile, snapshot.len());

        // An open bound never crosses the explicit one.
        let lowest = snapshot.iter().map(|s| s.timestamp()).min();
        let highest = snapshot.iter().map(|s| s.timestamp()).max();
        let start = query
            .start
            .or_else(|| lowest.map(|low| query.end.map_or(low, |end| low.min(end))))
            .or(query.end);
        let end = query
            .end
            .or_else(|| highest.map(|high| start.map_or(high, |start| high.max(start))))
            .or(start);
        let (start, end) = match (start, end) {
            (Some(start), Some(end)) => (start, end),
            _ if granularity.is_shortest() => {
                return Ok(Series {
                    values,
                    granularity,
                    start: query.start,
                    end: query.end,
                    coercion_failures: 0,
                    skipped_samples: 0,
                });
            },
            _ => {
                return Err(TelemetryError::range(
                    "interval aggregation over an empty store needs an explicit start and end",
                ));
            },
        };
        check_range(start, end)?;

        let skipped = if granularity.is_shortest() {
            shortest(&snapshot, start, end, &mut evaluator, &values)?
        } else {
            intervals(&snapshot, start, end, granularity, &mut evaluator, &values)?
        };

        let coercion_failures = evaluator.coercion_failures();
        if coercion_failures > 0 {
            tracing::warn!(
                definition = instance.definition_key(),
                failures = coercion_failures,
                "Substituted 0 for values that could not be converted to numbers"
            );
        }

        tracing::debug!(
            definition = instance.definition_key(),
            instance = instance.name().unwrap_or("<default>"),
            granularity = %granularity,
            samples = snapshot.len(),
            values = values.len(),
            skipped,
            elapsed_us = started.elapsed().as_micros() as u64,
            "Computed series"
        );

        Ok(Series {
            values,
            granularity,
            start: Some(start),
            end: Some(end),
            coercion_failures,
            skipped_samples: skipped,
        })
    }
}

fn check_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
    if start > end {
        return Err(TelemetryError::range(format!("start {} is after end {}", start, end)));
    }
    Ok(())
}

/// Freeze column indexes before the first query reads them
fn lock_columns(instance: &MetricInstance) {
    if let InstanceSchema::Event(columns) = instance.schema() {
        if !columns.is_locked() {
            let count = columns.lock();
            tracing::debug!(definition = instance.definition_key(), columns = count, "Locked definition on first query");
        }
    }
}

fn resolve_trend(instance: &MetricInstance, selector: &TrendSelector) -> Result<Option<Arc<ValueColumn>>> {
    match instance.schema() {
        InstanceSchema::Event(columns) => match selector {
            TrendSelector::None => Ok(None),
            TrendSelector::Default => Ok(columns.default_column()),
            TrendSelector::Named(name) => columns.get(name).map(Some),
            TrendSelector::Column(column) if columns.contains(column) => Ok(Some(Arc::clone(column))),
            TrendSelector::Column(column) => Err(TelemetryError::unknown_column(
                instance.definition_key(),
                column.name(),
            )),
        },
        InstanceSchema::CounterSampled(_) => match selector {
            TrendSelector::None | TrendSelector::Default => Ok(None),
            TrendSelector::Named(name) => Err(TelemetryError::unknown_column(instance.definition_key(), name)),
            TrendSelector::Column(column) => Err(TelemetryError::unknown_column(
                instance.definition_key(),
                column.name(),
            )),
        },
    }
}

/// One value per sample in `[start, end]`, stopping at the first later one
fn shortest(
    snapshot: &[Arc<Sample>],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    evaluator: &mut WindowEvaluator<'_>,
    values: &ValueSet,
) -> Result<usize> {
    for (position, sample) in snapshot.iter().enumerate() {
        if sample.timestamp() < start {
            evaluator.observe_skipped(sample);
            continue;
        }
        if sample.timestamp() > end {
            break;
        }
        let value = evaluator.evaluate(&snapshot[position..=position])?;
        values.add(sample.timestamp(), value);
    }
    Ok(0)
}

/// Fixed windows from `start` to `end`.
///
/// Bounds are inclusive on both ends and the scan only moves forward, so a
/// sample on a boundary belongs to the first window that reaches it. A
/// sample stamped before the current window is consumed without a window.
fn intervals(
    snapshot: &[Arc<Sample>],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    granularity: Granularity,
    evaluator: &mut WindowEvaluator<'_>,
    values: &ValueSet,
) -> Result<usize> {
    let mut cursor = 0;
    let mut skipped = 0;
    let mut window: Vec<Arc<Sample>> = Vec::new();
    let mut window_start = start;

    while window_start < end {
        let window_end = granularity
            .advance(window_start)
            .ok_or_else(|| TelemetryError::range(format!("{} overflows after {}", granularity, window_start)))?
            .min(end);

        window.clear();
        while let Some(sample) = snapshot.get(cursor) {
            if sample.timestamp() > window_end {
                break;
            }
            cursor += 1;
            if sample.timestamp() < window_start {
                if sample.timestamp() >= start {
                    skipped += 1;
                }
                evaluator.observe_skipped(sample);
                continue;
            }
            window.push(Arc::clone(sample));
        }

        let value = evaluator.evaluate(&window)?;
        values.add(window_end, value);
        window_start = window_end;
    }

    Ok(skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::granularity::IntervalUnit;
    use crate::core::config::{CoercionPolicy, RegistryConfig};
    use crate::metrics::columns::ColumnOptions;
    use crate::metrics::registry::DefinitionRegistry;
    use crate::metrics::sample::SampleValue;
    use crate::metrics::types::{Trend, ValueType};
    use chrono::{Duration, TimeZone};

    fn t(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap() + Duration::seconds(seconds)
    }

    fn event_instance(trend: Option<Trend>) -> (Arc<MetricInstance>, Option<Arc<ValueColumn>>) {
        let registry = DefinitionRegistry::default();
        let def = registry.define_event("Test", "Engine", "Events").unwrap();
        let column = trend.map(|trend| {
            def.add_value_column("amount", ValueType::Int, ColumnOptions::new().trend(trend))
                .unwrap()
        });
        let instance = def.get_or_create_instance(None).unwrap();
        (instance, column)
    }

    #[test]
    fn test_windowed_count() {
        let (instance, _) = event_instance(None);
        for s in [0, 2, 4, 6, 8] {
            instance.write_sample(&[], Some(t(s))).unwrap();
        }

        let engine = AggregationEngine::default();
        let query = SeriesQuery::new(Granularity::seconds(5)).range(t(0), t(10));
        let series = engine.compute(&instance, &query).unwrap();

        assert_eq!(series.values().numbers(), vec![3.0, 2.0]);
        let stamps: Vec<_> = series.values().values().iter().map(Value::timestamp).collect();
        assert_eq!(stamps, vec![t(5), t(10)]);
    }

    #[test]
    fn test_running_sum_carries_over() {
        let (instance, column) = event_instance(Some(Trend::RunningSum));
        for s in 0..4 {
            instance.write_sample(&[Some(SampleValue::Int(1))], Some(t(s))).unwrap();
        }

        let query = SeriesQuery::new(Granularity::seconds(2))
            .range(t(0), t(4))
            .trend_column(column.unwrap());
        let series = AggregationEngine::default().compute(&instance, &query).unwrap();
        assert_eq!(series.values().numbers(), vec![3.0, 4.0]);
    }

    #[test]
    fn test_empty_windows_still_produce_values() {
        let (instance, _) = event_instance(None);
        instance.write_sample(&[], Some(t(0))).unwrap();
        let query = SeriesQuery::new(Granularity::seconds(1)).range(t(0), t(3));
        let series = AggregationEngine::default().compute(&instance, &query).unwrap();
        assert_eq!(series.values().numbers(), vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_final_window_is_clamped() {
        let (instance, _) = event_instance(None);
        instance.write_sample(&[], Some(t(7))).unwrap();
        let query = SeriesQuery::new(Granularity::seconds(5)).range(t(0), t(7));
        let series = AggregationEngine::default().compute(&instance, &query).unwrap();
        let last = series.values().values().last().copied().unwrap();
        assert_eq!(last.timestamp(), t(7));
        assert_eq!(last.value(), 1.0);
    }

    #[test]
    fn test_zero_intervals_is_range_error() {
        let (instance, _) = event_instance(None);
        instance.write_sample(&[], Some(t(0))).unwrap();
        let query = SeriesQuery::new(Granularity::interval(IntervalUnit::Minute, 0)).range(t(0), t(60));
        let err = AggregationEngine::default().compute(&instance, &query).unwrap_err();
        assert!(matches!(err, TelemetryError::Range(_)));
    }

    #[test]
    fn test_inverted_range_is_range_error() {
        let (instance, _) = event_instance(None);
        let query = SeriesQuery::shortest().range(t(10), t(0));
        assert!(matches!(
            AggregationEngine::default().compute(&instance, &query),
            Err(TelemetryError::Range(_))
        ));
    }

    #[test]
    fn test_empty_store_without_range() {
        let (instance, _) = event_instance(None);
        let engine = AggregationEngine::default();

        let series = engine.compute(&instance, &SeriesQuery::shortest()).unwrap();
        assert!(series.values().is_empty());
        assert!(series.range().is_none());

        let err = engine
            .compute(&instance, &SeriesQuery::new(Granularity::seconds(1)))
            .unwrap_err();
        assert!(matches!(err, TelemetryError::Range(_)));
    }

    #[test]
    fn test_open_end_past_last_sample_is_empty_for_both_kinds() {
        let engine = AggregationEngine::default();
        let (events, _) = event_instance(None);
        let registry = DefinitionRegistry::default();
        let readings = registry
            .define_sampled("Os", "Cpu", "Busy", SamplingType::RawCount)
            .unwrap()
            .get_or_create_instance(None)
            .unwrap();
        for s in 0..5 {
            events.write_sample(&[], Some(t(s))).unwrap();
            readings.write_sampled(s as f64, None, Some(t(s))).unwrap();
        }

        for instance in [&events, &readings] {
            let series = engine.compute(instance, &SeriesQuery::shortest().start(t(100))).unwrap();
            assert!(series.values().is_empty());
            assert_eq!(series.range(), Some((t(100), t(100))));

            let series = engine
                .compute(instance, &SeriesQuery::new(Granularity::seconds(1)).start(t(100)))
                .unwrap();
            assert!(series.values().is_empty());

            let series = engine.compute(instance, &SeriesQuery::shortest().end(t(-10))).unwrap();
            assert!(series.values().is_empty());
        }
    }

    #[test]
    fn test_query_locks_unlocked_definition() {
        let registry = DefinitionRegistry::new(RegistryConfig {
            lock_on_first_instance: false,
            ..RegistryConfig::default()
        });
        let def = registry.define_event("Test", "Engine", "Lazy").unwrap();
        let column = def
            .add_value_column("v", ValueType::Int, ColumnOptions::new().trend(Trend::Sum))
            .unwrap();
        let instance = def.get_or_create_instance(None).unwrap();
        assert_eq!(column.index(), None);

        let query = SeriesQuery::new(Granularity::seconds(5))
            .range(t(0), t(10))
            .trend_column(Arc::clone(&column));
        let series = AggregationEngine::default().compute(&instance, &query).unwrap();
        assert_eq!(series.values().numbers(), vec![0.0, 0.0]);
        assert_eq!(column.index(), Some(0));
        assert!(def.columns().unwrap().is_locked());
    }

    #[test]
    fn test_shortest_skips_before_start_and_stops_after_end() {
        let (instance, _) = event_instance(None);
        for s in [0, 1, 2, 3, 4] {
            instance.write_sample(&[], Some(t(s))).unwrap();
        }
        let query = SeriesQuery::shortest().range(t(1), t(3));
        let series = AggregationEngine::default().compute(&instance, &query).unwrap();
        assert_eq!(series.values().len(), 3);
        assert_eq!(series.values().get(0).unwrap().timestamp(), t(1));
    }

    #[test]
    fn test_straggler_is_skipped_not_stalling() {
        let (instance, _) = event_instance(None);
        instance.write_sample(&[], Some(t(0))).unwrap();
        instance.write_sample(&[], Some(t(6))).unwrap();
        // clock stepped back
        instance.write_sample(&[], Some(t(2))).unwrap();
        instance.write_sample(&[], Some(t(8))).unwrap();

        let query = SeriesQuery::new(Granularity::seconds(5)).range(t(0), t(10));
        let series = AggregationEngine::default().compute(&instance, &query).unwrap();
        assert_eq!(series.values().numbers(), vec![1.0, 2.0]);
        assert_eq!(series.skipped_samples(), 1);
    }

    #[test]
    fn test_trend_named_and_unknown() {
        let (instance, _) = event_instance(Some(Trend::Sum));
        instance.write_sample(&[Some(SampleValue::Int(5))], Some(t(0))).unwrap();
        let engine = AggregationEngine::default();

        let series = engine
            .compute(&instance, &SeriesQuery::shortest().trend_named("AMOUNT"))
            .unwrap();
        assert_eq!(series.values().numbers(), vec![5.0]);

        let err = engine
            .compute(&instance, &SeriesQuery::shortest().trend_named("missing"))
            .unwrap_err();
        assert!(matches!(err, TelemetryError::UnknownValueColumn { .. }));
    }

    #[test]
    fn test_foreign_column_is_rejected() {
        let (instance, _) = event_instance(None);
        let (_, foreign) = event_instance(Some(Trend::Sum));
        let query = SeriesQuery::shortest().trend_column(foreign.unwrap());
        assert!(matches!(
            AggregationEngine::default().compute(&instance, &query),
            Err(TelemetryError::UnknownValueColumn { .. })
        ));
    }

    #[test]
    fn test_coercion_policy_from_config() {
        let registry = DefinitionRegistry::default();
        let def = registry.define_event("Test", "Engine", "Text").unwrap();
        def.add_value_column("v", ValueType::Float, ColumnOptions::new().trend(Trend::Sum))
            .unwrap();
        let instance = def.get_or_create_instance(None).unwrap();
        instance.write_sample(&[Some(SampleValue::from("12.5"))], Some(t(0))).unwrap();
        instance.write_sample(&[Some(SampleValue::from("twelve"))], Some(t(1))).unwrap();

        let query = SeriesQuery::new(Granularity::seconds(10)).range(t(0), t(10)).trend_named("v");
        let series = AggregationEngine::default().compute(&instance, &query).unwrap();
        assert_eq!(series.values().numbers(), vec![12.5]);
        assert_eq!(series.coercion_failures(), 1);

        let strict = AggregationEngine::new(AggregationConfig {
            coercion: CoercionPolicy::Fail,
            ..AggregationConfig::default()
        });
        assert!(matches!(
            strict.compute(&instance, &query),
            Err(TelemetryError::CoercionFailure { .. })
        ));
    }

    #[test]
    fn test_millisecond_floor_applies() {
        let (instance, _) = event_instance(None);
        instance.write_sample(&[], Some(t(0))).unwrap();
        let query = SeriesQuery::new(Granularity::milliseconds(1)).range(t(0), t(0) + Duration::milliseconds(64));
        let series = AggregationEngine::default().compute(&instance, &query).unwrap();
        assert_eq!(series.granularity(), Granularity::milliseconds(16));
        assert_eq!(series.values().len(), 4);
    }

    #[test]
    fn test_sampled_rejects_trend_column() {
        let registry = DefinitionRegistry::default();
        let def = registry
            .define_sampled("Os", "Cpu", "Busy", SamplingType::RawCount)
            .unwrap();
        let instance = def.get_or_create_instance(None).unwrap();
        instance.write_sampled(1.0, None, Some(t(0))).unwrap();

        let query = SeriesQuery::shortest().trend_named("value");
        assert!(matches!(
            AggregationEngine::default().compute(&instance, &query),
            Err(TelemetryError::UnknownValueColumn { .. })
        ));
    }

    #[test]
    fn test_sampled_total_uses_reading_before_start() {
        let registry = DefinitionRegistry::default();
        let def = registry
            .define_sampled("Net", "Nic", "Bytes", SamplingType::TotalCount)
            .unwrap();
        let instance = def.get_or_create_instance(None).unwrap();
        for (s, total) in [(0, 100.0), (5, 160.0), (10, 200.0)] {
            instance.write_sampled(total, None, Some(t(s))).unwrap();
        }

        let query = SeriesQuery::new(Granularity::seconds(5)).range(t(1), t(11));
        let series = AggregationEngine::default().compute(&instance, &query).unwrap();
        assert_eq!(series.values().numbers(), vec![60.0, 40.0]);
        assert_eq!(series.skipped_samples(), 0);
    }
}
