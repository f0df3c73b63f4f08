//! Common test utilities and fixtures.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use trendline::metrics::{ColumnOptions, MetricDefinition, MetricInstance, SampleValue, Trend, ValueColumn, ValueType};
use trendline::Telemetry;

/// Fixed origin so window boundaries are predictable
pub fn origin() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

/// `origin() + seconds`
pub fn at(seconds: i64) -> DateTime<Utc> {
    origin() + Duration::seconds(seconds)
}

/// `origin() + ms`
pub fn at_ms(ms: i64) -> DateTime<Utc> {
    origin() + Duration::milliseconds(ms)
}

/// Event definition with one trendable integer column using `trend`
pub struct EventFixture {
    pub telemetry: Telemetry,
    pub definition: Arc<MetricDefinition>,
    pub column: Arc<ValueColumn>,
    pub instance: Arc<MetricInstance>,
}

impl EventFixture {
    pub fn new(trend: Trend) -> Self {
        Self::with_type(ValueType::Int, trend)
    }

    pub fn with_type(value_type: ValueType, trend: Trend) -> Self {
        let telemetry = Telemetry::default();
        let definition = telemetry.define_event_metric("Test", "Fixture", "Events").unwrap();
        let column = telemetry
            .add_value_column(&definition, "amount", value_type, ColumnOptions::new().trend(trend))
            .unwrap();
        let instance = telemetry.get_or_create_instance(&definition, None).unwrap();
        Self {
            telemetry,
            definition,
            column,
            instance,
        }
    }

    /// Write `(seconds, value)` pairs in order
    pub fn write(&self, points: &[(i64, i64)]) {
        for (seconds, value) in points {
            self.telemetry
                .write_sample(&self.instance, &[Some(SampleValue::Int(*value))], Some(at(*seconds)))
                .unwrap();
        }
    }
}
