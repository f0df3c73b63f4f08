//! Aggregation throughput over stores of increasing size.

use chrono::{Duration as ChronoDuration, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use std::sync::Arc;
use trendline::aggregation::{Granularity, SeriesQuery, ValueSet};
use trendline::metrics::{ColumnOptions, MetricInstance, SampleValue, Trend, ValueColumn, ValueType};
use trendline::Telemetry;

fn populated(telemetry: &Telemetry, samples: usize) -> (Arc<MetricInstance>, Arc<ValueColumn>) {
    let def = telemetry
        .define_event_metric("Bench", "Aggregation", &format!("events{}", samples))
        .unwrap();
    let column = telemetry
        .add_value_column(&def, "latency", ValueType::Float, ColumnOptions::new().trend(Trend::Average))
        .unwrap();
    let instance = telemetry.get_or_create_instance(&def, None).unwrap();

    let mut rng = rand::thread_rng();
    let start = Utc::now();
    for i in 0..samples {
        telemetry
            .write_sample(
                &instance,
                &[Some(SampleValue::Float(rng.gen_range(1.0..250.0)))],
                Some(start + ChronoDuration::milliseconds(i as i64 * 100)),
            )
            .unwrap();
    }
    (instance, column)
}

fn bench_compute_series(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_series");
    let telemetry = Telemetry::default();

    for size in [1_000usize, 10_000, 100_000] {
        let (instance, column) = populated(&telemetry, size);
        group.throughput(Throughput::Elements(size as u64));

        let shortest = SeriesQuery::shortest().trend_column(Arc::clone(&column));
        group.bench_with_input(BenchmarkId::new("shortest", size), &shortest, |b, query| {
            b.iter(|| black_box(telemetry.query(&instance, query).unwrap()));
        });

        let windows = SeriesQuery::new(Granularity::seconds(10)).trend_column(Arc::clone(&column));
        group.bench_with_input(BenchmarkId::new("ten_second_windows", size), &windows, |b, query| {
            b.iter(|| black_box(telemetry.query(&instance, query).unwrap()));
        });

        let count = SeriesQuery::new(Granularity::minutes(1));
        group.bench_with_input(BenchmarkId::new("count_one_minute", size), &count, |b, query| {
            b.iter(|| black_box(telemetry.query(&instance, query).unwrap()));
        });
    }

    group.finish();
}

fn bench_value_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("value_set");
    let now = Utc::now();

    for size in [1_000usize, 100_000] {
        group.bench_with_input(BenchmarkId::new("add_then_p95", size), &size, |b, &size| {
            b.iter(|| {
                let set = ValueSet::with_capacity(0.95, size);
                for i in 0..size {
                    set.add(now, black_box(i as f64));
                }
                black_box(set.percentile())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compute_series, bench_value_set);
criterion_main!(benches);
