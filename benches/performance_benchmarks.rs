use chrono::{DateTime, Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use quickhealth::{
    intervals, AggregationOrchestrator, DailySeries, DayBucketer, DayCalendar, MemorySampleSource,
    RequestConfiguration, Sample, SampleCategory,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Performance benchmarks for the aggregation engine
///
/// These benchmarks exercise the core reducers with varying dataset sizes
/// to ensure scalability.

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

/// Beat times with a slowly oscillating interval around 850 ms
fn create_beat_series(beats: usize) -> Vec<f64> {
    let mut t = 0.0;
    (0..beats)
        .map(|i| {
            let current = t;
            t += 850.0 + 60.0 * ((i as f64) / 5.0).sin();
            current
        })
        .collect()
}

/// One sample every `spacing_minutes` for `days` days, for each category
fn create_sample_dataset(days: i64, spacing_minutes: i64) -> Vec<Sample> {
    let categories = [
        SampleCategory::HeartRate,
        SampleCategory::StepCount,
        SampleCategory::HrvSdnn,
        SampleCategory::BloodGlucose,
    ];
    let per_day = 24 * 60 / spacing_minutes;

    categories
        .iter()
        .flat_map(|&category| {
            (0..days * per_day).map(move |i| {
                let at = base_time() + Duration::minutes(i * spacing_minutes);
                Sample::instant(category, 50.0 + (i % 40) as f64, at)
            })
        })
        .collect()
}

fn bench_interval_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("Interval Analysis");

    for &beats in &[60, 300, 1200, 6000] {
        let series = create_beat_series(beats);

        group.throughput(Throughput::Elements(beats as u64));
        group.bench_with_input(BenchmarkId::new("analyze", beats), &series, |b, series| {
            b.iter(|| intervals::analyze(black_box(series)));
        });
    }

    group.finish();
}

fn bench_day_bucketing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Day Bucketing");
    let bucketer = DayBucketer::new(DayCalendar::utc());

    for &days in &[7, 30, 90, 365] {
        let mut collections: BTreeMap<SampleCategory, Vec<Sample>> = BTreeMap::new();
        for sample in create_sample_dataset(days, 15) {
            collections.entry(sample.category).or_default().push(sample);
        }
        let end = base_time() + Duration::days(days) - Duration::seconds(1);

        group.throughput(Throughput::Elements(days as u64));
        group.bench_with_input(BenchmarkId::new("bucket", days), &collections, |b, collections| {
            b.iter(|| bucketer.bucket(base_time(), end, black_box(collections), true));
        });
    }

    group.finish();
}

fn bench_cross_day_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("Cross-Day Aggregation");
    let bucketer = DayBucketer::new(DayCalendar::utc());

    for &days in &[30, 365] {
        let mut collections: BTreeMap<SampleCategory, Vec<Sample>> = BTreeMap::new();
        for sample in create_sample_dataset(days, 15) {
            collections.entry(sample.category).or_default().push(sample);
        }
        let end = base_time() + Duration::days(days) - Duration::seconds(1);
        let records = bucketer.bucket(base_time(), end, &collections, true);

        group.bench_with_input(BenchmarkId::new("average", days), &records, |b, records| {
            b.iter(|| records.average(black_box(SampleCategory::HeartRate)));
        });
        group.bench_with_input(BenchmarkId::new("step_count", days), &records, |b, records| {
            b.iter(|| records.step_count());
        });
    }

    group.finish();
}

fn bench_full_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("Full Aggregation");
    group.sample_size(20);

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let config = RequestConfiguration::none()
        .with(SampleCategory::HeartRate)
        .with(SampleCategory::StepCount)
        .with(SampleCategory::HrvSdnn)
        .with(SampleCategory::BloodGlucose);

    for &days in &[7, 30, 90] {
        let source = MemorySampleSource::new().with_samples(create_sample_dataset(days, 15));
        let orchestrator = AggregationOrchestrator::new(Arc::new(source), DayCalendar::utc());
        let end = base_time() + Duration::days(days) - Duration::seconds(1);

        group.throughput(Throughput::Elements(days as u64));
        group.bench_with_input(BenchmarkId::new("aggregate", days), &orchestrator, |b, orchestrator| {
            b.iter(|| runtime.block_on(orchestrator.aggregate(base_time(), end, &config, true)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_interval_analysis,
    bench_day_bucketing,
    bench_cross_day_aggregation,
    bench_full_aggregation
);
criterion_main!(benches);
