use blackbox::rotation::{matches_cron, RotationPolicy};
use blackbox::storage::{rotate_at, BackupFamily, MemoryStorage};
use chrono::{DateTime, Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tokio::runtime::Runtime;

const STRATEGIES: [&str; 4] = ["0 * * * * 24", "0 0 * * * 14", "0 0 * * 0 8", "0 0 1 * * 12"];

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap()
}

/// Hourly timestamps, newest first
fn hourly(count: i64) -> Vec<DateTime<Utc>> {
    (0..count).map(|hours| now() - Duration::hours(hours)).collect()
}

fn benchmark_cron_matching(c: &mut Criterion) {
    let dt = now();

    c.bench_function("matches_cron_wildcard", |b| {
        b.iter(|| matches_cron(black_box("* * * * *"), black_box(&dt)))
    });

    c.bench_function("matches_cron_mixed_fields", |b| {
        b.iter(|| matches_cron(black_box("*/15 0-6 1,15 * 0"), black_box(&dt)))
    });
}

fn benchmark_decision_pass(c: &mut Criterion) {
    let policy = RotationPolicy::new(&STRATEGIES, Some(3)).unwrap();
    let mut group = c.benchmark_group("decision_pass");

    for count in [100i64, 1_000, 10_000] {
        let timestamps = hourly(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &timestamps, |b, timestamps| {
            b.iter(|| {
                let mut pass = policy.start_pass(now());
                let deleted = timestamps
                    .iter()
                    .filter(|dt| pass.decide(**dt).map(|d| d.is_delete()).unwrap_or(false))
                    .count();
                black_box(deleted)
            })
        });
    }

    group.finish();
}

fn benchmark_rotation_driver(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let family = BackupFamily::with_defaults("main").unwrap();
    let policy = RotationPolicy::new(&STRATEGIES, None).unwrap();

    c.bench_function("rotate_memory_storage_1000", |b| {
        b.iter(|| {
            let storage = MemoryStorage::new("bench");
            for dt in hourly(1_000) {
                let name = format!("main_blackbox_{}.sql.gz", dt.format("%d_%m_%Y_%H"));
                storage.insert(name, dt, &b"dump"[..]);
            }
            rt.block_on(rotate_at(&storage, &family, &policy, now()))
        })
    });
}

criterion_group!(
    benches,
    benchmark_cron_matching,
    benchmark_decision_pass,
    benchmark_rotation_driver
);
criterion_main!(benches);
