//! Criterion benchmarks for breakscan hot paths.
//!
//! Benchmarks:
//! 1. Incremental detection (`add_bar` over a full history)
//! 2. Historical scan (detect, enrich, score)
//! 3. Breakout scoring on its own
//! 4. Snapshot encode/decode/restore

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use breakscan_core::config::{BreakoutScoringConfig, DetectorConfig, ScreenerConfig};
use breakscan_core::domain::Bar;
use breakscan_core::scoring::BreakoutScorer;
use breakscan_core::{scan_history, BreakoutDetector, DetectorSnapshot};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_bars(n: usize) -> Vec<Bar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2015, 1, 2).unwrap();
    (0..n)
        .map(|i| {
            let t = i as f64;
            let close = 100.0 + (t * 0.11).sin() * 10.0 + (t * 0.37).cos() * 3.0 + t * 0.02;
            let open = close - 0.3;
            Bar::new(
                i,
                base_date + chrono::Duration::days(i as i64),
                open,
                close + 1.5,
                close - 1.5,
                close,
                1_000_000 + (i as u64 * 7_919) % 500_000,
            )
        })
        .collect()
}

// ── 1. Incremental detection ─────────────────────────────────────────

fn bench_add_bar(c: &mut Criterion) {
    let mut group = c.benchmark_group("detector_add_bar");

    for &bar_count in &[252, 1260, 5040] {
        let bars = make_bars(bar_count);
        group.bench_with_input(BenchmarkId::new("fresh", bar_count), &bars, |b, bars| {
            b.iter(|| {
                let mut det = BreakoutDetector::new("BENCH", DetectorConfig::default()).unwrap();
                for bar in bars.iter().cloned() {
                    black_box(det.add_bar(bar).unwrap());
                }
                det
            });
        });
    }

    group.finish();
}

// ── 2. Historical scan ───────────────────────────────────────────────

fn bench_scan_history(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan_history");
    let config = ScreenerConfig::default();

    for &bar_count in &[1260, 5040] {
        let bars = make_bars(bar_count);
        group.bench_with_input(BenchmarkId::new("default", bar_count), &bars, |b, bars| {
            b.iter(|| scan_history("BENCH", black_box(bars), black_box(&config)).unwrap());
        });
    }

    group.finish();
}

// ── 3. Scoring ───────────────────────────────────────────────────────

fn bench_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("breakout_scoring");
    let bars = make_bars(5040);
    let breakouts = BreakoutDetector::new("BENCH", DetectorConfig::default())
        .unwrap()
        .add_bars(bars)
        .unwrap();
    let scorer = BreakoutScorer::new(BreakoutScoringConfig::default()).unwrap();

    group.bench_function("score_all", |b| {
        b.iter(|| {
            breakouts
                .iter()
                .map(|bo| scorer.score(black_box(bo)))
                .sum::<f64>()
        });
    });

    group.finish();
}

// ── 4. Snapshot ──────────────────────────────────────────────────────

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");
    let mut det = BreakoutDetector::new("BENCH", DetectorConfig::default()).unwrap();
    det.add_bars(make_bars(2520)).unwrap();
    let json = det.snapshot().to_json().unwrap();

    group.bench_function("encode_2520", |b| {
        b.iter(|| det.snapshot().to_json().unwrap());
    });
    group.bench_function("decode_restore_2520", |b| {
        b.iter(|| {
            let snapshot = DetectorSnapshot::from_json(black_box(&json)).unwrap();
            BreakoutDetector::restore(snapshot).unwrap()
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_add_bar,
    bench_scan_history,
    bench_scoring,
    bench_snapshot,
);
criterion_main!(benches);
