//! Snapshot contract tests: warm restarts, halted streams and schema versioning.

use breakscan_core::config::{DetectorConfig, PeakScoringConfig, ScreenerConfig};
use breakscan_core::domain::Bar;
use breakscan_core::{
    BreakoutDetector, DetectorError, DetectorSnapshot, Screener, SnapshotError,
    SNAPSHOT_SCHEMA_VERSION,
};
use chrono::NaiveDate;

// ── Helpers ──────────────────────────────────────────────────────────

fn wave(n: usize) -> Vec<Bar> {
    let base = NaiveDate::from_ymd_opt(2023, 3, 1).unwrap();
    (0..n)
        .map(|i| {
            let t = i as f64;
            let high = 50.0 + 4.0 * (t / 7.0).sin() + 1.5 * (t / 1.9).cos() + t * 0.03;
            Bar::new(
                i,
                base + chrono::Duration::days(i as i64),
                high - 0.6,
                high,
                high - 1.2,
                high - 0.3,
                20_000 + (i as u64 * 37) % 9_000,
            )
        })
        .collect()
}

fn detector() -> BreakoutDetector {
    BreakoutDetector::new("SNAP", DetectorConfig::default()).unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────

#[test]
fn restore_matches_uninterrupted_run() {
    let bars = wave(250);
    let mut whole = detector();
    let expected = whole.add_bars(bars.clone()).unwrap();
    assert!(!expected.is_empty());

    for split in [0, 1, 37, 120, 249] {
        let mut first = detector();
        let mut got = first.add_bars(bars[..split].to_vec()).unwrap();

        let mut buf = Vec::new();
        first.snapshot().write_to(&mut buf).unwrap();
        let snapshot = DetectorSnapshot::read_from(buf.as_slice()).unwrap();
        let mut resumed = BreakoutDetector::restore(snapshot).unwrap();
        got.extend(resumed.add_bars(bars[split..].to_vec()).unwrap());

        assert_eq!(got, expected, "split at {split}");
        assert_eq!(resumed.active_peaks(), whole.active_peaks());
        assert_eq!(resumed.breakout_history().len(), whole.breakout_history().len());
    }
}

#[test]
fn id_counter_survives_restore() {
    let bars = wave(200);
    let mut det = detector();
    det.add_bars(bars[..100].to_vec()).unwrap();
    let counter = det.snapshot().next_peak_id;
    assert!(counter > 0);

    let mut resumed = BreakoutDetector::restore(det.snapshot()).unwrap();
    resumed.add_bars(bars[100..].to_vec()).unwrap();
    let new_ids: Vec<u64> = resumed
        .active_peaks()
        .iter()
        .filter(|p| p.index >= 100)
        .map(|p| p.id.0)
        .collect();
    assert!(new_ids.iter().all(|&id| id >= counter));
}

#[test]
fn halted_flag_persists() {
    let bars = wave(30);
    let mut det = detector();
    det.add_bars(bars[..20].to_vec()).unwrap();
    assert!(det.add_bar(bars[25].clone()).is_err());

    let snapshot = det.snapshot();
    assert!(snapshot.halted);
    let mut resumed = BreakoutDetector::restore(snapshot).unwrap();
    assert!(matches!(
        resumed.add_bar(bars[20].clone()),
        Err(DetectorError::Halted { .. })
    ));
}

#[test]
fn snapshot_json_carries_version() {
    let json = detector().snapshot().to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["schema_version"], SNAPSHOT_SCHEMA_VERSION);
}

#[test]
fn unknown_version_fails_loudly() {
    let mut det = detector();
    det.add_bars(wave(60)).unwrap();
    let json = det.snapshot().to_json().unwrap();
    let bumped = json.replacen(
        &format!("\"schema_version\": {SNAPSHOT_SCHEMA_VERSION}"),
        "\"schema_version\": 99",
        1,
    );
    assert_ne!(bumped, json);
    assert!(matches!(
        DetectorSnapshot::from_json(&bumped),
        Err(SnapshotError::IncompatibleVersion { found: 99, .. })
    ));
}

#[test]
fn screener_resumes_under_same_config_only() {
    let bars = wave(150);
    let config = ScreenerConfig::default();

    let mut screener = Screener::new("SNAP", config.clone()).unwrap();
    screener.scan(bars[..80].to_vec()).unwrap();
    let snapshot = screener.snapshot();

    let mut resumed = Screener::from_snapshot(snapshot.clone(), config.clone()).unwrap();
    assert_eq!(resumed.detector().next_index(), 80);
    resumed.scan(bars[80..].to_vec()).unwrap();

    let mut other = config;
    other.detector.exceed_threshold = 0.01;
    assert!(Screener::from_snapshot(snapshot.clone(), other).is_err());

    let scoring = PeakScoringConfig {
        volume_weight: 0.5,
        candle_weight: 0.5,
        ..Default::default()
    };
    assert!(matches!(
        BreakoutDetector::restore_with_config(snapshot, &DetectorConfig::default(), &scoring),
        Err(SnapshotError::ConfigMismatch { .. })
    ));
}
