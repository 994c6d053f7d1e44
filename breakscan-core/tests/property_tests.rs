//! Property tests for detector and scorer invariants.
//!
//! Uses proptest to verify:
//! 1. Confirmation windows: every registry peak satisfies both per-side
//!    minimums, the window sum and the relative height
//! 2. Per-side minimum: a long left side never compensates for a short right side
//! 3. Determinism: two fresh detectors fed the same bars agree exactly
//! 4. Snapshot equivalence: split, snapshot, restore and continue matches
//!    an uninterrupted run
//! 5. Scoring degeneracy and monotonicity of the bonus model

use breakscan_core::config::{BonusLadder, BreakoutScoringConfig, DetectorConfig};
use breakscan_core::domain::{Bar, Breakout, BreakoutFeatures, CandleType, Peak, PeakId, PeakStatus};
use breakscan_core::scoring::BreakoutScorer;
use breakscan_core::{BreakoutDetector, DetectorSnapshot};
use chrono::NaiveDate;
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

/// One step of a random walk: (return, upper wick, lower wick, volume).
fn arb_step() -> impl Strategy<Value = (f64, f64, f64, u64)> {
    (-0.03..0.03_f64, 0.0..0.02_f64, 0.0..0.02_f64, 1_000..100_000_u64)
}

fn arb_walk(len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<Bar>> {
    prop::collection::vec(arb_step(), len).prop_map(|steps| walk(&steps))
}

fn walk(steps: &[(f64, f64, f64, u64)]) -> Vec<Bar> {
    let base = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
    let mut prev_close = 100.0;
    steps
        .iter()
        .enumerate()
        .map(|(i, &(ret, up, down, volume))| {
            let open = prev_close;
            let close = open * (1.0 + ret);
            let high = open.max(close) * (1.0 + up);
            let low = open.min(close) * (1.0 - down);
            prev_close = close;
            Bar::new(i, base + chrono::Duration::days(i as i64), open, high, low, close, volume)
        })
        .collect()
}

fn bars_from_highs(highs: &[f64]) -> Vec<Bar> {
    let base = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
    highs
        .iter()
        .enumerate()
        .map(|(i, &h)| {
            Bar::new(i, base + chrono::Duration::days(i as i64), h - 1.0, h, h - 2.0, h - 0.5, 10_000)
        })
        .collect()
}

fn detector() -> BreakoutDetector {
    BreakoutDetector::new("PROP", DetectorConfig::default()).unwrap()
}

// ── 1. Confirmation windows ──────────────────────────────────────────

proptest! {
    /// Every peak in the registry passed all confirmation conditions.
    #[test]
    fn registry_peaks_satisfy_confirmation(bars in arb_walk(30..300)) {
        let config = DetectorConfig::default();
        let mut det = detector();
        for bar in bars {
            det.add_bar(bar).unwrap();
            for peak in det.active_peaks() {
                prop_assert!(peak.left_confirmation_bars >= config.min_side_bars);
                prop_assert!(peak.right_confirmation_bars >= config.min_side_bars);
                prop_assert!(
                    peak.left_confirmation_bars + peak.right_confirmation_bars >= config.total_window
                );
                prop_assert!(peak.relative_height >= config.min_relative_height);
                prop_assert!(peak.confirmed_at > peak.index);
                prop_assert!(peak.status.is_active());
            }
        }
    }

    /// Peak ids are unique, increase with creation and stay below the counter.
    #[test]
    fn peak_ids_never_reused(bars in arb_walk(30..300)) {
        let mut det = detector();
        let mut seen: Vec<PeakId> = Vec::new();
        for bar in bars {
            det.add_bar(bar).unwrap();
            for peak in det.active_peaks() {
                if !seen.contains(&peak.id) {
                    if let Some(last) = seen.last() {
                        prop_assert!(peak.id > *last);
                    }
                    seen.push(peak.id);
                }
            }
        }
        let snapshot = det.snapshot();
        prop_assert!(seen.iter().all(|id| id.0 < snapshot.next_peak_id));
    }

    /// Breakouts always reference at least one peak, and superseded peaks
    /// are a subset of the broken ones that left the registry.
    #[test]
    fn breakouts_reference_broken_peaks(bars in arb_walk(30..300)) {
        let mut det = detector();
        for bar in bars {
            if let Some(bo) = det.add_bar(bar).unwrap() {
                prop_assert!(bo.num_peaks_broken() >= 1);
                let active: Vec<PeakId> = det.active_peaks().iter().map(|p| p.id).collect();
                for peak in &bo.superseded_peaks {
                    prop_assert!(bo.broken_peak_ids().contains(&peak.id));
                    prop_assert!(!active.contains(&peak.id));
                    prop_assert_eq!(peak.status, PeakStatus::Superseded);
                }
            }
        }
    }
}

// ── 2. Per-side minimum ──────────────────────────────────────────────

proptest! {
    /// A rising run of any length, one lower bar, then a higher bar: the top
    /// of the run has the window sum but only one bar on its right.
    #[test]
    fn long_left_short_right_never_confirms(
        left in 9usize..40,
        step in 0.1..2.0_f64,
        dip in 0.5..5.0_f64,
        jump in 0.5..5.0_f64,
    ) {
        let mut highs: Vec<f64> = (0..=left).map(|i| 100.0 + i as f64 * step).collect();
        let top = *highs.last().unwrap();
        highs.push(top - dip);
        highs.push(top + jump);
        highs.extend((1..=12).map(|i| top + jump - i as f64 * 0.5));

        let mut det = detector();
        det.add_bars(bars_from_highs(&highs)).unwrap();
        prop_assert!(det.active_peaks().iter().all(|p| p.index != left));
    }

    /// The mirror case: one lower bar on the left, a long fall on the right.
    #[test]
    fn short_left_long_right_never_confirms(
        right in 9usize..40,
        step in 0.1..1.0_f64,
    ) {
        let mut highs = vec![200.0, 100.0, 150.0];
        highs.extend((1..=right).map(|i| 150.0 - i as f64 * step));

        let mut det = detector();
        det.add_bars(bars_from_highs(&highs)).unwrap();
        prop_assert!(det.active_peaks().iter().all(|p| p.index != 2));
    }
}

// ── 3. Determinism ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn fresh_detectors_agree(bars in arb_walk(30..300)) {
        let mut a = detector();
        let mut b = detector();
        let bo_a = a.add_bars(bars.clone()).unwrap();
        let bo_b = b.add_bars(bars).unwrap();
        prop_assert_eq!(bo_a, bo_b);
        prop_assert_eq!(a.active_peaks(), b.active_peaks());
    }
}

// ── 4. Snapshot equivalence ──────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn restore_continues_like_uninterrupted_run(
        bars in arb_walk(40..250),
        split_frac in 0.0..1.0_f64,
    ) {
        let split = ((bars.len() as f64) * split_frac) as usize;

        let mut whole = detector();
        let expected: Vec<Breakout> = whole.add_bars(bars.clone()).unwrap();

        let mut first = detector();
        let mut got = first.add_bars(bars[..split].to_vec()).unwrap();
        let json = first.snapshot().to_json().unwrap();
        let mut resumed = BreakoutDetector::restore(DetectorSnapshot::from_json(&json).unwrap()).unwrap();
        got.extend(resumed.add_bars(bars[split..].to_vec()).unwrap());

        prop_assert_eq!(got, expected);
        prop_assert_eq!(resumed.active_peaks(), whole.active_peaks());
        prop_assert_eq!(resumed.pending_candidates(), whole.pending_candidates());
        prop_assert_eq!(resumed.snapshot(), whole.snapshot());
    }
}

// ── 5. Scoring ───────────────────────────────────────────────────────

/// Measured quantities for a single-peak breakout.
#[derive(Debug, Clone)]
struct Quantities {
    age: usize,
    height: f64,
    peak_volume: f64,
    volume: f64,
    gap: f64,
    continuity: usize,
    momentum: usize,
    /// Broken peaks, each 2% above the previous, so all share one cluster.
    tests: usize,
    atr_return: f64,
}

/// Quantities strictly below every default threshold.
fn arb_quiet() -> impl Strategy<Value = Quantities> {
    (
        0usize..21,
        0.0..0.10_f64,
        0.0..5.0_f64,
        0.0..1.5_f64,
        0.0..0.01_f64,
        0usize..3,
        1usize..2,
        -3.0..1.5_f64,
    )
        .prop_map(|(age, height, peak_volume, volume, gap, continuity, momentum, atr_return)| {
            Quantities {
                age,
                height,
                peak_volume,
                volume,
                gap,
                continuity,
                momentum,
                tests: 1,
                atr_return,
            }
        })
}

fn breakout_from(q: &Quantities) -> Breakout {
    let base = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let index = 300;
    let peak_index = index - q.age;
    let peaks: Vec<Peak> = (0..q.tests)
        .map(|k| Peak {
            id: PeakId(k as u64),
            index: peak_index,
            date: base + chrono::Duration::days(peak_index as i64),
            price: 100.0 * 1.02_f64.powi(k as i32),
            relative_height: q.height,
            left_confirmation_bars: 5,
            right_confirmation_bars: 5,
            confirmed_at: peak_index + 5,
            volume_surge_ratio: q.peak_volume,
            candle_change_pct: 0.0,
            quality_score: None,
            status: PeakStatus::Tested,
        })
        .collect();
    let price = peaks.last().map_or(100.0, |p| p.price) * 1.01;
    Breakout {
        symbol: "SCORE".into(),
        index,
        date: base + chrono::Duration::days(index as i64),
        price,
        candle_type: CandleType::Bullish,
        broken_peaks: peaks,
        superseded_peaks: Vec::new(),
        recent_breakout_count: q.momentum,
        features: Some(BreakoutFeatures {
            volume_surge_ratio: q.volume,
            gap_up_pct: q.gap,
            continuity_days: q.continuity,
            recent_breakout_count: q.momentum,
            daily_return_atr_ratio: Some(q.atr_return),
            ..Default::default()
        }),
        quality_score: None,
        score: None,
    }
}

fn scorer() -> BreakoutScorer {
    BreakoutScorer::new(BreakoutScoringConfig::default()).unwrap()
}

fn scorer_with_atr_return() -> BreakoutScorer {
    BreakoutScorer::new(BreakoutScoringConfig {
        atr_return: Some(BonusLadder::new(vec![1.5, 3.0], vec![1.10, 1.25])),
        ..Default::default()
    })
    .unwrap()
}

proptest! {
    /// Nothing crosses a threshold: the score is exactly the base.
    #[test]
    fn quiet_breakout_scores_base(q in arb_quiet()) {
        for scorer in [scorer(), scorer_with_atr_return()] {
            let breakdown = scorer.breakdown(&breakout_from(&q));
            prop_assert_eq!(breakdown.total, scorer.config().base_score);
            prop_assert!(breakdown.bonuses.iter().all(|b| !b.triggered()));
        }
    }

    /// Crossing any single first threshold strictly raises the score.
    #[test]
    fn crossing_one_threshold_raises_score(q in arb_quiet(), which in 0usize..9) {
        let scorer = scorer_with_atr_return();
        let before = scorer.score(&breakout_from(&q));
        let mut raised = q.clone();
        match which {
            0 => raised.age = 21,
            1 => raised.height = 0.10,
            2 => raised.peak_volume = 5.0,
            3 => raised.volume = 1.5,
            4 => raised.gap = 0.01,
            5 => raised.continuity = 3,
            6 => raised.momentum = 2,
            7 => raised.tests = 2,
            _ => raised.atr_return = 1.5,
        }
        let after = scorer.score(&breakout_from(&raised));
        prop_assert!(after > before, "{} !> {} for family {}", after, before, which);
    }

    /// Scores never fall below the base, whatever the quantities.
    #[test]
    fn score_never_below_base(
        q in arb_quiet(),
        age in 0usize..400,
        volume in 0.0..20.0_f64,
        momentum in 1usize..10,
    ) {
        let mut q = q;
        q.age = age.min(300);
        q.volume = volume;
        q.momentum = momentum;
        let scorer = scorer();
        prop_assert!(scorer.score(&breakout_from(&q)) >= scorer.config().base_score);
    }
}
