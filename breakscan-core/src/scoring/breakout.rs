//! Breakout quality: base score times a product of step-function bonuses.
//!
//! Every bonus is >= 1.0 and depends on one measured quantity, so a breakout
//! that triggers nothing scores exactly `base_score`. Totals are unbounded and
//! only meaningful relative to each other.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::cluster::largest_cluster;
use crate::config::{BonusLadder, BreakoutScoringConfig, ConfigError};
use crate::domain::Breakout;

/// The measured quantity behind a bonus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BonusKind {
    /// Oldest broken peak's distance from the breakout, in bars.
    Age,
    /// Size of the largest resistance cluster among broken peaks.
    Tests,
    /// Maximum relative height among broken peaks.
    Height,
    /// Maximum volume surge among broken peaks.
    PeakVolume,
    Volume,
    Gap,
    Continuity,
    Momentum,
    AtrReturn,
}

impl BonusKind {
    pub fn label(self) -> &'static str {
        match self {
            BonusKind::Age => "age",
            BonusKind::Tests => "tests",
            BonusKind::Height => "height",
            BonusKind::PeakVolume => "peak_volume",
            BonusKind::Volume => "volume",
            BonusKind::Gap => "gap",
            BonusKind::Continuity => "continuity",
            BonusKind::Momentum => "momentum",
            BonusKind::AtrReturn => "atr_return",
        }
    }

    pub fn is_resistance_attribute(self) -> bool {
        matches!(
            self,
            BonusKind::Age | BonusKind::Tests | BonusKind::Height | BonusKind::PeakVolume
        )
    }
}

/// One bonus family's contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BonusDetail {
    pub kind: BonusKind,
    pub raw_value: f64,
    /// 0 when no threshold was reached.
    pub level: usize,
    pub multiplier: f64,
}

impl BonusDetail {
    pub fn triggered(&self) -> bool {
        self.level > 0
    }
}

/// Auditable result of the multiplicative model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub base: f64,
    pub bonuses: Vec<BonusDetail>,
    pub total: f64,
}

impl ScoreBreakdown {
    pub fn bonus(&self, kind: BonusKind) -> Option<&BonusDetail> {
        self.bonuses.iter().find(|b| b.kind == kind)
    }

    /// e.g. `50 × 1.30 × 1.25 = 81.3`; untriggered bonuses are omitted.
    pub fn formula(&self) -> String {
        let mut out = format!("{}", self.base);
        for bonus in self.bonuses.iter().filter(|b| b.triggered()) {
            out.push_str(&format!(" × {:.2}", bonus.multiplier));
        }
        out.push_str(&format!(" = {:.1}", self.total));
        out
    }
}

impl fmt::Display for ScoreBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.formula())?;
        for bonus in &self.bonuses {
            writeln!(
                f,
                "  {:<12} {:>10.4}  level {}  ×{:.2}",
                bonus.kind.label(),
                bonus.raw_value,
                bonus.level,
                bonus.multiplier
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct BreakoutScorer {
    config: BreakoutScoringConfig,
}

impl BreakoutScorer {
    pub fn new(config: BreakoutScoringConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BreakoutScoringConfig {
        &self.config
    }

    /// Score a breakout. Missing features count as zero, except the momentum
    /// count which falls back to the detector's stamp.
    pub fn breakdown(&self, breakout: &Breakout) -> ScoreBreakdown {
        let c = &self.config;
        let features = breakout.features.clone().unwrap_or_default();
        let peaks = &breakout.broken_peaks;

        let tests = largest_cluster(peaks, c.cluster_density_threshold).len();
        let height = peaks.iter().map(|p| p.relative_height).fold(0.0, f64::max);
        let peak_volume = peaks.iter().map(|p| p.volume_surge_ratio).fold(0.0, f64::max);
        let momentum = if breakout.features.is_some() {
            features.recent_breakout_count
        } else {
            breakout.recent_breakout_count
        };

        let mut bonuses = vec![
            evaluate(BonusKind::Age, &c.age, breakout.oldest_peak_age() as f64),
            evaluate(BonusKind::Tests, &c.tests, tests as f64),
            evaluate(BonusKind::Height, &c.height, height),
            evaluate(BonusKind::PeakVolume, &c.peak_volume, peak_volume),
            evaluate(BonusKind::Volume, &c.volume, features.volume_surge_ratio),
            evaluate(BonusKind::Gap, &c.gap, features.gap_up_pct),
            evaluate(BonusKind::Continuity, &c.continuity, features.continuity_days as f64),
            evaluate(BonusKind::Momentum, &c.momentum, momentum as f64),
        ];
        if let Some(ladder) = &c.atr_return {
            match features.daily_return_atr_ratio {
                Some(ratio) => bonuses.push(evaluate(BonusKind::AtrReturn, ladder, ratio)),
                None => bonuses.push(BonusDetail {
                    kind: BonusKind::AtrReturn,
                    raw_value: 0.0,
                    level: 0,
                    multiplier: 1.0,
                }),
            }
        }

        let total = bonuses.iter().fold(c.base_score, |acc, b| acc * b.multiplier);
        ScoreBreakdown { base: c.base_score, bonuses, total }
    }

    pub fn score(&self, breakout: &Breakout) -> f64 {
        self.breakdown(breakout).total
    }

    /// Attach the score to the breakout.
    pub fn apply(&self, mut breakout: Breakout) -> Breakout {
        let breakdown = self.breakdown(&breakout);
        breakout.quality_score = Some(breakdown.total);
        breakout.score = Some(breakdown);
        breakout
    }
}

fn evaluate(kind: BonusKind, ladder: &BonusLadder, value: f64) -> BonusDetail {
    let (multiplier, level) = ladder.evaluate(value);
    BonusDetail { kind, raw_value: value, level, multiplier }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::peak::sample_peak;
    use crate::domain::{BreakoutFeatures, CandleType, Peak};
    use crate::indicators::assert_approx;
    use chrono::NaiveDate;

    fn breakout(index: usize, peaks: Vec<Peak>, features: BreakoutFeatures) -> Breakout {
        Breakout {
            symbol: "TEST".into(),
            index,
            date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            price: 110.0,
            candle_type: CandleType::Bullish,
            broken_peaks: peaks,
            superseded_peaks: Vec::new(),
            recent_breakout_count: features.recent_breakout_count,
            features: Some(features),
            quality_score: None,
            score: None,
        }
    }

    fn quiet_features() -> BreakoutFeatures {
        BreakoutFeatures {
            volume_surge_ratio: 1.0,
            recent_breakout_count: 1,
            ..Default::default()
        }
    }

    fn scorer() -> BreakoutScorer {
        BreakoutScorer::new(BreakoutScoringConfig::default()).unwrap()
    }

    #[test]
    fn no_bonus_scores_base_exactly() {
        let bo = breakout(15, vec![sample_peak(0, 10, 100.0)], quiet_features());
        let breakdown = scorer().breakdown(&bo);
        assert_eq!(breakdown.total, 50.0);
        assert!(breakdown.bonuses.iter().all(|b| b.multiplier == 1.0));
        assert_eq!(breakdown.formula(), "50 = 50.0");
    }

    #[test]
    fn age_and_tests_multiply() {
        let peaks = vec![sample_peak(0, 0, 100.0), sample_peak(1, 40, 101.0)];
        let bo = breakout(100, peaks, quiet_features());
        let breakdown = scorer().breakdown(&bo);
        // age 100 -> 1.30, two peaks in one zone -> 1.10
        assert_approx(breakdown.total, 50.0 * 1.30 * 1.10, 1e-9);
        assert_eq!(breakdown.bonus(BonusKind::Age).unwrap().level, 2);
        assert_eq!(breakdown.bonus(BonusKind::Tests).unwrap().raw_value, 2.0);
        assert_eq!(breakdown.formula(), "50 × 1.30 × 1.10 = 71.5");
    }

    #[test]
    fn behaviour_bonuses() {
        let features = BreakoutFeatures {
            volume_surge_ratio: 2.5,
            gap_up_pct: 0.015,
            continuity_days: 4,
            recent_breakout_count: 3,
            ..Default::default()
        };
        let bo = breakout(15, vec![sample_peak(0, 10, 100.0)], features);
        let total = scorer().score(&bo);
        assert_approx(total, 50.0 * 1.30 * 1.10 * 1.15 * 1.20, 1e-9);
    }

    #[test]
    fn resistance_attributes_from_peaks() {
        let mut tall = sample_peak(0, 10, 100.0);
        tall.relative_height = 0.25;
        tall.volume_surge_ratio = 6.0;
        let bo = breakout(15, vec![tall], quiet_features());
        let breakdown = scorer().breakdown(&bo);
        assert_eq!(breakdown.bonus(BonusKind::Height).unwrap().multiplier, 1.30);
        assert_eq!(breakdown.bonus(BonusKind::PeakVolume).unwrap().multiplier, 1.10);
        assert!(BonusKind::Height.is_resistance_attribute());
        assert!(!BonusKind::Gap.is_resistance_attribute());
    }

    #[test]
    fn atr_return_bonus_is_off_by_default() {
        let features = BreakoutFeatures {
            daily_return_atr_ratio: Some(5.0),
            ..quiet_features()
        };
        let bo = breakout(15, vec![sample_peak(0, 10, 100.0)], features);
        assert!(scorer().breakdown(&bo).bonus(BonusKind::AtrReturn).is_none());

        let config = BreakoutScoringConfig {
            atr_return: Some(BonusLadder::new(vec![1.5, 3.0], vec![1.10, 1.25])),
            ..Default::default()
        };
        let enabled = BreakoutScorer::new(config).unwrap();
        assert_approx(enabled.score(&bo), 50.0 * 1.25, 1e-9);
    }

    #[test]
    fn apply_attaches_score() {
        let bo = breakout(15, vec![sample_peak(0, 10, 100.0)], quiet_features());
        let scored = scorer().apply(bo);
        assert_eq!(scored.quality_score, Some(50.0));
        assert!(scored.score.is_some());
    }

    #[test]
    fn missing_features_use_detector_momentum() {
        let mut bo = breakout(15, vec![sample_peak(0, 10, 100.0)], quiet_features());
        bo.features = None;
        bo.recent_breakout_count = 2;
        assert_approx(scorer().score(&bo), 50.0 * 1.20, 1e-9);
    }
}
