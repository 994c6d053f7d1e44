//! Peak quality: a weighted linear model over volume surge and candle range.

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, PeakScoringConfig, ScoreCurve};
use crate::domain::Peak;

/// Linear interpolation to 0-100 between `low` and `high`, clamped outside.
pub fn linear_score(value: f64, low: f64, high: f64) -> f64 {
    if value <= low {
        0.0
    } else if value >= high {
        100.0
    } else {
        (value - low) / (high - low) * 100.0
    }
}

/// Logarithmic interpolation to 0-100: every doubling gains the same score.
///
/// Requires `low > 0`.
pub fn log_score(value: f64, low: f64, high: f64) -> f64 {
    if value <= low {
        return 0.0;
    }
    if value >= high {
        return 100.0;
    }
    (value / low).ln() / (high / low).ln() * 100.0
}

/// One weighted input to the peak score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakScoreComponent {
    pub name: String,
    pub raw_value: f64,
    pub score: f64,
    pub weight: f64,
}

impl PeakScoreComponent {
    pub fn weighted(&self) -> f64 {
        self.score * self.weight
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakScoreBreakdown {
    pub peak_id: crate::domain::PeakId,
    pub total: f64,
    pub components: Vec<PeakScoreComponent>,
}

#[derive(Debug, Clone)]
pub struct PeakScorer {
    config: PeakScoringConfig,
}

impl PeakScorer {
    pub fn new(config: PeakScoringConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PeakScoringConfig {
        &self.config
    }

    pub fn score(&self, peak: &Peak) -> f64 {
        self.breakdown(peak).total
    }

    pub fn breakdown(&self, peak: &Peak) -> PeakScoreBreakdown {
        let c = &self.config;
        let volume_score = match c.volume_curve {
            ScoreCurve::Logarithmic => log_score(peak.volume_surge_ratio, c.volume_low, c.volume_high),
            ScoreCurve::Linear => linear_score(peak.volume_surge_ratio, c.volume_low, c.volume_high),
        };
        let candle_abs = peak.candle_change_pct.abs();
        let candle_score = linear_score(candle_abs, c.candle_low, c.candle_high);

        let components = vec![
            PeakScoreComponent {
                name: "volume".into(),
                raw_value: peak.volume_surge_ratio,
                score: volume_score,
                weight: c.volume_weight,
            },
            PeakScoreComponent {
                name: "candle".into(),
                raw_value: candle_abs,
                score: candle_score,
                weight: c.candle_weight,
            },
        ];
        let total = components.iter().map(PeakScoreComponent::weighted).sum::<f64>().clamp(0.0, 100.0);
        PeakScoreBreakdown { peak_id: peak.id, total, components }
    }
}
