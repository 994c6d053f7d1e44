//! Screening configuration: detector, feature, and scoring parameters.
//!
//! Every section deserializes from TOML with per-field defaults, and every
//! constructor that accepts a section validates it again. A configuration that
//! violates an invariant is rejected before any bar is processed.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::domain::ConfigFingerprint;

/// Configuration faults. Raised once, at construction; never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be > 0")]
    NonPositive { field: &'static str },

    #[error("{field} = {value} is outside {range}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        range: &'static str,
    },

    #[error("min_side_bars ({min_side_bars}) * 2 > total_window ({total_window})")]
    SideBarsExceedWindow {
        min_side_bars: usize,
        total_window: usize,
    },

    #[error("peak_supersede_threshold ({supersede}) must exceed exceed_threshold ({exceed})")]
    SupersedeNotAboveExceed { supersede: f64, exceed: f64 },

    #[error("breakout_modes must not be empty")]
    NoBreakoutModes,

    #[error("{field}: low bound {low} must be below high bound {high}")]
    InvertedBounds {
        field: &'static str,
        low: f64,
        high: f64,
    },

    #[error("peak weights must be non-negative and sum to 1.0 (got {volume} + {candle})")]
    InvalidWeights { volume: f64, candle: f64 },

    #[error("{ladder} bonus: {thresholds} thresholds but {multipliers} multipliers")]
    LadderLengthMismatch {
        ladder: &'static str,
        thresholds: usize,
        multipliers: usize,
    },

    #[error("{ladder} bonus: thresholds must be finite and strictly ascending")]
    LadderThresholdsNotAscending { ladder: &'static str },

    #[error("{ladder} bonus: multipliers must be > 1.0 and strictly ascending")]
    LadderMultipliersInvalid { ladder: &'static str },

    #[error("read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

fn require_positive(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::NonPositive { field });
    }
    Ok(())
}

fn require_positive_f64(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(value > 0.0) || !value.is_finite() {
        return Err(ConfigError::OutOfRange { field, value, range: "(0, inf)" });
    }
    Ok(())
}

// ── Detector ─────────────────────────────────────────────────────────

/// Bar price compared against a peak to detect a break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakoutMode {
    High,
    Close,
    /// max(open, close)
    BodyTop,
}

impl BreakoutMode {
    pub fn measure(self, bar: &crate::domain::Bar) -> f64 {
        match self {
            BreakoutMode::High => bar.high,
            BreakoutMode::Close => bar.close,
            BreakoutMode::BodyTop => bar.body_top(),
        }
    }
}

/// Parameters of the incremental peak/breakout detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Minimum combined count of strictly lower bars on both sides of a peak.
    pub total_window: usize,
    /// Minimum count of strictly lower bars on each side.
    pub min_side_bars: usize,
    /// Minimum height over the surrounding minimum low, as a fraction in (0, 1).
    pub min_relative_height: f64,
    /// A bar breaks a peak when its high exceeds `price * (1 + exceed_threshold)`.
    pub exceed_threshold: f64,
    /// Breaks (and new peaks) with a margin above this remove the older peak.
    pub peak_supersede_threshold: f64,
    /// Trailing window, in bars, for counting recent breakouts.
    pub momentum_window: usize,
    /// Trailing window for a peak bar's volume surge ratio.
    pub peak_volume_lookback: usize,
    /// |close - open| / open below this classifies the breakout candle as a doji.
    pub doji_threshold: f64,
    /// A bar breaks a peak when any enabled measure exceeds it.
    pub breakout_modes: Vec<BreakoutMode>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            total_window: 10,
            min_side_bars: 2,
            min_relative_height: 0.05,
            exceed_threshold: 0.005,
            peak_supersede_threshold: 0.03,
            momentum_window: 20,
            peak_volume_lookback: 63,
            doji_threshold: 0.01,
            breakout_modes: vec![BreakoutMode::High],
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("total_window", self.total_window)?;
        require_positive("min_side_bars", self.min_side_bars)?;
        require_positive("momentum_window", self.momentum_window)?;
        require_positive("peak_volume_lookback", self.peak_volume_lookback)?;

        if self.min_side_bars * 2 > self.total_window {
            return Err(ConfigError::SideBarsExceedWindow {
                min_side_bars: self.min_side_bars,
                total_window: self.total_window,
            });
        }
        if !(self.min_relative_height > 0.0 && self.min_relative_height < 1.0) {
            return Err(ConfigError::OutOfRange {
                field: "min_relative_height",
                value: self.min_relative_height,
                range: "(0, 1)",
            });
        }
        require_positive_f64("exceed_threshold", self.exceed_threshold)?;
        if !(self.peak_supersede_threshold > self.exceed_threshold)
            || !self.peak_supersede_threshold.is_finite()
        {
            return Err(ConfigError::SupersedeNotAboveExceed {
                supersede: self.peak_supersede_threshold,
                exceed: self.exceed_threshold,
            });
        }
        if !(self.doji_threshold >= 0.0) || !self.doji_threshold.is_finite() {
            return Err(ConfigError::OutOfRange {
                field: "doji_threshold",
                value: self.doji_threshold,
                range: "[0, inf)",
            });
        }
        if self.breakout_modes.is_empty() {
            return Err(ConfigError::NoBreakoutModes);
        }
        Ok(())
    }

    /// Highest enabled measure of `bar`; the price compared against peaks.
    pub fn breakout_price(&self, bar: &crate::domain::Bar) -> f64 {
        self.breakout_modes
            .iter()
            .map(|m| m.measure(bar))
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Fingerprint of every parameter that influences detector state.
    ///
    /// Peak scoring is included because peak quality is computed lazily by the
    /// detector and stored on registry entries.
    pub fn fingerprint(
        &self,
        peak_scoring: &PeakScoringConfig,
    ) -> Result<ConfigFingerprint, ConfigError> {
        let canonical = serde_json::to_vec(&(self, peak_scoring))?;
        Ok(ConfigFingerprint::from_bytes(&canonical))
    }
}

// ── Feature enrichment ───────────────────────────────────────────────

/// Forward label window: lowest close within `min_days` after the breakout,
/// then highest high from that low until `max_days` after the breakout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelWindow {
    pub min_days: usize,
    pub max_days: usize,
}

impl LabelWindow {
    pub fn key(&self) -> String {
        format!("label_{}_{}", self.min_days, self.max_days)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Trailing window for the breakout bar's volume surge ratio.
    pub volume_lookback: usize,
    /// Maximum bullish bars counted before the breakout.
    pub continuity_lookback: usize,
    /// Forward bars inspected for stability.
    pub stability_lookforward: usize,
    /// Wilder ATR period for volatility-normalized features.
    pub atr_period: usize,
    pub label_windows: Vec<LabelWindow>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            volume_lookback: 63,
            continuity_lookback: 5,
            stability_lookforward: 10,
            atr_period: 14,
            label_windows: Vec::new(),
        }
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("volume_lookback", self.volume_lookback)?;
        require_positive("continuity_lookback", self.continuity_lookback)?;
        require_positive("stability_lookforward", self.stability_lookforward)?;
        require_positive("atr_period", self.atr_period)?;
        for window in &self.label_windows {
            require_positive("label_windows.min_days", window.min_days)?;
            if window.min_days >= window.max_days {
                return Err(ConfigError::InvertedBounds {
                    field: "label_windows",
                    low: window.min_days as f64,
                    high: window.max_days as f64,
                });
            }
        }
        Ok(())
    }
}

// ── Peak scoring ─────────────────────────────────────────────────────

/// Interpolation curve between a sub-score's low and high bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreCurve {
    Linear,
    /// Equal score gain per doubling; diminishing returns for large multiples.
    Logarithmic,
}

/// Weighted linear peak-quality model (0-100).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakScoringConfig {
    pub volume_weight: f64,
    pub candle_weight: f64,
    pub volume_low: f64,
    pub volume_high: f64,
    pub volume_curve: ScoreCurve,
    /// Bounds on |candle_change_pct|.
    pub candle_low: f64,
    pub candle_high: f64,
}

impl Default for PeakScoringConfig {
    fn default() -> Self {
        Self {
            volume_weight: 0.60,
            candle_weight: 0.40,
            volume_low: 1.0,
            volume_high: 10.0,
            volume_curve: ScoreCurve::Logarithmic,
            candle_low: 0.03,
            candle_high: 0.20,
        }
    }
}

impl PeakScoringConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let weights_ok = self.volume_weight >= 0.0
            && self.candle_weight >= 0.0
            && ((self.volume_weight + self.candle_weight) - 1.0).abs() < 1e-9;
        if !weights_ok {
            return Err(ConfigError::InvalidWeights {
                volume: self.volume_weight,
                candle: self.candle_weight,
            });
        }
        if !(self.volume_low < self.volume_high) {
            return Err(ConfigError::InvertedBounds {
                field: "volume",
                low: self.volume_low,
                high: self.volume_high,
            });
        }
        if self.volume_curve == ScoreCurve::Logarithmic {
            require_positive_f64("volume_low", self.volume_low)?;
        }
        if !(self.candle_low < self.candle_high) {
            return Err(ConfigError::InvertedBounds {
                field: "candle",
                low: self.candle_low,
                high: self.candle_high,
            });
        }
        if !(self.candle_low >= 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "candle_low",
                value: self.candle_low,
                range: "[0, inf)",
            });
        }
        Ok(())
    }
}

// ── Breakout scoring ─────────────────────────────────────────────────

/// Step-function bonus: the multiplier of the highest threshold reached.
///
/// An empty ladder never triggers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BonusLadder {
    pub thresholds: Vec<f64>,
    pub multipliers: Vec<f64>,
}

impl BonusLadder {
    pub fn new(thresholds: Vec<f64>, multipliers: Vec<f64>) -> Self {
        Self { thresholds, multipliers }
    }

    /// Returns `(multiplier, level)`; level 0 means no threshold was reached.
    pub fn evaluate(&self, value: f64) -> (f64, usize) {
        let level = self.thresholds.iter().take_while(|&&t| value >= t).count();
        match level {
            0 => (1.0, 0),
            n => (self.multipliers[n - 1], n),
        }
    }

    pub fn validate(&self, ladder: &'static str) -> Result<(), ConfigError> {
        if self.thresholds.len() != self.multipliers.len() {
            return Err(ConfigError::LadderLengthMismatch {
                ladder,
                thresholds: self.thresholds.len(),
                multipliers: self.multipliers.len(),
            });
        }
        let ascending = self.thresholds.iter().all(|t| t.is_finite())
            && self.thresholds.windows(2).all(|w| w[0] < w[1]);
        if !ascending {
            return Err(ConfigError::LadderThresholdsNotAscending { ladder });
        }
        let multipliers_ok = self.multipliers.iter().all(|m| m.is_finite() && *m > 1.0)
            && self.multipliers.windows(2).all(|w| w[0] < w[1]);
        if !multipliers_ok {
            return Err(ConfigError::LadderMultipliersInvalid { ladder });
        }
        Ok(())
    }
}

/// Multiplicative "base x bonus" breakout-quality model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakoutScoringConfig {
    pub base_score: f64,
    /// Adjacent broken peaks within this price ratio form one resistance cluster.
    pub cluster_density_threshold: f64,
    /// Oldest broken peak age, in bars.
    pub age: BonusLadder,
    /// Largest resistance cluster size.
    pub tests: BonusLadder,
    /// Maximum relative height among broken peaks.
    pub height: BonusLadder,
    /// Maximum volume surge among broken peaks.
    pub peak_volume: BonusLadder,
    pub volume: BonusLadder,
    pub gap: BonusLadder,
    pub continuity: BonusLadder,
    pub momentum: BonusLadder,
    /// Volatility-normalized daily return. Disabled unless configured.
    pub atr_return: Option<BonusLadder>,
}

impl Default for BreakoutScoringConfig {
    fn default() -> Self {
        Self {
            base_score: 50.0,
            cluster_density_threshold: 0.03,
            age: BonusLadder::new(vec![21.0, 63.0, 252.0], vec![1.15, 1.30, 1.50]),
            tests: BonusLadder::new(vec![2.0, 3.0, 4.0], vec![1.10, 1.25, 1.40]),
            height: BonusLadder::new(vec![0.10, 0.20], vec![1.15, 1.30]),
            peak_volume: BonusLadder::new(vec![5.0, 10.0], vec![1.10, 1.20]),
            volume: BonusLadder::new(vec![1.5, 2.0], vec![1.15, 1.30]),
            gap: BonusLadder::new(vec![0.01, 0.02], vec![1.10, 1.20]),
            continuity: BonusLadder::new(vec![3.0], vec![1.15]),
            momentum: BonusLadder::new(vec![2.0], vec![1.20]),
            atr_return: None,
        }
    }
}

impl BreakoutScoringConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive_f64("base_score", self.base_score)?;
        if !(self.cluster_density_threshold >= 0.0) || !self.cluster_density_threshold.is_finite() {
            return Err(ConfigError::OutOfRange {
                field: "cluster_density_threshold",
                value: self.cluster_density_threshold,
                range: "[0, inf)",
            });
        }
        self.age.validate("age")?;
        self.tests.validate("tests")?;
        self.height.validate("height")?;
        self.peak_volume.validate("peak_volume")?;
        self.volume.validate("volume")?;
        self.gap.validate("gap")?;
        self.continuity.validate("continuity")?;
        self.momentum.validate("momentum")?;
        if let Some(ladder) = &self.atr_return {
            ladder.validate("atr_return")?;
        }
        Ok(())
    }
}

// ── Bundle ───────────────────────────────────────────────────────────

/// Complete, validated parameter bundle for one screening run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenerConfig {
    pub detector: DetectorConfig,
    pub features: FeatureConfig,
    pub peak_scoring: PeakScoringConfig,
    pub breakout_scoring: BreakoutScoringConfig,
}

impl ScreenerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.detector.validate()?;
        self.features.validate()?;
        self.peak_scoring.validate()?;
        self.breakout_scoring.validate()?;
        Ok(())
    }

    /// Parse and validate a configuration from TOML.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ScreenerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}
