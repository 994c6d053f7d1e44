//! Screening pipeline: detector, then enricher, then scorer, for one instrument.
//!
//! Two modes share the same components:
//! - live (`push_bar`): each breakout is enriched against the bars seen so far,
//!   so forward-looking features are neutral;
//! - historical (`scan`, `scan_history`): all bars are detected first and each
//!   breakout is enriched against the complete history.

use thiserror::Error;

use crate::config::{ConfigError, ScreenerConfig};
use crate::detector::{BreakoutDetector, DetectorError};
use crate::domain::{Bar, Breakout};
use crate::features::FeatureEnricher;
use crate::scoring::BreakoutScorer;
use crate::snapshot::{DetectorSnapshot, SnapshotError};

#[derive(Debug, Error)]
pub enum ScreenError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Detector(#[from] DetectorError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

#[derive(Debug, Clone)]
pub struct Screener {
    config: ScreenerConfig,
    detector: BreakoutDetector,
    enricher: FeatureEnricher,
    scorer: BreakoutScorer,
}

impl Screener {
    pub fn new(symbol: impl Into<String>, config: ScreenerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let detector = BreakoutDetector::with_peak_scorer(
            symbol,
            config.detector.clone(),
            config.peak_scoring.clone(),
        )?;
        Self::assemble(config, detector)
    }

    /// Resume from a snapshot taken under the same detector and peak-scoring parameters.
    pub fn from_snapshot(snapshot: DetectorSnapshot, config: ScreenerConfig) -> Result<Self, ScreenError> {
        config.validate()?;
        let detector =
            BreakoutDetector::restore_with_config(snapshot, &config.detector, &config.peak_scoring)?;
        Ok(Self::assemble(config, detector)?)
    }

    fn assemble(config: ScreenerConfig, detector: BreakoutDetector) -> Result<Self, ConfigError> {
        let enricher = FeatureEnricher::new(config.features.clone())?;
        let scorer = BreakoutScorer::new(config.breakout_scoring.clone())?;
        Ok(Self {
            config,
            detector,
            enricher,
            scorer,
        })
    }

    pub fn config(&self) -> &ScreenerConfig {
        &self.config
    }

    pub fn detector(&self) -> &BreakoutDetector {
        &self.detector
    }

    pub fn detector_mut(&mut self) -> &mut BreakoutDetector {
        &mut self.detector
    }

    pub fn snapshot(&self) -> DetectorSnapshot {
        self.detector.snapshot()
    }

    /// Live mode: detect, enrich against the bars seen so far, score.
    pub fn push_bar(&mut self, bar: Bar) -> Result<Option<Breakout>, DetectorError> {
        Ok(self.detector.add_bar(bar)?.map(|bo| self.finish(bo)))
    }

    /// Historical mode over bars appended to this screener's history.
    pub fn scan<I>(&mut self, bars: I) -> Result<Vec<Breakout>, DetectorError>
    where
        I: IntoIterator<Item = Bar>,
    {
        let raw = self.detector.add_bars(bars)?;
        Ok(raw.into_iter().map(|bo| self.finish(bo)).collect())
    }

    /// Re-enrich and re-score against the current history, e.g. once forward
    /// bars exist for breakouts first seen in live mode.
    pub fn refresh(&self, breakout: Breakout) -> Breakout {
        self.finish(breakout)
    }

    fn finish(&self, breakout: Breakout) -> Breakout {
        let enriched = self.enricher.enrich(breakout, self.detector.bars());
        self.scorer.apply(enriched)
    }
}

/// Scan a complete history with a fresh screener.
pub fn scan_history(
    symbol: &str,
    bars: &[Bar],
    config: &ScreenerConfig,
) -> Result<Vec<Breakout>, ScreenError> {
    let mut screener = Screener::new(symbol, config.clone())?;
    Ok(screener.scan(bars.iter().cloned())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::NEUTRAL_STABILITY;
    use chrono::NaiveDate;

    /// Rise to 100 at bar 10, pull back, recover to 101 at bar 20, then hold.
    fn bars() -> Vec<Bar> {
        let base = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let mut highs: Vec<f64> = (0..=10).map(|i| 90.0 + i as f64).collect();
        highs.extend([98.0, 96.0, 94.0, 92.0, 93.0, 94.0, 95.0, 96.0, 97.0, 101.0]);
        highs.extend([101.5, 102.0, 102.5]);
        highs
            .iter()
            .enumerate()
            .map(|(i, &h)| Bar::new(i, base + chrono::Duration::days(i as i64), h - 1.0, h, h - 2.0, h - 0.5, 1_000))
            .collect()
    }

    #[test]
    fn live_mode_uses_neutral_stability() {
        let mut screener = Screener::new("LIVE", ScreenerConfig::default()).unwrap();
        let mut found = Vec::new();
        for bar in bars() {
            if let Some(bo) = screener.push_bar(bar).unwrap() {
                found.push(bo);
            }
        }
        let first = &found[0];
        assert_eq!(first.index, 20);
        assert_eq!(first.features.as_ref().unwrap().stability_score, NEUTRAL_STABILITY);
        assert!(first.quality_score.unwrap() >= 50.0);
    }

    #[test]
    fn historical_mode_measures_stability() {
        let found = scan_history("HIST", &bars(), &ScreenerConfig::default()).unwrap();
        let first = &found[0];
        assert_eq!(first.index, 20);
        // lows of bars 21..=23 are 99.5, 100.0, 100.5 against a peak at 100
        let stability = first.features.as_ref().unwrap().stability_score;
        assert!((stability - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn refresh_fills_forward_features() {
        let all = bars();
        let mut screener = Screener::new("LIVE", ScreenerConfig::default()).unwrap();
        let mut first = None;
        for bar in all {
            if let Some(bo) = screener.push_bar(bar).unwrap() {
                first.get_or_insert(bo);
            }
        }
        let refreshed = screener.refresh(first.unwrap());
        assert_ne!(refreshed.features.unwrap().stability_score, NEUTRAL_STABILITY);
    }

    #[test]
    fn invalid_config_rejected() {
        let mut config = ScreenerConfig::default();
        config.breakout_scoring.base_score = 0.0;
        assert!(Screener::new("X", config).is_err());
    }
}
