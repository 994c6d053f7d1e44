//! Incremental peak/breakout detector.
//!
//! One detector per instrument. Each call to `add_bar` runs, in order:
//! 1. Ordering and sanity checks (a fault halts the detector)
//! 2. Breakout detection against the registry, with supersession/coexistence
//! 3. Confirmation bookkeeping for the new bar
//! 4. Insertion of newly confirmed peaks, displacing materially lower ones
//! 5. Breakout history update
//!
//! The detector is synchronous and owns all of its state; instances share
//! nothing and can run on separate threads.

pub mod confirmation;
pub mod history;
pub mod registry;

pub use confirmation::{ConfirmationTracker, PeakCandidate};
pub use history::BreakoutHistory;
pub use registry::PeakRegistry;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::config::{ConfigError, DetectorConfig, PeakScoringConfig};
use crate::domain::{Bar, Breakout, BreakoutRecord, CandleType, ConfigFingerprint, Peak, PeakId, PeakStatus};
use crate::indicators::volume_surge_ratio;
use crate::scoring::PeakScorer;
use crate::snapshot::{DetectorSnapshot, SnapshotError, SNAPSHOT_SCHEMA_VERSION};

/// Data faults. Fatal for the instrument's stream.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("{symbol}: bar index {got} out of order (expected {expected})")]
    DataOrderViolation {
        symbol: String,
        expected: usize,
        got: usize,
    },

    #[error("{symbol}: bar date {date} is not after previous bar date {previous}")]
    NonIncreasingDate {
        symbol: String,
        date: NaiveDate,
        previous: NaiveDate,
    },

    #[error("{symbol}: malformed bar at index {index}")]
    MalformedBar { symbol: String, index: usize },

    #[error("{symbol}: detector halted by an earlier data fault")]
    Halted { symbol: String },
}

/// Read-only summary of a detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorStatus {
    pub symbol: String,
    pub total_bars: usize,
    pub active_peaks: usize,
    pub pending_candidates: usize,
    pub last_date: Option<NaiveDate>,
    pub halted: bool,
}

#[derive(Debug, Clone)]
pub struct BreakoutDetector {
    symbol: String,
    config: DetectorConfig,
    peak_scorer: PeakScorer,
    fingerprint: ConfigFingerprint,
    bars: Vec<Bar>,
    registry: PeakRegistry,
    tracker: ConfirmationTracker,
    history: BreakoutHistory,
    halted: bool,
}

impl BreakoutDetector {
    /// Detector with default peak scoring.
    pub fn new(symbol: impl Into<String>, config: DetectorConfig) -> Result<Self, ConfigError> {
        Self::with_peak_scorer(symbol, config, PeakScoringConfig::default())
    }

    pub fn with_peak_scorer(
        symbol: impl Into<String>,
        config: DetectorConfig,
        peak_scoring: PeakScoringConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let fingerprint = config.fingerprint(&peak_scoring)?;
        let peak_scorer = PeakScorer::new(peak_scoring)?;
        let history = BreakoutHistory::new(config.momentum_window);
        Ok(Self {
            symbol: symbol.into(),
            config,
            peak_scorer,
            fingerprint,
            bars: Vec::new(),
            registry: PeakRegistry::new(),
            tracker: ConfirmationTracker::new(),
            history,
            halted: false,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn peak_scoring(&self) -> &PeakScoringConfig {
        self.peak_scorer.config()
    }

    pub fn fingerprint(&self) -> &ConfigFingerprint {
        &self.fingerprint
    }

    /// Every bar accepted so far.
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    /// Index the next bar must carry.
    pub fn next_index(&self) -> usize {
        self.bars.len()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Snapshot of the registry, in creation order.
    pub fn active_peaks(&self) -> Vec<Peak> {
        self.registry.iter().cloned().collect()
    }

    pub fn pending_candidates(&self) -> &[PeakCandidate] {
        self.tracker.pending()
    }

    pub fn breakout_history(&self) -> &BreakoutHistory {
        &self.history
    }

    pub fn status(&self) -> DetectorStatus {
        DetectorStatus {
            symbol: self.symbol.clone(),
            total_bars: self.bars.len(),
            active_peaks: self.registry.len(),
            pending_candidates: self.tracker.pending().len(),
            last_date: self.last_date(),
            halted: self.halted,
        }
    }

    /// Quality of an active peak, computed on first request and then kept.
    pub fn peak_quality(&mut self, id: PeakId) -> Option<f64> {
        let peak = self.registry.get_mut(id)?;
        let score = match peak.quality_score {
            Some(score) => score,
            None => {
                let score = self.peak_scorer.score(peak);
                peak.quality_score = Some(score);
                score
            }
        };
        Some(score)
    }

    /// Feed one bar. Bars must arrive with contiguous indices and increasing dates.
    pub fn add_bar(&mut self, bar: Bar) -> Result<Option<Breakout>, DetectorError> {
        if self.halted {
            return Err(DetectorError::Halted {
                symbol: self.symbol.clone(),
            });
        }
        if let Err(e) = self.check_bar(&bar) {
            warn!("[{}] {}; halting detector", self.symbol, e);
            self.halted = true;
            return Err(e);
        }

        let index = bar.index;
        self.bars.push(bar);

        let breakout = self.detect_breakout(index);
        self.confirm_peaks(index);
        Ok(breakout)
    }

    /// Equivalent to calling `add_bar` for each bar; stops at the first fault.
    pub fn add_bars<I>(&mut self, bars: I) -> Result<Vec<Breakout>, DetectorError>
    where
        I: IntoIterator<Item = Bar>,
    {
        let mut breakouts = Vec::new();
        for bar in bars {
            if let Some(bo) = self.add_bar(bar)? {
                breakouts.push(bo);
            }
        }
        Ok(breakouts)
    }

    fn check_bar(&self, bar: &Bar) -> Result<(), DetectorError> {
        let expected = self.bars.len();
        if bar.index != expected {
            return Err(DetectorError::DataOrderViolation {
                symbol: self.symbol.clone(),
                expected,
                got: bar.index,
            });
        }
        if let Some(prev) = self.bars.last() {
            if bar.date <= prev.date {
                return Err(DetectorError::NonIncreasingDate {
                    symbol: self.symbol.clone(),
                    date: bar.date,
                    previous: prev.date,
                });
            }
        }
        if !bar.is_sane() {
            return Err(DetectorError::MalformedBar {
                symbol: self.symbol.clone(),
                index: bar.index,
            });
        }
        Ok(())
    }

    fn detect_breakout(&mut self, index: usize) -> Option<Breakout> {
        let bar = &self.bars[index];
        let price = self.config.breakout_price(bar);

        let mut broken = Vec::new();
        let mut superseded = Vec::new();
        for id in self.registry.ids() {
            let Some(peak) = self.registry.get(id) else {
                continue;
            };
            if price <= peak.price * (1.0 + self.config.exceed_threshold) {
                continue;
            }
            let margin = peak.margin(price);
            let quality = peak
                .quality_score
                .unwrap_or_else(|| self.peak_scorer.score(peak));

            if margin > self.config.peak_supersede_threshold {
                if let Some(mut peak) = self.registry.remove(id) {
                    peak.status = PeakStatus::Superseded;
                    peak.right_confirmation_bars = index.saturating_sub(peak.index + 1);
                    peak.quality_score = Some(quality);
                    debug!(
                        "[{}] Peak {} at {:.2} superseded on bar {} (margin {:.2}%)",
                        self.symbol,
                        peak.id,
                        peak.price,
                        index,
                        margin * 100.0
                    );
                    superseded.push(peak.clone());
                    broken.push(peak);
                }
            } else if let Some(peak) = self.registry.get_mut(id) {
                peak.status = PeakStatus::Tested;
                peak.right_confirmation_bars = index.saturating_sub(peak.index + 1);
                peak.quality_score = Some(quality);
                broken.push(peak.clone());
            }
        }

        if broken.is_empty() {
            return None;
        }

        let bar = &self.bars[index];
        self.history.record(BreakoutRecord {
            index,
            date: bar.date,
            price,
            num_peaks: broken.len(),
        });
        let recent = self.history.recent_count(index);
        debug!(
            "[{}] Breakout on bar {} ({}) at {:.2}: {} peak(s) broken, {} superseded",
            self.symbol,
            index,
            bar.date,
            price,
            broken.len(),
            superseded.len()
        );

        Some(Breakout {
            symbol: self.symbol.clone(),
            index,
            date: bar.date,
            price,
            candle_type: CandleType::classify(bar.open, bar.close, self.config.doji_threshold),
            broken_peaks: broken,
            superseded_peaks: superseded,
            recent_breakout_count: recent,
            features: None,
            quality_score: None,
            score: None,
        })
    }

    fn confirm_peaks(&mut self, index: usize) {
        let confirmed = self.tracker.advance(&self.bars[index], &self.config);
        for candidate in confirmed {
            self.insert_peak(candidate, index);
        }
    }

    fn insert_peak(&mut self, candidate: PeakCandidate, confirmed_at: usize) {
        for id in self
            .registry
            .displaced_by(candidate.high, self.config.peak_supersede_threshold)
        {
            if let Some(old) = self.registry.remove(id) {
                debug!(
                    "[{}] Peak {} at {:.2} displaced by new peak at {:.2}",
                    self.symbol, old.id, old.price, candidate.high
                );
            }
        }

        let bar = &self.bars[candidate.index];
        let peak = Peak {
            id: self.registry.allocate_id(),
            index: candidate.index,
            date: bar.date,
            price: candidate.high,
            relative_height: candidate.relative_height(),
            left_confirmation_bars: candidate.left_bars,
            right_confirmation_bars: candidate.right_bars,
            confirmed_at,
            volume_surge_ratio: volume_surge_ratio(
                &self.bars,
                candidate.index,
                self.config.peak_volume_lookback,
            ),
            candle_change_pct: bar.change_pct(),
            quality_score: None,
            status: PeakStatus::Active,
        };
        trace!(
            "[{}] Peak {} confirmed: bar {} high {:.2}, left {}, right {}, height {:.2}%",
            self.symbol,
            peak.id,
            peak.index,
            peak.price,
            peak.left_confirmation_bars,
            peak.right_confirmation_bars,
            peak.relative_height * 100.0
        );
        self.registry.insert(peak);
    }

    // ── Snapshot ─────────────────────────────────────────────────────

    /// Capture the full detector state.
    pub fn snapshot(&self) -> DetectorSnapshot {
        DetectorSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            symbol: self.symbol.clone(),
            config_fingerprint: self.fingerprint.clone(),
            config: self.config.clone(),
            peak_scoring: self.peak_scorer.config().clone(),
            bars: self.bars.clone(),
            peaks: self.active_peaks(),
            next_peak_id: self.registry.next_id(),
            pending: self.tracker.pending().to_vec(),
            history: self.history.records().cloned().collect(),
            halted: self.halted,
        }
    }

    /// Rebuild a detector that behaves exactly like the one that was captured.
    pub fn restore(snapshot: DetectorSnapshot) -> Result<Self, SnapshotError> {
        if snapshot.schema_version != SNAPSHOT_SCHEMA_VERSION {
            return Err(SnapshotError::IncompatibleVersion {
                found: u64::from(snapshot.schema_version),
                expected: SNAPSHOT_SCHEMA_VERSION,
            });
        }
        let mut detector = Self::with_peak_scorer(
            snapshot.symbol.clone(),
            snapshot.config.clone(),
            snapshot.peak_scoring.clone(),
        )
        .map_err(SnapshotError::InvalidConfig)?;

        if detector.fingerprint != snapshot.config_fingerprint {
            return Err(SnapshotError::Inconsistent(format!(
                "config fingerprint {} does not match stored config ({})",
                snapshot.config_fingerprint, detector.fingerprint
            )));
        }
        snapshot.check_consistency()?;

        detector.tracker = ConfirmationTracker::rebuild(&snapshot.bars, snapshot.pending);
        detector.registry = PeakRegistry::from_parts(snapshot.peaks, snapshot.next_peak_id);
        detector.history = BreakoutHistory::from_records(snapshot.config.momentum_window, snapshot.history);
        detector.bars = snapshot.bars;
        detector.halted = snapshot.halted;
        debug!(
            "[{}] Restored detector: {} bars, {} active peaks",
            detector.symbol,
            detector.bars.len(),
            detector.registry.len()
        );
        Ok(detector)
    }

    /// Restore, rejecting a snapshot taken under different parameters.
    pub fn restore_with_config(
        snapshot: DetectorSnapshot,
        config: &DetectorConfig,
        peak_scoring: &PeakScoringConfig,
    ) -> Result<Self, SnapshotError> {
        let expected = config.fingerprint(peak_scoring).map_err(SnapshotError::InvalidConfig)?;
        if expected != snapshot.config_fingerprint {
            return Err(SnapshotError::ConfigMismatch {
                expected: expected.to_string(),
                found: snapshot.config_fingerprint.to_string(),
            });
        }
        Self::restore(snapshot)
    }
}
