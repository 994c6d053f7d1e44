//! Breakout events and the lightweight history records kept for momentum counting.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ids::PeakId;
use super::peak::Peak;
use crate::scoring::ScoreBreakdown;

/// Shape of the breakout bar's candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandleType {
    Bullish,
    Bearish,
    /// Close within `doji_threshold` of open; the break came from the upper shadow.
    Doji,
}

impl CandleType {
    pub fn classify(open: f64, close: f64, doji_threshold: f64) -> Self {
        if open <= 0.0 {
            return CandleType::Doji;
        }
        let change = ((close - open) / open).abs();
        if change < doji_threshold {
            CandleType::Doji
        } else if close > open {
            CandleType::Bullish
        } else {
            CandleType::Bearish
        }
    }
}

/// Derived signals attached by the feature enricher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BreakoutFeatures {
    pub price_change_pct: f64,
    pub gap_up_pct: f64,
    pub volume_surge_ratio: f64,
    pub continuity_days: usize,
    /// Percentage (0-100) of forward bars holding above the highest broken peak.
    pub stability_score: f64,
    pub recent_breakout_count: usize,
    /// ATR of the bar before the breakout.
    pub atr_value: Option<f64>,
    /// Day-over-day close change over the previous bar's ATR.
    pub daily_return_atr_ratio: Option<f64>,
    /// Breakout price over the highest broken peak, in previous-bar ATRs.
    pub breakout_atr_multiple: Option<f64>,
    /// Forward rebound labels keyed `label_{min_days}_{max_days}`; `None` when
    /// the history does not reach far enough. Historical mode only.
    #[serde(default)]
    pub labels: BTreeMap<String, Option<f64>>,
}

/// A bar exceeding one or more active peaks.
///
/// Never mutated after detection except to attach features and a score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breakout {
    pub symbol: String,
    pub index: usize,
    pub date: NaiveDate,
    /// Highest enabled breakout measure of the bar (its high by default).
    pub price: f64,
    pub candle_type: CandleType,
    /// Every peak exceeded on this bar, in registry (creation) order. Never empty.
    pub broken_peaks: Vec<Peak>,
    /// The subset of `broken_peaks` removed from the registry.
    pub superseded_peaks: Vec<Peak>,
    /// Breakouts (including this one) within the momentum window, stamped at detection.
    pub recent_breakout_count: usize,
    pub features: Option<BreakoutFeatures>,
    pub quality_score: Option<f64>,
    pub score: Option<ScoreBreakdown>,
}

impl Breakout {
    pub fn num_peaks_broken(&self) -> usize {
        self.broken_peaks.len()
    }

    pub fn broken_peak_ids(&self) -> Vec<PeakId> {
        self.broken_peaks.iter().map(|p| p.id).collect()
    }

    pub fn superseded_peak_ids(&self) -> Vec<PeakId> {
        self.superseded_peaks.iter().map(|p| p.id).collect()
    }

    pub fn highest_peak_broken(&self) -> Option<&Peak> {
        self.broken_peaks.iter().max_by(|a, b| a.price.total_cmp(&b.price))
    }

    pub fn lowest_peak_broken(&self) -> Option<&Peak> {
        self.broken_peaks.iter().min_by(|a, b| a.price.total_cmp(&b.price))
    }

    pub fn peak_price_range(&self) -> f64 {
        match (self.highest_peak_broken(), self.lowest_peak_broken()) {
            (Some(hi), Some(lo)) => hi.price - lo.price,
            _ => 0.0,
        }
    }

    pub fn avg_peak_price(&self) -> f64 {
        if self.broken_peaks.is_empty() {
            return 0.0;
        }
        self.broken_peaks.iter().map(|p| p.price).sum::<f64>() / self.broken_peaks.len() as f64
    }

    /// Oldest broken peak's distance from the breakout, in bars.
    pub fn oldest_peak_age(&self) -> usize {
        self.broken_peaks.iter().map(|p| p.age_at(self.index)).max().unwrap_or(0)
    }
}

/// Minimal record of a past breakout, kept for momentum counting only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakoutRecord {
    pub index: usize,
    pub date: NaiveDate,
    pub price: f64,
    pub num_peaks: usize,
}
