//! Peak: a confirmed local high acting as resistance.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ids::PeakId;

/// Lifecycle of a confirmed peak.
///
/// Candidates that have not yet passed confirmation are `PeakCandidate`s and
/// never carry a status. There is no time-based expiry: a peak only leaves the
/// active set through supersession.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeakStatus {
    /// Confirmed and in the registry, never broken.
    Active,
    /// Broken by a margin within the supersession threshold; still active.
    Tested,
    /// Removed from the registry by a materially higher price.
    Superseded,
}

impl PeakStatus {
    pub fn is_active(self) -> bool {
        matches!(self, PeakStatus::Active | PeakStatus::Tested)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    pub id: PeakId,
    /// Sequence index of the peak bar.
    pub index: usize,
    pub date: NaiveDate,
    /// The peak bar's high. Immutable after creation.
    pub price: f64,
    /// Height over the lower of the left/right window minimum lows, as a fraction.
    pub relative_height: f64,
    pub left_confirmation_bars: usize,
    /// Right-side run at confirmation; overwritten with the gap to the breaking bar when broken.
    pub right_confirmation_bars: usize,
    /// Index of the bar that completed confirmation.
    pub confirmed_at: usize,
    /// Peak bar volume over the trailing average volume.
    pub volume_surge_ratio: f64,
    /// Peak bar (close - open) / open.
    pub candle_change_pct: f64,
    /// Lazily computed peak quality (0-100).
    pub quality_score: Option<f64>,
    pub status: PeakStatus,
}

impl Peak {
    /// Fractional margin of `price` over this peak.
    pub fn margin(&self, price: f64) -> f64 {
        (price - self.price) / self.price
    }

    /// Bars between this peak and `index`.
    pub fn age_at(&self, index: usize) -> usize {
        index.saturating_sub(self.index)
    }
}

#[cfg(test)]
pub(crate) fn sample_peak(id: u64, index: usize, price: f64) -> Peak {
    Peak {
        id: PeakId(id),
        index,
        date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap() + chrono::Duration::days(index as i64),
        price,
        relative_height: 0.05,
        left_confirmation_bars: 5,
        right_confirmation_bars: 5,
        confirmed_at: index + 5,
        volume_surge_ratio: 1.0,
        candle_change_pct: 0.0,
        quality_score: None,
        status: PeakStatus::Active,
    }
}
