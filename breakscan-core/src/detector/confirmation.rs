//! Peak confirmation bookkeeping.
//!
//! A bar becomes a candidate once it has at least `min_side_bars` strictly
//! lower bars immediately to its left. It then collects strictly lower bars on
//! its right until a bar reaches its high, at which point it expires. It is
//! confirmed as soon as both side counts, their sum and its relative height
//! satisfy the detector configuration.

use serde::{Deserialize, Serialize};

use crate::config::DetectorConfig;
use crate::domain::Bar;

/// A candidate high awaiting confirmation. Never part of the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakCandidate {
    pub index: usize,
    pub high: f64,
    pub left_bars: usize,
    /// Minimum low over the counted left bars.
    pub left_min_low: f64,
    pub right_bars: usize,
    /// Minimum low over the counted right bars; `None` until one exists.
    pub right_min_low: Option<f64>,
}

impl PeakCandidate {
    /// Height over the lower of the two side minimums, as a fraction.
    pub fn relative_height(&self) -> f64 {
        let base = match self.right_min_low {
            Some(right) => self.left_min_low.min(right),
            None => self.left_min_low,
        };
        if base > 0.0 {
            (self.high - base) / base
        } else {
            0.0
        }
    }

    pub fn is_confirmed(&self, config: &DetectorConfig) -> bool {
        self.left_bars >= config.min_side_bars
            && self.right_bars >= config.min_side_bars
            && self.left_bars + self.right_bars >= config.total_window
            && self.relative_height() >= config.min_relative_height
    }
}

/// One step of the left-side monotonic stack.
///
/// Covers the bars after the previous entry up to and including `index`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Ceiling {
    index: usize,
    high: f64,
    span_min_low: f64,
}

/// Left counts, right runs and pending candidates for one instrument.
#[derive(Debug, Clone, Default)]
pub struct ConfirmationTracker {
    ceilings: Vec<Ceiling>,
    /// Ordered by index; highs strictly decreasing.
    pending: Vec<PeakCandidate>,
}

impl ConfirmationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a bar history and the candidates pending after its last bar.
    pub fn rebuild(bars: &[Bar], pending: Vec<PeakCandidate>) -> Self {
        let mut tracker = Self::new();
        for bar in bars {
            tracker.push_ceiling(bar);
        }
        tracker.pending = pending;
        tracker
    }

    pub fn pending(&self) -> &[PeakCandidate] {
        &self.pending
    }

    /// Advance by one bar and return the candidates confirmed by it, in index order.
    pub fn advance(&mut self, bar: &Bar, config: &DetectorConfig) -> Vec<PeakCandidate> {
        while self.pending.last().is_some_and(|c| c.high <= bar.high) {
            self.pending.pop();
        }
        for candidate in &mut self.pending {
            candidate.right_bars += 1;
            candidate.right_min_low = Some(match candidate.right_min_low {
                Some(low) => low.min(bar.low),
                None => bar.low,
            });
        }

        let (left_bars, left_min_low) = self.push_ceiling(bar);
        if left_bars >= config.min_side_bars {
            self.pending.push(PeakCandidate {
                index: bar.index,
                high: bar.high,
                left_bars,
                left_min_low,
                right_bars: 0,
                right_min_low: None,
            });
        }

        let (confirmed, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|c| c.is_confirmed(config));
        self.pending = waiting;
        confirmed
    }

    /// Returns the left count of `bar` and the minimum low over those bars.
    fn push_ceiling(&mut self, bar: &Bar) -> (usize, f64) {
        let mut left_min = f64::INFINITY;
        while let Some(top) = self.ceilings.last() {
            if top.high < bar.high {
                left_min = left_min.min(top.span_min_low);
                self.ceilings.pop();
            } else {
                break;
            }
        }
        let left_bars = match self.ceilings.last() {
            Some(top) => bar.index - top.index - 1,
            None => bar.index,
        };
        self.ceilings.push(Ceiling {
            index: bar.index,
            high: bar.high,
            span_min_low: left_min.min(bar.low),
        });
        (left_bars, left_min)
    }
}
