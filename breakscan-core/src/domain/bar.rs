//! Bar: the fundamental market data unit fed into the detector.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// OHLCV bar for a single instrument on a single day.
///
/// `index` is the bar's position in the instrument's history. The detector
/// requires indices to be contiguous and dates to be strictly increasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub index: usize,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    pub fn new(
        index: usize,
        date: NaiveDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Self {
        Self { index, date, open, high, low, close, volume }
    }

    /// Returns true if any OHLC field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: finite positive prices, high >= low, high >= open, high >= close.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        if ![self.open, self.high, self.low, self.close].iter().all(|p| p.is_finite()) {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.low > 0.0
    }

    /// Upper edge of the candle body.
    pub fn body_top(&self) -> f64 {
        self.open.max(self.close)
    }

    /// Close relative to open, as a fraction. Zero when open is not positive.
    pub fn change_pct(&self) -> f64 {
        if self.open > 0.0 {
            (self.close - self.open) / self.open
        } else {
            0.0
        }
    }
}
