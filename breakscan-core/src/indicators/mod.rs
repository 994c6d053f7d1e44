//! Volatility and volume indicators used by peak creation and feature enrichment.
//!
//! Indicators are pure functions: bar history in, numeric series out. No
//! value at bar t may depend on bar t+1 or later, so the enricher can read
//! the previous bar's value without seeing the breakout bar itself.

pub mod atr;
pub mod volume;

pub use atr::Atr;
pub use volume::volume_surge_ratio;

use crate::domain::Bar;

/// A single-series indicator over a bar history.
///
/// The output has the same length as the input. The first `lookback()` values
/// are `f64::NAN` (warmup).
pub trait Indicator: Send + Sync {
    /// Number of bars needed before the indicator produces valid output.
    fn lookback(&self) -> usize;

    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Synthetic bars from close prices for testing.
///
/// open = prev_close (or close for first bar), high = max(open,close) + 1.0,
/// low = min(open,close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar::new(
                i,
                base_date + chrono::Duration::days(i as i64),
                open,
                open.max(close) + 1.0,
                open.min(close) - 1.0,
                close,
                1000,
            )
        })
        .collect()
}

#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
