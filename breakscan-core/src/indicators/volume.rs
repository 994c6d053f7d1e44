//! Volume surge: a bar's volume over its trailing average.

use crate::domain::Bar;

/// `bars[index].volume` over the mean volume of up to `lookback` preceding bars.
///
/// 1.0 when there is no preceding bar, the average is zero, or `index` is out of range.
pub fn volume_surge_ratio(bars: &[Bar], index: usize, lookback: usize) -> f64 {
    let Some(bar) = bars.get(index) else {
        return 1.0;
    };
    let window = &bars[index.saturating_sub(lookback)..index];
    if window.is_empty() {
        return 1.0;
    }
    let avg = window.iter().map(|b| b.volume as f64).sum::<f64>() / window.len() as f64;
    if avg > 0.0 {
        bar.volume as f64 / avg
    } else {
        1.0
    }
}
