//! Feature enrichment for detected breakouts.
//!
//! Features are computed from the bar history only; the enricher never
//! touches detector state. In live mode the history ends at the breakout bar,
//! so forward-looking features (stability, labels) fall back to neutral values.

use std::collections::BTreeMap;

use crate::config::{ConfigError, FeatureConfig, LabelWindow};
use crate::domain::{Bar, Breakout, BreakoutFeatures};
use crate::indicators::{volume_surge_ratio, Atr};

/// Stability when no forward bar exists yet.
pub const NEUTRAL_STABILITY: f64 = 50.0;

#[derive(Debug, Clone)]
pub struct FeatureEnricher {
    config: FeatureConfig,
    atr: Atr,
}

impl FeatureEnricher {
    pub fn new(config: FeatureConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let atr = Atr::new(config.atr_period);
        Ok(Self { config, atr })
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Attach features to `breakout`. `bars` is the instrument history indexed
    /// by sequence index; it may extend past the breakout bar.
    pub fn enrich(&self, mut breakout: Breakout, bars: &[Bar]) -> Breakout {
        breakout.features = Some(self.compute(&breakout, bars));
        breakout
    }

    pub fn compute(&self, breakout: &Breakout, bars: &[Bar]) -> BreakoutFeatures {
        let index = breakout.index;
        let Some(bar) = bars.get(index) else {
            return BreakoutFeatures {
                volume_surge_ratio: 1.0,
                stability_score: NEUTRAL_STABILITY,
                recent_breakout_count: breakout.recent_breakout_count,
                ..Default::default()
            };
        };
        let resistance = breakout
            .highest_peak_broken()
            .map(|p| p.price)
            .unwrap_or(breakout.price);

        let atr_value = self.atr.value_before(bars, index).filter(|v| *v > 0.0);
        let daily_return_atr_ratio = match (atr_value, index.checked_sub(1)) {
            (Some(atr), Some(prev)) => Some((bar.close - bars[prev].close) / atr),
            _ => None,
        };
        let breakout_atr_multiple = atr_value.map(|atr| (breakout.price - resistance) / atr);

        BreakoutFeatures {
            price_change_pct: bar.change_pct(),
            gap_up_pct: gap_up_pct(bars, index),
            volume_surge_ratio: volume_surge_ratio(bars, index, self.config.volume_lookback),
            continuity_days: continuity_days(bars, index, self.config.continuity_lookback),
            stability_score: stability_score(bars, index, resistance, self.config.stability_lookforward),
            recent_breakout_count: breakout.recent_breakout_count,
            atr_value,
            daily_return_atr_ratio,
            breakout_atr_multiple,
            labels: self
                .config
                .label_windows
                .iter()
                .map(|w| (w.key(), forward_label(bars, index, w)))
                .collect::<BTreeMap<_, _>>(),
        }
    }
}

/// Open over the previous close, when positive.
pub fn gap_up_pct(bars: &[Bar], index: usize) -> f64 {
    let (Some(bar), Some(prev)) = (bars.get(index), index.checked_sub(1).and_then(|p| bars.get(p))) else {
        return 0.0;
    };
    if prev.close > 0.0 && bar.open > prev.close {
        (bar.open - prev.close) / prev.close
    } else {
        0.0
    }
}

/// Consecutive up bars immediately before `index`, at most `lookback`.
///
/// A bar is up when it closes above its open or above the previous close.
/// The breakout bar itself is excluded: a bearish candle can still break out
/// on its upper shadow.
pub fn continuity_days(bars: &[Bar], index: usize, lookback: usize) -> usize {
    let end = index.min(bars.len());
    let start = end.saturating_sub(lookback);
    let mut days = 0;
    for i in (start..end).rev() {
        let bar = &bars[i];
        let up = bar.close > bar.open || (i > 0 && bar.close > bars[i - 1].close);
        if !up {
            break;
        }
        days += 1;
    }
    days
}

/// Percentage (0-100) of the next `lookforward` bars whose low holds at or
/// above `resistance`. Neutral when no forward bar exists.
pub fn stability_score(bars: &[Bar], index: usize, resistance: f64, lookforward: usize) -> f64 {
    let start = (index + 1).min(bars.len());
    let end = (index + 1 + lookforward).min(bars.len());
    let forward = &bars[start..end];
    if forward.is_empty() {
        return NEUTRAL_STABILITY;
    }
    let stable = forward.iter().filter(|b| b.low >= resistance).count();
    stable as f64 / forward.len() as f64 * 100.0
}

/// Rebound from the lowest close within `min_days` after the breakout to the
/// highest high after that low, up to `max_days` after the breakout.
pub fn forward_label(bars: &[Bar], index: usize, window: &LabelWindow) -> Option<f64> {
    if index + window.max_days >= bars.len() {
        return None;
    }
    let low_range = &bars[index + 1..=index + window.min_days];
    let (low_pos, low_close) = low_range
        .iter()
        .enumerate()
        .map(|(i, b)| (index + 1 + i, b.close))
        .min_by(|a, b| a.1.total_cmp(&b.1))?;
    let high = bars[low_pos + 1..=index + window.max_days]
        .iter()
        .map(|b| b.high)
        .max_by(f64::total_cmp)?;
    if low_close > 0.0 {
        Some((high - low_close) / low_close)
    } else {
        None
    }
}
