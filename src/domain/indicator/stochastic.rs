//! Stochastic Oscillator.
//!
//! %K = 100 × (C - LL) / (HH - LL) over k_period bars, clamped to [0, 100].
//! A zero range yields exactly 50. %D = SMA(d_period) of %K.
//! Bars without high/low use the close for both.

use crate::domain::indicator::{IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::indicator_helpers::rolling_mean;
use crate::domain::ohlcv::PriceSeries;

pub const DEFAULT_K_PERIOD: usize = 14;
pub const DEFAULT_D_PERIOD: usize = 3;
pub const DEFAULT_OVERSOLD: f64 = 20.0;
pub const DEFAULT_OVERBOUGHT: f64 = 80.0;

/// %K for every bar, `None` during warmup or when the window has an unusable close.
pub fn percent_k(series: &PriceSeries, k_period: usize) -> Vec<Option<f64>> {
    let bars = series.bars();
    (0..bars.len())
        .map(|i| {
            if k_period == 0 || i + 1 < k_period {
                return None;
            }
            let window = &bars[i + 1 - k_period..=i];
            if window.iter().any(|b| !b.has_valid_close()) {
                return None;
            }
            let highest = window
                .iter()
                .map(|b| b.high_or_close())
                .fold(f64::NEG_INFINITY, f64::max);
            let lowest = window
                .iter()
                .map(|b| b.low_or_close())
                .fold(f64::INFINITY, f64::min);
            let range = highest - lowest;
            if !range.is_finite() {
                return None;
            }
            if range <= 0.0 {
                return Some(50.0);
            }
            let k = 100.0 * (bars[i].close - lowest) / range;
            Some(k.clamp(0.0, 100.0))
        })
        .collect()
}

pub fn calculate_stochastic(
    series: &PriceSeries,
    k_period: usize,
    d_period: usize,
) -> IndicatorSeries {
    let k_values = percent_k(series, k_period);
    let d_values = rolling_mean(&k_values, d_period);

    let values = k_values
        .into_iter()
        .zip(d_values)
        .map(|(k, d)| k.map(|k| IndicatorValue::Stochastic { k, d }))
        .collect();

    IndicatorSeries::from_values(
        IndicatorType::Stochastic { k_period, d_period },
        series,
        values,
    )
}
