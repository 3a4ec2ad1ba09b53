//! Donchian channel over the bars preceding the current one.
//!
//! Upper = highest high, Lower = lowest low of bars [i-n, i-1]. The current
//! bar is excluded so its close can break out of the channel.

use crate::domain::indicator::{IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::PriceSeries;

pub fn calculate_donchian(series: &PriceSeries, lookback: usize) -> IndicatorSeries {
    let bars = series.bars();
    let values = (0..bars.len())
        .map(|i| {
            if lookback == 0 || i < lookback {
                return None;
            }
            let window = &bars[i - lookback..i];
            if window.iter().any(|b| !b.has_valid_close()) {
                return None;
            }
            let upper = window
                .iter()
                .map(|b| b.high_or_close())
                .fold(f64::NEG_INFINITY, f64::max);
            let lower = window
                .iter()
                .map(|b| b.low_or_close())
                .fold(f64::INFINITY, f64::min);
            Some(IndicatorValue::Channel { upper, lower })
        })
        .collect();

    IndicatorSeries::from_values(IndicatorType::Donchian(lookback), series, values)
}
