//! MACD (Moving Average Convergence Divergence).
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line, seeded by the SMA of its first
//! `signal` defined values
//! Histogram = MACD Line - Signal Line
//!
//! A point is defined once the signal line is.

use crate::domain::indicator::{IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::indicator_helpers::ema_values;
use crate::domain::ohlcv::PriceSeries;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

/// The raw MACD line, `None` until both EMAs are defined.
pub fn macd_line(closes: &[Option<f64>], fast: usize, slow: usize) -> Vec<Option<f64>> {
    let ema_fast = ema_values(closes, fast);
    let ema_slow = ema_values(closes, slow);
    ema_fast
        .into_iter()
        .zip(ema_slow)
        .map(|(f, s)| Some(f? - s?))
        .collect()
}

pub fn calculate_macd(
    series: &PriceSeries,
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> IndicatorSeries {
    let line = macd_line(&series.close_values(), fast, slow);
    let signal = ema_values(&line, signal_period);

    let values = line
        .into_iter()
        .zip(signal)
        .map(|(l, s)| {
            let (line, signal) = (l?, s?);
            Some(IndicatorValue::Macd {
                line,
                signal,
                histogram: line - signal,
            })
        })
        .collect();

    IndicatorSeries::from_values(
        IndicatorType::Macd {
            fast,
            slow,
            signal: signal_period,
        },
        series,
        values,
    )
}
