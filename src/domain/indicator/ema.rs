//! Exponential Moving Average.
//!
//! k = 2/(n+1), seeded with the SMA of the first n defined closes, then
//! EMA[i] = C[i]*k + EMA[i-1]*(1-k).

use crate::domain::indicator::{IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::indicator_helpers::ema_values;
use crate::domain::ohlcv::PriceSeries;

pub fn calculate_ema(series: &PriceSeries, period: usize) -> IndicatorSeries {
    let values = ema_values(&series.close_values(), period)
        .into_iter()
        .map(|v| v.map(IndicatorValue::Simple))
        .collect();
    IndicatorSeries::from_values(IndicatorType::Ema(period), series, values)
}
