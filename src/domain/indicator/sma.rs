//! Simple Moving Average.
//!
//! SMA[i] = mean(C[i-n+1..=i]). The first (n-1) points are undefined, as is
//! any window touching an unusable close.

use crate::domain::indicator::{IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::indicator_helpers::rolling_mean;
use crate::domain::ohlcv::PriceSeries;

pub fn calculate_sma(series: &PriceSeries, period: usize) -> IndicatorSeries {
    let values = rolling_mean(&series.close_values(), period)
        .into_iter()
        .map(|v| v.map(IndicatorValue::Simple))
        .collect();
    IndicatorSeries::from_values(IndicatorType::Sma(period), series, values)
}
