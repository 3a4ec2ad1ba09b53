//! Bollinger Bands.
//!
//! - Middle: SMA over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! StdDev is the population standard deviation (divides by N) over the same
//! window. Defaults: period=20, multiplier=2.0.

use crate::domain::indicator::{IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::indicator_helpers::{rolling_mean, rolling_population_stddev};
use crate::domain::ohlcv::PriceSeries;

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_NUM_STD: f64 = 2.0;

pub fn calculate_bollinger(series: &PriceSeries, period: usize, num_std: f64) -> IndicatorSeries {
    let closes = series.close_values();
    let middle = rolling_mean(&closes, period);
    let stddev = rolling_population_stddev(&closes, period);

    let values = middle
        .into_iter()
        .zip(stddev)
        .map(|(m, sd)| {
            let (middle, sd) = (m?, sd?);
            Some(IndicatorValue::Bollinger {
                upper: middle + num_std * sd,
                middle,
                lower: middle - num_std * sd,
            })
        })
        .collect();

    IndicatorSeries::from_values(
        IndicatorType::Bollinger {
            period,
            stddev_mult_x100: (num_std * 100.0).round() as u32,
        },
        series,
        values,
    )
}
