//! Rolling population standard deviation of closes.

use crate::domain::indicator::{IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::indicator_helpers::rolling_population_stddev;
use crate::domain::ohlcv::PriceSeries;

pub fn calculate_stddev(series: &PriceSeries, period: usize) -> IndicatorSeries {
    let values = rolling_population_stddev(&series.close_values(), period)
        .into_iter()
        .map(|v| v.map(IndicatorValue::Simple))
        .collect();
    IndicatorSeries::from_values(IndicatorType::Stddev(period), series, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::PriceBar;
    use chrono::NaiveDate;

    fn make_series(prices: &[f64]) -> PriceSeries {
        let bars = prices
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                PriceBar::from_close(
                    NaiveDate::from_ymd_opt(2024, 1, (i + 1) as u32)
                        .unwrap()
                        .and_hms_opt(0, 0, 0)
                        .unwrap(),
                    close,
                )
            })
            .collect();
        PriceSeries::new("TEST", bars).unwrap()
    }

    #[test]
    fn stddev_constant_is_zero() {
        let series = make_series(&[50.0, 50.0, 50.0, 50.0]);
        let values = calculate_stddev(&series, 3).simple_values();
        assert_eq!(values[0], None);
        assert_eq!(values[2], Some(0.0));
        assert_eq!(values[3], Some(0.0));
    }

    #[test]
    fn stddev_divides_by_n() {
        let series = make_series(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let values = calculate_stddev(&series, 8).simple_values();
        assert!((values[7].unwrap() - 2.0).abs() < 1e-10);
    }

    #[test]
    fn stddev_length_matches_input() {
        let series = make_series(&[1.0, 2.0, 3.0]);
        let sd = calculate_stddev(&series, 10);
        assert_eq!(sd.len(), 3);
        assert_eq!(sd.indicator_type, IndicatorType::Stddev(10));
    }
}
