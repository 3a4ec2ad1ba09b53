//! Shared rolling-window helpers for indicator calculations.
//!
//! All helpers take `Option<f64>` inputs where `None` marks an unusable
//! value, and return a vector of the same length. A window containing any
//! `None` yields `None`.

use crate::domain::indicator::{IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::PriceSeries;

/// Complete trailing window ending at `i`, or `None` if it is short or has gaps.
fn full_window(values: &[Option<f64>], i: usize, window: usize) -> Option<Vec<f64>> {
    if window == 0 || i + 1 < window {
        return None;
    }
    values[i + 1 - window..=i].iter().copied().collect()
}

/// Arithmetic mean of each trailing window. Each window is summed directly.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            let w = full_window(values, i, window)?;
            Some(w.iter().sum::<f64>() / window as f64)
        })
        .collect()
}

/// Population standard deviation (divides by N) of each trailing window.
pub fn rolling_population_stddev(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            let w = full_window(values, i, window)?;
            let mean = w.iter().sum::<f64>() / window as f64;
            let variance = w.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / window as f64;
            Some(variance.sqrt())
        })
        .collect()
}

/// Exponential moving average, k = 2/(n+1).
///
/// Seeded with the mean of the first `period` defined inputs. After the seed,
/// a `None` input produces a `None` output and leaves the recursion state
/// untouched.
pub fn ema_values(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut seed_sum = 0.0;
    let mut seed_count = 0usize;
    let mut ema: Option<f64> = None;

    for (i, value) in values.iter().enumerate() {
        let Some(v) = value else { continue };
        match ema {
            None => {
                seed_sum += v;
                seed_count += 1;
                if seed_count == period {
                    let seed = seed_sum / period as f64;
                    ema = Some(seed);
                    out[i] = Some(seed);
                }
            }
            Some(prev) => {
                let next = v * k + prev * (1.0 - k);
                ema = Some(next);
                out[i] = Some(next);
            }
        }
    }

    out
}

/// Sample standard deviation (divides by N-1). `None` with fewer than two values.
pub fn sample_stddev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt())
}

/// Simple bar-to-bar returns between consecutive valid closes.
pub fn close_returns(closes: &[Option<f64>]) -> Vec<f64> {
    closes
        .windows(2)
        .filter_map(|w| match (w[0], w[1]) {
            (Some(prev), Some(curr)) => Some(curr / prev - 1.0),
            _ => None,
        })
        .collect()
}

/// Average True Range with Wilder smoothing.
///
/// Seed: mean of the first `period` true ranges (the first bar's true range
/// is its own high-low). Bars with an unusable close are undefined and do not
/// advance the smoothing.
pub fn calc_atr(series: &PriceSeries, period: usize) -> IndicatorSeries {
    let bars = series.bars();
    let mut tr_values: Vec<Option<f64>> = Vec::with_capacity(bars.len());
    let mut prev_close: Option<f64> = None;
    for bar in bars {
        if !bar.has_valid_close() {
            tr_values.push(None);
            continue;
        }
        let tr = match prev_close {
            Some(pc) => bar.true_range(pc),
            None => bar.high_or_close() - bar.low_or_close(),
        };
        tr_values.push(Some(tr));
        prev_close = Some(bar.close);
    }

    let mut atr_values = vec![None; bars.len()];
    if period > 0 {
        let mut seed_sum = 0.0;
        let mut seed_count = 0usize;
        let mut atr: Option<f64> = None;
        for (i, tr) in tr_values.iter().enumerate() {
            let Some(tr) = tr else { continue };
            match atr {
                None => {
                    seed_sum += tr;
                    seed_count += 1;
                    if seed_count == period {
                        atr = Some(seed_sum / period as f64);
                        atr_values[i] = atr;
                    }
                }
                Some(prev) => {
                    let next = (prev * (period - 1) as f64 + tr) / period as f64;
                    atr = Some(next);
                    atr_values[i] = atr;
                }
            }
        }
    }

    IndicatorSeries::from_values(
        IndicatorType::Atr(period),
        series,
        atr_values
            .into_iter()
            .map(|v| v.map(IndicatorValue::Simple))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::PriceBar;
    use chrono::NaiveDate;

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    fn make_series(rows: &[(f64, f64, f64)]) -> PriceSeries {
        let bars = rows
            .iter()
            .enumerate()
            .map(|(i, &(high, low, close))| PriceBar {
                timestamp: NaiveDate::from_ymd_opt(2024, 1, (i + 1) as u32)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
                open: Some(close),
                high: Some(high),
                low: Some(low),
                close,
                volume: Some(1000.0),
            })
            .collect();
        PriceSeries::new("TEST", bars).unwrap()
    }

    #[test]
    fn rolling_mean_warmup_and_values() {
        let out = rolling_mean(&some(&[1.0, 2.0, 3.0, 4.0]), 3);
        assert_eq!(out, vec![None, None, Some(2.0), Some(3.0)]);
    }

    #[test]
    fn rolling_mean_gap_poisons_window() {
        let values = vec![Some(1.0), None, Some(3.0), Some(4.0), Some(5.0)];
        let out = rolling_mean(&values, 2);
        assert_eq!(out, vec![None, None, None, Some(3.5), Some(4.5)]);
    }

    #[test]
    fn rolling_mean_zero_window_is_undefined() {
        let out = rolling_mean(&some(&[1.0, 2.0]), 0);
        assert_eq!(out, vec![None, None]);
    }

    #[test]
    fn population_stddev_known_values() {
        let out = rolling_population_stddev(&some(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 8);
        assert!((out[7].unwrap() - 2.0).abs() < 1e-10);
        assert!(out[6].is_none());
    }

    #[test]
    fn ema_seed_is_sma_then_recursive() {
        let out = ema_values(&some(&[10.0, 20.0, 30.0, 40.0]), 3);
        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        assert!((out[2].unwrap() - 20.0).abs() < f64::EPSILON);
        assert!((out[3].unwrap() - (40.0 * 0.5 + 20.0 * 0.5)).abs() < f64::EPSILON);
    }

    #[test]
    fn ema_skips_leading_undefined() {
        let values = vec![None, None, Some(10.0), Some(20.0), Some(30.0)];
        let out = ema_values(&values, 2);
        assert_eq!(out[2], None);
        assert!((out[3].unwrap() - 15.0).abs() < f64::EPSILON);
        assert!(out[4].is_some());
    }

    #[test]
    fn ema_hole_after_seed_keeps_state() {
        let values = vec![Some(10.0), Some(20.0), None, Some(30.0)];
        let out = ema_values(&values, 2);
        assert_eq!(out[2], None);
        let k = 2.0 / 3.0;
        assert!((out[3].unwrap() - (30.0 * k + 15.0 * (1.0 - k))).abs() < 1e-12);
    }

    #[test]
    fn sample_stddev_needs_two_values() {
        assert_eq!(sample_stddev(&[1.0]), None);
        assert!((sample_stddev(&[1.0, 3.0]).unwrap() - 2.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn close_returns_skip_gaps() {
        let closes = vec![Some(100.0), Some(110.0), None, Some(50.0), Some(55.0)];
        let returns = close_returns(&closes);
        assert_eq!(returns.len(), 2);
        assert!((returns[0] - 0.1).abs() < 1e-12);
        assert!((returns[1] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn atr_seed_is_average() {
        let series = make_series(&[(110.0, 100.0, 105.0), (115.0, 105.0, 110.0), (120.0, 110.0, 115.0)]);
        let atr = calc_atr(&series, 3);
        assert_eq!(atr.len(), 3);
        assert_eq!(atr.simple_values()[2], Some(10.0));
        assert!(atr.simple_values()[1].is_none());
    }

    #[test]
    fn atr_wilder_smoothing() {
        let series = make_series(&[
            (110.0, 100.0, 105.0),
            (115.0, 105.0, 110.0),
            (120.0, 110.0, 115.0),
            (125.0, 115.0, 120.0),
        ]);
        let atr = calc_atr(&series, 3).simple_values();
        let expected = (10.0 * 2.0 + 10.0) / 3.0;
        assert!((atr[3].unwrap() - expected).abs() < 1e-9);
    }
}
