//! Data-quality scan over a price series.
//!
//! Problems found here never abort a run. They are returned as
//! [`DataQualityIssue`] records and logged at `warn`.
//!
//! [`scan`] checks each bar's structure. [`detect_anomalies`] flags
//! statistical outliers: rolling z-scores of the bar return, the close, the
//! five-bar momentum and the volume.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::domain::error::SignalbenchError;
use crate::domain::indicator::{calculate_sma, calculate_stddev};
use crate::domain::indicator_helpers::{rolling_mean, rolling_population_stddev};
use crate::domain::ohlcv::{PriceBar, PriceSeries, Timeframe};

/// A spacing above `interval × GAP_TOLERANCE` counts as a gap.
const GAP_TOLERANCE: f64 = 1.5;

const MOMENTUM_SPAN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyMetric {
    Return,
    Price,
    Momentum,
    Volume,
}

/// Rolling z-score outlier detection over a trailing window that includes
/// the current bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyConfig {
    pub window: usize,
    /// Absolute z-score above which a value is flagged.
    pub threshold: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        AnomalyConfig {
            window: 20,
            threshold: 3.0,
        }
    }
}

impl AnomalyConfig {
    pub fn validate(&self) -> Result<(), SignalbenchError> {
        if self.window < 3 {
            return Err(SignalbenchError::invalid("anomaly", "window", "must be at least 3"));
        }
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(SignalbenchError::invalid(
                "anomaly",
                "threshold",
                format!("must be positive, got {}", self.threshold),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataQualityKind {
    MissingClose,
    NonPositiveClose,
    /// high < low, or open/close outside [low, high].
    InconsistentBar,
    NegativeVolume,
    TimestampGap { expected_secs: i64, actual_secs: i64 },
    /// An order could not fill on this bar and was carried forward.
    DeferredExecution,
    /// Equity reached zero and the open position was closed.
    Liquidation,
    Anomaly { metric: AnomalyMetric, zscore: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataQualityIssue {
    pub index: usize,
    pub timestamp: NaiveDateTime,
    #[serde(flatten)]
    pub kind: DataQualityKind,
}

fn is_inconsistent(bar: &PriceBar) -> bool {
    let (Some(high), Some(low)) = (bar.high, bar.low) else {
        return false;
    };
    if high < low {
        return true;
    }
    let outside = |v: f64| v.is_finite() && (v > high || v < low);
    outside(bar.close) || bar.open.is_some_and(outside)
}

fn log_issues(series: &PriceSeries, issues: &[DataQualityIssue]) {
    for issue in issues {
        tracing::warn!(
            symbol = series.symbol(),
            index = issue.index,
            timestamp = %issue.timestamp,
            kind = ?issue.kind,
            "data quality issue"
        );
    }
}

pub fn scan(series: &PriceSeries, timeframe: Timeframe) -> Vec<DataQualityIssue> {
    let mut issues = Vec::new();
    let expected = timeframe.interval().num_seconds();
    let bars = series.bars();

    for (index, bar) in bars.iter().enumerate() {
        let mut push = |kind| {
            issues.push(DataQualityIssue {
                index,
                timestamp: bar.timestamp,
                kind,
            })
        };

        if index > 0 {
            let actual = (bar.timestamp - bars[index - 1].timestamp).num_seconds();
            if actual as f64 > expected as f64 * GAP_TOLERANCE {
                push(DataQualityKind::TimestampGap {
                    expected_secs: expected,
                    actual_secs: actual,
                });
            }
        }
        if !bar.close.is_finite() {
            push(DataQualityKind::MissingClose);
        } else if bar.close <= 0.0 {
            push(DataQualityKind::NonPositiveClose);
        }
        if is_inconsistent(bar) {
            push(DataQualityKind::InconsistentBar);
        }
        if bar.volume.is_some_and(|v| v < 0.0) {
            push(DataQualityKind::NegativeVolume);
        }
    }

    log_issues(series, &issues);
    issues
}

fn zscores(values: &[Option<f64>], means: &[Option<f64>], stddevs: &[Option<f64>]) -> Vec<Option<f64>> {
    values
        .iter()
        .zip(means)
        .zip(stddevs)
        .map(|((value, mean), sd)| {
            let (value, mean, sd) = ((*value)?, (*mean)?, (*sd)?);
            (sd > 1e-12).then(|| (value - mean) / sd)
        })
        .collect()
}

fn rolling_zscores(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    zscores(
        values,
        &rolling_mean(values, window),
        &rolling_population_stddev(values, window),
    )
}

/// Change from `span` bars back, aligned to the later bar.
fn pct_change(closes: &[Option<f64>], span: usize) -> Vec<Option<f64>> {
    (0..closes.len())
        .map(|i| {
            let prev = closes[i.checked_sub(span)?]?;
            let curr = closes[i]?;
            Some(curr / prev - 1.0)
        })
        .collect()
}

/// Flags bars whose return, close, momentum or volume lies more than
/// `config.threshold` rolling standard deviations from its rolling mean.
/// Windows with a gap or zero spread are skipped.
pub fn detect_anomalies(series: &PriceSeries, config: &AnomalyConfig) -> Vec<DataQualityIssue> {
    let closes = series.close_values();
    let price = zscores(
        &closes,
        &calculate_sma(series, config.window).simple_values(),
        &calculate_stddev(series, config.window).simple_values(),
    );
    let volumes: Vec<Option<f64>> = series
        .bars()
        .iter()
        .map(|b| b.volume.filter(|v| v.is_finite() && *v >= 0.0))
        .collect();

    let metrics = [
        (AnomalyMetric::Return, rolling_zscores(&pct_change(&closes, 1), config.window)),
        (AnomalyMetric::Price, price),
        (
            AnomalyMetric::Momentum,
            rolling_zscores(&pct_change(&closes, MOMENTUM_SPAN), config.window),
        ),
        (AnomalyMetric::Volume, rolling_zscores(&volumes, config.window)),
    ];

    let bars = series.bars();
    let mut issues: Vec<DataQualityIssue> = metrics
        .iter()
        .flat_map(|(metric, scores)| {
            scores.iter().enumerate().filter_map(move |(index, z)| {
                z.filter(|z| z.abs() > config.threshold).map(|zscore| DataQualityIssue {
                    index,
                    timestamp: bars[index].timestamp,
                    kind: DataQualityKind::Anomaly {
                        metric: *metric,
                        zscore,
                    },
                })
            })
        })
        .collect();
    issues.sort_by_key(|issue| issue.index);

    log_issues(series, &issues);
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn daily(closes: &[f64]) -> PriceSeries {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar::from_close(start() + Duration::days(i as i64), c))
            .collect();
        PriceSeries::new("BTCUSDT", bars).unwrap()
    }

    #[test]
    fn clean_series_has_no_issues() {
        assert!(scan(&daily(&[1.0, 2.0, 3.0]), Timeframe::Day1).is_empty());
    }

    #[test]
    fn detects_missing_and_non_positive_close() {
        let issues = scan(&daily(&[1.0, f64::NAN, 0.0, -2.0]), Timeframe::Day1);
        let kinds: Vec<_> = issues.iter().map(|i| i.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                DataQualityKind::MissingClose,
                DataQualityKind::NonPositiveClose,
                DataQualityKind::NonPositiveClose
            ]
        );
        assert_eq!(issues[0].index, 1);
    }

    #[test]
    fn detects_gap() {
        let bars = vec![
            PriceBar::from_close(start(), 1.0),
            PriceBar::from_close(start() + Duration::days(1), 1.0),
            PriceBar::from_close(start() + Duration::days(4), 1.0),
        ];
        let series = PriceSeries::new("BTCUSDT", bars).unwrap();
        let issues = scan(&series, Timeframe::Day1);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].index, 2);
        assert_eq!(
            issues[0].kind,
            DataQualityKind::TimestampGap {
                expected_secs: 86_400,
                actual_secs: 3 * 86_400
            }
        );
    }

    #[test]
    fn weekly_spacing_is_not_a_gap_on_weekly_timeframe() {
        let bars = (0..3)
            .map(|i| PriceBar::from_close(start() + Duration::weeks(i), 1.0))
            .collect();
        let series = PriceSeries::new("BTCUSDT", bars).unwrap();
        assert!(scan(&series, Timeframe::Week1).is_empty());
        assert_eq!(scan(&series, Timeframe::Day1).len(), 2);
    }

    #[test]
    fn detects_inconsistent_bar() {
        let bar = PriceBar {
            timestamp: start(),
            open: Some(10.0),
            high: Some(9.0),
            low: Some(11.0),
            close: 10.0,
            volume: Some(-5.0),
        };
        let series = PriceSeries::new("X", vec![bar]).unwrap();
        let kinds: Vec<_> = scan(&series, Timeframe::Day1)
            .into_iter()
            .map(|i| i.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![DataQualityKind::InconsistentBar, DataQualityKind::NegativeVolume]
        );
    }

    #[test]
    fn close_above_high_is_inconsistent() {
        let bar = PriceBar {
            timestamp: start(),
            open: None,
            high: Some(10.0),
            low: Some(9.0),
            close: 12.0,
            volume: None,
        };
        assert!(is_inconsistent(&bar));
    }

    fn spike_series(spike_at: usize) -> PriceSeries {
        let closes: Vec<f64> = (0..40)
            .map(|i| if i == spike_at { 150.0 } else { 100.0 })
            .collect();
        daily(&closes)
    }

    fn anomaly_metrics(issues: &[DataQualityIssue]) -> Vec<(usize, AnomalyMetric)> {
        issues
            .iter()
            .filter_map(|issue| match issue.kind {
                DataQualityKind::Anomaly { metric, .. } => Some((issue.index, metric)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn price_spike_is_flagged_once_per_metric() {
        let issues = detect_anomalies(&spike_series(30), &AnomalyConfig::default());
        let mut found = anomaly_metrics(&issues);
        found.sort();
        assert_eq!(
            found,
            vec![
                (30, AnomalyMetric::Return),
                (30, AnomalyMetric::Price),
                (30, AnomalyMetric::Momentum)
            ]
        );
        for issue in &issues {
            if let DataQualityKind::Anomaly { zscore, .. } = issue.kind {
                // a lone outlier in a window of 20 scores sqrt(19)
                assert!((zscore - 19f64.sqrt()).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn spike_before_first_full_window_is_not_scored() {
        let issues = detect_anomalies(&spike_series(10), &AnomalyConfig::default());
        assert!(anomaly_metrics(&issues).iter().all(|(index, _)| *index != 10));
    }

    #[test]
    fn higher_threshold_suppresses_flags() {
        let config = AnomalyConfig {
            threshold: 5.0,
            ..AnomalyConfig::default()
        };
        assert!(detect_anomalies(&spike_series(30), &config).is_empty());
    }

    #[test]
    fn volume_spike_is_flagged() {
        let bars = (0..30)
            .map(|i| PriceBar {
                timestamp: start() + Duration::days(i),
                open: None,
                high: None,
                low: None,
                close: 100.0,
                volume: Some(if i == 25 { 10_000.0 } else { 1_000.0 }),
            })
            .collect();
        let series = PriceSeries::new("BTCUSDT", bars).unwrap();
        let issues = detect_anomalies(&series, &AnomalyConfig::default());
        assert_eq!(anomaly_metrics(&issues), vec![(25, AnomalyMetric::Volume)]);
    }

    #[test]
    fn anomaly_config_validation() {
        assert!(AnomalyConfig::default().validate().is_ok());
        let bad = AnomalyConfig {
            threshold: 0.0,
            ..AnomalyConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
