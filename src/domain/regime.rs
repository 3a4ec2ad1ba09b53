//! Market regime classification and per-regime performance.
//!
//! The series is cut into consecutive, non-overlapping windows of
//! `RegimeConfig::window` bars. The last window may be shorter and is kept.

use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::domain::error::SignalbenchError;
use crate::domain::indicator_helpers::{close_returns, sample_stddev};
use crate::domain::metrics::PerformanceReport;
use crate::domain::ohlcv::{PriceSeries, Timeframe};
use crate::domain::position::{EquityPoint, Trade};

const SECTION: &str = "regime";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Regime {
    TrendingUp,
    TrendingDown,
    Ranging,
    Volatile,
}

impl Regime {
    pub const ALL: [Regime; 4] = [
        Regime::TrendingUp,
        Regime::TrendingDown,
        Regime::Ranging,
        Regime::Volatile,
    ];
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Regime::TrendingUp => "TRENDING_UP",
            Regime::TrendingDown => "TRENDING_DOWN",
            Regime::Ranging => "RANGING",
            Regime::Volatile => "VOLATILE",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegimeConfig {
    pub window: usize,
    /// Absolute net return beyond which a window is trending.
    pub trend_threshold: f64,
    /// Sample stddev of bar returns above which a window is volatile.
    pub volatility_threshold: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        RegimeConfig {
            window: 30,
            trend_threshold: 0.05,
            volatility_threshold: 0.04,
        }
    }
}

impl RegimeConfig {
    pub fn validate(&self) -> Result<(), SignalbenchError> {
        if self.window < 2 {
            return Err(SignalbenchError::invalid(SECTION, "window", "must be at least 2"));
        }
        if !self.trend_threshold.is_finite() || self.trend_threshold <= 0.0 {
            return Err(SignalbenchError::invalid(SECTION, "trend_threshold", "must be positive"));
        }
        if !self.volatility_threshold.is_finite() || self.volatility_threshold <= 0.0 {
            return Err(SignalbenchError::invalid(
                SECTION,
                "volatility_threshold",
                "must be positive",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketCondition {
    pub window_start: NaiveDateTime,
    pub window_end: NaiveDateTime,
    pub start_index: usize,
    /// Inclusive.
    pub end_index: usize,
    pub condition: Regime,
    pub net_return: Option<f64>,
    pub volatility: Option<f64>,
}

impl MarketCondition {
    pub fn contains_index(&self, index: usize) -> bool {
        (self.start_index..=self.end_index).contains(&index)
    }

    pub fn contains_time(&self, t: NaiveDateTime) -> bool {
        self.window_start <= t && t <= self.window_end
    }
}

fn label(net_return: Option<f64>, volatility: Option<f64>, config: &RegimeConfig) -> Regime {
    if volatility.is_some_and(|v| v > config.volatility_threshold) {
        return Regime::Volatile;
    }
    match net_return {
        Some(r) if r > config.trend_threshold => Regime::TrendingUp,
        Some(r) if r < -config.trend_threshold => Regime::TrendingDown,
        _ => Regime::Ranging,
    }
}

pub fn classify(series: &PriceSeries, config: &RegimeConfig) -> Vec<MarketCondition> {
    let bars = series.bars();
    let closes = series.close_values();
    if config.window == 0 {
        return Vec::new();
    }

    (0..bars.len())
        .step_by(config.window)
        .map(|start| {
            let end = (start + config.window).min(bars.len()) - 1;
            let window = &closes[start..=end];
            let valid: Vec<f64> = window.iter().flatten().copied().collect();

            let net_return = match (valid.first(), valid.last()) {
                (Some(first), Some(last)) if valid.len() >= 2 => Some(last / first - 1.0),
                _ => None,
            };
            let volatility = sample_stddev(&close_returns(window));

            MarketCondition {
                window_start: bars[start].timestamp,
                window_end: bars[end].timestamp,
                start_index: start,
                end_index: end,
                condition: label(net_return, volatility, config),
                net_return,
                volatility,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegimePerformance {
    pub condition: Regime,
    pub windows: usize,
    pub bars: usize,
    pub report: PerformanceReport,
}

/// Re-evaluates performance separately for each regime present.
///
/// The bar returns of `equity_curve` that fall inside a regime's windows are
/// compounded into a sub-curve; trades are assigned by entry time.
pub fn stratify(
    conditions: &[MarketCondition],
    equity_curve: &[EquityPoint],
    trades: &[Trade],
    timeframe: Timeframe,
    risk_free_rate: f64,
) -> Vec<RegimePerformance> {
    let Some(base) = equity_curve.first().map(|p| p.equity) else {
        return Vec::new();
    };

    Regime::ALL
        .iter()
        .filter_map(|&regime| {
            let windows: Vec<&MarketCondition> =
                conditions.iter().filter(|c| c.condition == regime).collect();
            if windows.is_empty() {
                return None;
            }

            let in_regime = |i: usize| windows.iter().any(|w| w.contains_index(i));
            let mut sub_curve: Vec<EquityPoint> = Vec::new();
            let mut equity = base;
            for i in 1..equity_curve.len() {
                let (prev, curr) = (equity_curve[i - 1], equity_curve[i]);
                if !in_regime(i) || prev.equity <= 0.0 {
                    continue;
                }
                if sub_curve.is_empty() {
                    sub_curve.push(EquityPoint {
                        timestamp: prev.timestamp,
                        equity,
                    });
                }
                equity *= curr.equity / prev.equity;
                sub_curve.push(EquityPoint {
                    timestamp: curr.timestamp,
                    equity,
                });
            }

            let regime_trades: Vec<Trade> = trades
                .iter()
                .filter(|t| windows.iter().any(|w| w.contains_time(t.entry_time)))
                .cloned()
                .collect();

            Some(RegimePerformance {
                condition: regime,
                windows: windows.len(),
                bars: windows.iter().map(|w| w.end_index - w.start_index + 1).sum(),
                report: PerformanceReport::compute(&sub_curve, &regime_trades, timeframe, risk_free_rate),
            })
        })
        .collect()
}
