//! Performance metrics over an equity curve and its closed trades.
//!
//! Ratios that cannot be computed are reported as [`MetricValue::Undefined`]
//! with a reason, never as `inf`, `NaN` or a sentinel number.

use std::fmt;

use serde::Serialize;

use super::indicator_helpers::sample_stddev;
use super::ohlcv::Timeframe;
use super::position::{EquityPoint, Trade};

/// Standard deviations below this are treated as zero.
const VARIANCE_FLOOR: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UndefinedReason {
    ZeroVariance,
    NoLosingTrades,
    ZeroDrawdown,
    InsufficientData,
    NonFinite,
}

impl fmt::Display for UndefinedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UndefinedReason::ZeroVariance => "zero variance",
            UndefinedReason::NoLosingTrades => "no losing trades",
            UndefinedReason::ZeroDrawdown => "zero drawdown",
            UndefinedReason::InsufficientData => "insufficient data",
            UndefinedReason::NonFinite => "non-finite result",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricValue {
    Defined(f64),
    Undefined(UndefinedReason),
    /// The metric has no meaning for this input (e.g. win rate with no trades).
    NotApplicable,
}

impl MetricValue {
    /// `Defined` if finite, `Undefined(NonFinite)` otherwise.
    pub fn finite(value: f64) -> Self {
        if value.is_finite() {
            MetricValue::Defined(value)
        } else {
            MetricValue::Undefined(UndefinedReason::NonFinite)
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            MetricValue::Defined(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, MetricValue::Defined(_))
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Defined(v) => write!(f, "{:.4}", v),
            MetricValue::Undefined(reason) => write!(f, "undefined ({})", reason),
            MetricValue::NotApplicable => f.write_str("n/a"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub total_return: f64,
    pub annualized_return: MetricValue,
    pub volatility: MetricValue,
    pub sharpe_ratio: MetricValue,
    pub sortino_ratio: MetricValue,
    pub max_drawdown: f64,
    pub max_drawdown_duration: usize,
    pub win_rate: MetricValue,
    pub profit_factor: MetricValue,
    pub recovery_factor: MetricValue,
    pub avg_trade_return: MetricValue,
    pub num_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
}

impl PerformanceReport {
    pub fn compute(
        equity_curve: &[EquityPoint],
        trades: &[Trade],
        timeframe: Timeframe,
        risk_free_rate: f64,
    ) -> Self {
        let ppy = timeframe.periods_per_year();
        let returns = period_returns(equity_curve);

        let total_return = match (equity_curve.first(), equity_curve.last()) {
            (Some(first), Some(last)) if equity_curve.len() > 1 && first.equity > 0.0 => {
                last.equity / first.equity - 1.0
            }
            _ => 0.0,
        };

        let annualized_return = if returns.is_empty() {
            MetricValue::Undefined(UndefinedReason::InsufficientData)
        } else {
            MetricValue::finite((1.0 + total_return).powf(ppy / returns.len() as f64) - 1.0)
        };

        let volatility = match sample_stddev(&returns) {
            Some(sd) => MetricValue::finite(sd * ppy.sqrt()),
            None => MetricValue::Undefined(UndefinedReason::InsufficientData),
        };

        let (sharpe_ratio, sortino_ratio) = compute_risk_adjusted(&returns, risk_free_rate / ppy, ppy);
        let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity_curve);

        let num_trades = trades.len();
        let winning_trades = trades.iter().filter(|t| t.is_winner()).count();
        let losing_trades = trades.iter().filter(|t| t.is_loser()).count();
        let gross_win: f64 = trades.iter().filter(|t| t.is_winner()).map(|t| t.return_pct).sum();
        let gross_loss: f64 = trades
            .iter()
            .filter(|t| t.is_loser())
            .map(|t| t.return_pct)
            .sum::<f64>()
            .abs();

        let (win_rate, profit_factor, avg_trade_return) = if num_trades == 0 {
            (
                MetricValue::NotApplicable,
                MetricValue::NotApplicable,
                MetricValue::NotApplicable,
            )
        } else {
            let profit_factor = if losing_trades == 0 {
                MetricValue::Undefined(UndefinedReason::NoLosingTrades)
            } else {
                MetricValue::finite(gross_win / gross_loss)
            };
            let avg = trades.iter().map(|t| t.return_pct).sum::<f64>() / num_trades as f64;
            (
                MetricValue::Defined(winning_trades as f64 / num_trades as f64),
                profit_factor,
                MetricValue::finite(avg),
            )
        };

        let recovery_factor = if max_drawdown == 0.0 {
            MetricValue::Undefined(UndefinedReason::ZeroDrawdown)
        } else {
            MetricValue::finite(total_return / max_drawdown.abs())
        };

        PerformanceReport {
            total_return,
            annualized_return,
            volatility,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            max_drawdown_duration,
            win_rate,
            profit_factor,
            recovery_factor,
            avg_trade_return,
            num_trades,
            winning_trades,
            losing_trades,
        }
    }
}

/// Simple returns between consecutive equity points with positive equity.
pub fn period_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .filter(|w| w[0].equity > 0.0 && w[1].equity.is_finite())
        .map(|w| w[1].equity / w[0].equity - 1.0)
        .collect()
}

/// Returns (max drawdown as a non-positive fraction, longest run of bars below a prior peak).
fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, usize) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    let mut current_duration = 0usize;
    let mut max_duration = 0usize;

    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            current_duration = 0;
        } else if peak > 0.0 {
            max_dd = max_dd.min(point.equity / peak - 1.0);
            current_duration += 1;
            max_duration = max_duration.max(current_duration);
        }
    }

    (max_dd, max_duration)
}

fn compute_risk_adjusted(returns: &[f64], period_rf: f64, ppy: f64) -> (MetricValue, MetricValue) {
    let Some(stddev) = sample_stddev(returns) else {
        let insufficient = MetricValue::Undefined(UndefinedReason::InsufficientData);
        return (insufficient, insufficient);
    };

    let n = returns.len() as f64;
    let excess = returns.iter().sum::<f64>() / n - period_rf;

    let sharpe = if stddev < VARIANCE_FLOOR {
        MetricValue::Undefined(UndefinedReason::ZeroVariance)
    } else {
        MetricValue::finite(excess / stddev * ppy.sqrt())
    };

    let downside_sq: f64 = returns
        .iter()
        .map(|r| (r - period_rf).min(0.0).powi(2))
        .sum();
    let downside_dev = (downside_sq / n).sqrt();
    let sortino = if downside_dev < VARIANCE_FLOOR {
        MetricValue::Undefined(UndefinedReason::ZeroVariance)
    } else {
        MetricValue::finite(excess / downside_dev * ppy.sqrt())
    };

    (sharpe, sortino)
}
