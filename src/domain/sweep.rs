//! Benchmark sweeps across symbols and strategies.

use std::cmp::Ordering;

use rayon::prelude::*;

use crate::domain::backtest::{run_backtest, run_buy_and_hold, BacktestConfig, BacktestResult, BUY_AND_HOLD};
use crate::domain::error::SignalbenchError;
use crate::domain::ohlcv::PriceSeries;
use crate::domain::strategy::{CrossoverKind, CrossoverParams, Strategy};

/// Crossover parameter grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamGrid {
    pub kind: CrossoverKind,
    pub fast_periods: Vec<usize>,
    pub slow_periods: Vec<usize>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        ParamGrid {
            kind: CrossoverKind::Sma,
            fast_periods: vec![10, 20, 30],
            slow_periods: vec![50, 100, 200],
        }
    }
}

impl ParamGrid {
    /// Upper bound on the number of strategies (before dropping fast >= slow).
    pub fn size(&self) -> usize {
        self.fast_periods.len() * self.slow_periods.len()
    }

    pub fn strategies(&self) -> Vec<Strategy> {
        let mut strategies = Vec::new();
        for &fast in &self.fast_periods {
            for &slow in &self.slow_periods {
                if fast >= slow {
                    continue;
                }
                strategies.push(Strategy::Crossover(CrossoverParams {
                    kind: self.kind,
                    fast,
                    slow,
                    allow_short: false,
                }));
            }
        }
        strategies
    }
}

/// One (symbol, strategy) run. A failed run does not abort the sweep.
#[derive(Debug)]
pub struct SweepEntry {
    pub symbol: String,
    pub strategy: String,
    pub outcome: Result<BacktestResult, SignalbenchError>,
}

impl SweepEntry {
    pub fn sharpe(&self) -> Option<f64> {
        self.outcome
            .as_ref()
            .ok()
            .and_then(|r| r.report.sharpe_ratio.value())
    }
}

/// Defined Sharpe descending, then undefined, then failures.
fn by_sharpe(a: &SweepEntry, b: &SweepEntry) -> Ordering {
    match (a.sharpe(), b.sharpe()) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.outcome.is_ok().cmp(&a.outcome.is_ok()),
    }
}

/// Runs every (series, strategy) pair plus a buy-and-hold baseline per
/// series in parallel. Results are grouped by symbol and ranked by Sharpe.
pub fn run_sweep(
    series: &[PriceSeries],
    strategies: &[Strategy],
    config: &BacktestConfig,
) -> Vec<SweepEntry> {
    let jobs: Vec<(&PriceSeries, Option<&Strategy>)> = series
        .iter()
        .flat_map(|s| {
            std::iter::once((s, None)).chain(strategies.iter().map(move |st| (s, Some(st))))
        })
        .collect();

    tracing::info!(
        symbols = series.len(),
        strategies = strategies.len(),
        runs = jobs.len(),
        "starting sweep"
    );

    let mut entries: Vec<SweepEntry> = jobs
        .par_iter()
        .map(|(s, strategy)| match strategy {
            Some(strategy) => SweepEntry {
                symbol: s.symbol().to_string(),
                strategy: strategy.name(),
                outcome: run_backtest(s, strategy, config),
            },
            None => SweepEntry {
                symbol: s.symbol().to_string(),
                strategy: BUY_AND_HOLD.to_string(),
                outcome: run_buy_and_hold(s, config),
            },
        })
        .collect();

    for entry in &entries {
        if let Err(e) = &entry.outcome {
            tracing::warn!(symbol = %entry.symbol, strategy = %entry.strategy, error = %e, "sweep run failed");
        }
    }

    entries.sort_by(|a, b| a.symbol.cmp(&b.symbol).then_with(|| by_sharpe(a, b)));
    entries
}
