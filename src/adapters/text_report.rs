//! Plain-text report adapter implementing ReportPort.
//!
//! Renders a metrics table (strategy next to its buy-and-hold baseline when
//! one is given), the per-regime breakdown and a data-quality summary.

use std::collections::BTreeMap;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::SignalbenchError;
use crate::domain::metrics::{MetricValue, PerformanceReport};
use crate::domain::position::ExitReason;
use crate::domain::quality::{AnomalyMetric, DataQualityKind};
use crate::domain::sweep::SweepEntry;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Default)]
pub struct TextReportAdapter;

impl TextReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

fn pct(v: f64) -> String {
    format!("{:.2}%", v * 100.0)
}

fn pct_metric(v: &MetricValue) -> String {
    match v.value() {
        Some(x) => pct(x),
        None => v.to_string(),
    }
}

fn ratio_metric(v: &MetricValue) -> String {
    match v.value() {
        Some(x) => format!("{:.2}", x),
        None => v.to_string(),
    }
}

fn metric_rows(report: &PerformanceReport) -> Vec<(&'static str, String)> {
    vec![
        ("Total Return", pct(report.total_return)),
        ("Annualized Return", pct_metric(&report.annualized_return)),
        ("Volatility", pct_metric(&report.volatility)),
        ("Sharpe Ratio", ratio_metric(&report.sharpe_ratio)),
        ("Sortino Ratio", ratio_metric(&report.sortino_ratio)),
        ("Max Drawdown", pct(report.max_drawdown)),
        ("Max DD Duration", format!("{} bars", report.max_drawdown_duration)),
        ("Win Rate", pct_metric(&report.win_rate)),
        ("Profit Factor", ratio_metric(&report.profit_factor)),
        ("Recovery Factor", ratio_metric(&report.recovery_factor)),
        ("Avg Trade Return", pct_metric(&report.avg_trade_return)),
        ("Trades", report.num_trades.to_string()),
        (
            "Won / Lost",
            format!("{} / {}", report.winning_trades, report.losing_trades),
        ),
    ]
}

fn quality_label(kind: &DataQualityKind) -> &'static str {
    match kind {
        DataQualityKind::MissingClose => "missing close",
        DataQualityKind::NonPositiveClose => "non-positive close",
        DataQualityKind::InconsistentBar => "inconsistent bar",
        DataQualityKind::NegativeVolume => "negative volume",
        DataQualityKind::TimestampGap { .. } => "timestamp gap",
        DataQualityKind::DeferredExecution => "deferred execution",
        DataQualityKind::Liquidation => "liquidation",
        DataQualityKind::Anomaly { metric, .. } => match metric {
            AnomalyMetric::Return => "return anomaly",
            AnomalyMetric::Price => "price anomaly",
            AnomalyMetric::Momentum => "momentum anomaly",
            AnomalyMetric::Volume => "volume anomaly",
        },
    }
}

pub fn format_metrics_table(result: &BacktestResult, baseline: Option<&BacktestResult>) -> String {
    let mut out = String::new();
    let rows = metric_rows(&result.report);
    match baseline {
        Some(base) => {
            let base_rows = metric_rows(&base.report);
            out.push_str(&format!("{:<20} {:>28} {:>28}\n", "Metric", "Strategy", "Buy & Hold"));
            for ((name, value), (_, base_value)) in rows.iter().zip(base_rows.iter()) {
                out.push_str(&format!("{:<20} {:>28} {:>28}\n", name, value, base_value));
            }
        }
        None => {
            for (name, value) in &rows {
                out.push_str(&format!("{:<20} {:>28}\n", name, value));
            }
        }
    }
    out
}

pub fn format_regime_table(result: &BacktestResult) -> String {
    if result.regime_performance.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    out.push_str(&format!(
        "{:<15} {:>8} {:>6} {:>12} {:>28} {:>7}\n",
        "Regime", "Windows", "Bars", "Return", "Sharpe", "Trades"
    ));
    for part in &result.regime_performance {
        out.push_str(&format!(
            "{:<15} {:>8} {:>6} {:>12} {:>28} {:>7}\n",
            part.condition.to_string(),
            part.windows,
            part.bars,
            pct(part.report.total_return),
            ratio_metric(&part.report.sharpe_ratio),
            part.report.num_trades
        ));
    }
    out
}

pub fn format_quality_summary(result: &BacktestResult) -> String {
    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for issue in &result.data_quality {
        *counts.entry(quality_label(&issue.kind)).or_default() += 1;
    }
    counts
        .iter()
        .map(|(label, n)| format!("  {}: {}\n", label, n))
        .collect()
}

/// Counts of trades closed by something other than a signal, e.g.
/// `stop loss 2, take profit 1`. Empty when every exit was a signal.
pub fn format_exit_summary(result: &BacktestResult) -> String {
    [
        (ExitReason::StopLoss, "stop loss"),
        (ExitReason::TakeProfit, "take profit"),
        (ExitReason::Liquidation, "liquidation"),
    ]
    .iter()
    .filter_map(|(reason, label)| {
        let n = result.trades.iter().filter(|t| t.exit_reason == *reason).count();
        (n > 0).then(|| format!("{} {}", label, n))
    })
    .collect::<Vec<_>>()
    .join(", ")
}

impl ReportPort for TextReportAdapter {
    fn render(
        &self,
        result: &BacktestResult,
        baseline: Option<&BacktestResult>,
    ) -> Result<String, SignalbenchError> {
        let mut out = String::new();
        out.push_str(&format!(
            "=== {} on {} ({}) ===\n",
            result.strategy, result.symbol, result.timeframe
        ));
        if let (Some(first), Some(last)) = (result.equity_curve.first(), result.equity_curve.last()) {
            out.push_str(&format!("Period:           {} to {}\n", first.timestamp, last.timestamp));
        }
        out.push_str(&format!("Initial Capital:  {:.2}\n", result.initial_capital));
        out.push_str(&format!("Final Equity:     {:.2}\n", result.final_equity()));
        if let Some(position) = &result.open_position {
            out.push_str(&format!(
                "Open Position:    {:?} since {} at {:.4}\n",
                position.direction, position.entry_time, position.entry_price
            ));
        }
        let exits = format_exit_summary(result);
        if !exits.is_empty() {
            out.push_str(&format!("Forced Exits:     {}\n", exits));
        }

        out.push('\n');
        out.push_str(&format_metrics_table(result, baseline));

        let regimes = format_regime_table(result);
        if !regimes.is_empty() {
            out.push_str("\n--- Performance by Market Regime ---\n");
            out.push_str(&regimes);
        }

        if !result.data_quality.is_empty() {
            out.push_str(&format!(
                "\n--- Data Quality ({} issues) ---\n",
                result.data_quality.len()
            ));
            out.push_str(&format_quality_summary(result));
        }

        Ok(out)
    }

    fn render_sweep(&self, entries: &[SweepEntry]) -> Result<String, SignalbenchError> {
        let mut out = String::new();
        out.push_str(&format!(
            "{:<12} {:<32} {:>10} {:>28} {:>10} {:>7}\n",
            "Symbol", "Strategy", "Return", "Sharpe", "Max DD", "Trades"
        ));
        for entry in entries {
            match &entry.outcome {
                Ok(result) => out.push_str(&format!(
                    "{:<12} {:<32} {:>10} {:>28} {:>10} {:>7}\n",
                    entry.symbol,
                    entry.strategy,
                    pct(result.report.total_return),
                    ratio_metric(&result.report.sharpe_ratio),
                    pct(result.report.max_drawdown),
                    result.report.num_trades
                )),
                Err(e) => out.push_str(&format!(
                    "{:<12} {:<32} error: {}\n",
                    entry.symbol, entry.strategy, e
                )),
            }
        }
        Ok(out)
    }
}
