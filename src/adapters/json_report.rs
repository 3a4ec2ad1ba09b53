//! JSON report adapter implementing ReportPort.

use serde::Serialize;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::SignalbenchError;
use crate::domain::metrics::PerformanceReport;
use crate::domain::sweep::SweepEntry;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Default)]
pub struct JsonReportAdapter;

impl JsonReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Serialize)]
struct RunDocument<'a> {
    #[serde(flatten)]
    result: &'a BacktestResult,
    final_equity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    baseline: Option<BaselineSummary<'a>>,
}

#[derive(Serialize)]
struct BaselineSummary<'a> {
    strategy: &'a str,
    final_equity: f64,
    report: &'a PerformanceReport,
}

#[derive(Serialize)]
struct SweepRow<'a> {
    symbol: &'a str,
    strategy: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<&'a PerformanceReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn to_json<T: Serialize>(value: &T) -> Result<String, SignalbenchError> {
    serde_json::to_string_pretty(value).map_err(|e| SignalbenchError::Report {
        reason: format!("JSON serialization failed: {}", e),
    })
}

impl ReportPort for JsonReportAdapter {
    fn render(
        &self,
        result: &BacktestResult,
        baseline: Option<&BacktestResult>,
    ) -> Result<String, SignalbenchError> {
        to_json(&RunDocument {
            result,
            final_equity: result.final_equity(),
            baseline: baseline.map(|b| BaselineSummary {
                strategy: &b.strategy,
                final_equity: b.final_equity(),
                report: &b.report,
            }),
        })
    }

    fn render_sweep(&self, entries: &[SweepEntry]) -> Result<String, SignalbenchError> {
        let rows: Vec<SweepRow<'_>> = entries
            .iter()
            .map(|entry| SweepRow {
                symbol: &entry.symbol,
                strategy: &entry.strategy,
                report: entry.outcome.as_ref().ok().map(|r| &r.report),
                error: entry.outcome.as_ref().err().map(|e| e.to_string()),
            })
            .collect();
        to_json(&rows)
    }
}
