//! Report generation port trait.

use std::path::Path;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::SignalbenchError;
use crate::domain::sweep::SweepEntry;

/// Port for rendering and writing backtest reports.
pub trait ReportPort {
    /// Renders one run, optionally alongside its buy-and-hold baseline.
    fn render(
        &self,
        result: &BacktestResult,
        baseline: Option<&BacktestResult>,
    ) -> Result<String, SignalbenchError>;

    fn render_sweep(&self, entries: &[SweepEntry]) -> Result<String, SignalbenchError>;

    /// Default implementation: writes the output of `render` to `output_path`.
    fn write(
        &self,
        result: &BacktestResult,
        baseline: Option<&BacktestResult>,
        output_path: &Path,
    ) -> Result<(), SignalbenchError> {
        let content = self.render(result, baseline)?;
        std::fs::write(output_path, content).map_err(|e| SignalbenchError::Report {
            reason: format!("failed to write {}: {}", output_path.display(), e),
        })
    }
}
