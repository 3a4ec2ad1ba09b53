//! Domain error types.
//!
//! Data-quality problems and numerically degenerate metrics are not errors:
//! they are recorded in the backtest output (see [`crate::domain::quality`]
//! and [`crate::domain::metrics::MetricValue`]). Only conditions that stop a
//! run before it starts surface here.

/// Top-level error type for signalbench.
#[derive(Debug, thiserror::Error)]
pub enum SignalbenchError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid price series for {symbol}: {reason}")]
    InvalidSeries { symbol: String, reason: String },

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error("data load error: {reason}")]
    DataLoad { reason: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SignalbenchError {
    /// Shorthand for a [`SignalbenchError::ConfigInvalid`] naming the offending field.
    pub fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        SignalbenchError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn missing(section: &str, key: &str) -> Self {
        SignalbenchError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }

    /// Process exit status: 1 I/O or report, 2 config, 3 data load, 5 bad series.
    pub fn exit_code(&self) -> u8 {
        match self {
            SignalbenchError::Io(_) | SignalbenchError::Report { .. } => 1,
            SignalbenchError::ConfigParse { .. }
            | SignalbenchError::ConfigMissing { .. }
            | SignalbenchError::ConfigInvalid { .. } => 2,
            SignalbenchError::DataLoad { .. } => 3,
            SignalbenchError::InvalidSeries { .. } | SignalbenchError::NoData { .. } => 5,
        }
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SignalbenchError::ConfigParse { .. }
                | SignalbenchError::ConfigMissing { .. }
                | SignalbenchError::ConfigInvalid { .. }
        )
    }
}

impl From<&SignalbenchError> for std::process::ExitCode {
    fn from(err: &SignalbenchError) -> Self {
        std::process::ExitCode::from(err.exit_code())
    }
}
