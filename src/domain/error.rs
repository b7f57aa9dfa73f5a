//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for pricechart.
///
/// Errors are `Clone` so that a single in-flight fetch can hand the same
/// failure to every caller waiting on it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChartError {
    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("invalid symbol {symbol:?}: {reason}")]
    InvalidSymbol { symbol: String, reason: String },

    #[error("provider error: {reason}")]
    Provider { reason: String },

    #[error("no such instrument: {symbol}")]
    NotFound { symbol: String },

    #[error("no usable price data for {symbol}")]
    EmptySeries { symbol: String },

    #[error("invalid record on {date}: {reason}")]
    InvalidRecord { date: NaiveDate, reason: String },

    #[error("indicator computation failed: {reason}")]
    Computation { reason: String },

    #[error("cannot compose a chart for {symbol}: price series has no records")]
    EmptyComposition { symbol: String },

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

    #[error("failed to write {path}: {reason}")]
    Output { path: String, reason: String },
}

impl ChartError {
    /// Transient provider failures (network, timeout) may be retried by the
    /// fetcher; everything else is terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChartError::Provider { .. })
    }

    /// Process exit status for this failure: 1 output, 2 config,
    /// 3 provider, 4 caller input, 5 data or computation.
    pub fn exit_status(&self) -> u8 {
        match self {
            ChartError::Output { .. } => 1,
            ChartError::ConfigParse { .. }
            | ChartError::ConfigMissing { .. }
            | ChartError::ConfigInvalid { .. } => 2,
            ChartError::Provider { .. } | ChartError::NotFound { .. } => 3,
            ChartError::InvalidRange { .. } | ChartError::InvalidSymbol { .. } => 4,
            ChartError::EmptySeries { .. }
            | ChartError::InvalidRecord { .. }
            | ChartError::Computation { .. }
            | ChartError::EmptyComposition { .. } => 5,
        }
    }

    pub(crate) fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        ChartError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&ChartError> for std::process::ExitCode {
    fn from(err: &ChartError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}
