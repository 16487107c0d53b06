// =============================================================================
// Engine error taxonomy
// =============================================================================
//
// Every stage of the analysis pipeline returns `Result<_, EngineError>`.  The
// engine boundary converts these into sentinel-tagged analysis records; they
// never reach callers as errors.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Malformed input: not a sequence, non-numeric fields, or a bar that
    /// breaks the OHLC invariants.
    #[error("Invalid candle data structure for {timeframe}: {detail}")]
    InvalidInput { timeframe: String, detail: String },

    /// Series shorter than the timeframe's minimum.
    #[error("Insufficient historical data for {timeframe} analysis ({got}/{need} candles)")]
    InsufficientData {
        timeframe: String,
        got: usize,
        need: usize,
    },

    /// Unexpected numeric failure inside the pipeline.
    #[error("{timeframe} analysis failed: {detail}")]
    ComputationError { timeframe: String, detail: String },
}

impl EngineError {
    pub fn invalid(timeframe: &str, detail: impl Into<String>) -> Self {
        Self::InvalidInput {
            timeframe: timeframe.to_string(),
            detail: detail.into(),
        }
    }

    pub fn computation(timeframe: &str, detail: impl Into<String>) -> Self {
        Self::ComputationError {
            timeframe: timeframe.to_string(),
            detail: detail.into(),
        }
    }

    /// Timeframe label the failing analysis was run for.
    pub fn timeframe(&self) -> &str {
        match self {
            Self::InvalidInput { timeframe, .. }
            | Self::InsufficientData { timeframe, .. }
            | Self::ComputationError { timeframe, .. } => timeframe,
        }
    }
}
