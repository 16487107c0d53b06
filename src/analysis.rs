// =============================================================================
// Analysis Result — the engine's only externally visible artifact
// =============================================================================
//
// Successful and failed analyses share one shape.  Failures are told apart by
// the sentinel trend/signal labels and the `error` string, so consumers never
// need a second code path.
//
// Rounding happens here, at the output boundary: 5 decimals for prices, 2 for
// RSI (both configurable).  Everything upstream runs at full precision.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::indicators::macd::MacdSnapshot;
use crate::types::{BreakoutDirection, Signal, Trend};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub timeframe: String,
    /// Number of bars the analysis received.
    pub bars: usize,
    pub trend: Trend,
    pub signal: Signal,
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub rsi: f64,
    pub atr: f64,
    pub breakout_level: Option<f64>,
    pub breakout_direction: Option<BreakoutDirection>,
    pub breakout_confirmed: bool,
    /// Informational only; not part of the signal decision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub macd: Option<MacdSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisResult {
    /// Sentinel record for a rejected or failed analysis.
    ///
    /// `InsufficientData` maps to `Insufficient Data` / `No Signal`; every
    /// other error maps to `Error` / `Error`.  Numeric fields are zero.
    pub fn from_error(err: &EngineError, bars: usize) -> Self {
        let (trend, signal) = match err {
            EngineError::InsufficientData { .. } => (Trend::InsufficientData, Signal::NoSignal),
            EngineError::InvalidInput { .. } | EngineError::ComputationError { .. } => {
                (Trend::Error, Signal::Error)
            }
        };
        Self {
            timeframe: err.timeframe().to_string(),
            bars,
            trend,
            signal,
            entry: 0.0,
            stop_loss: 0.0,
            take_profit: 0.0,
            rsi: 0.0,
            atr: 0.0,
            breakout_level: None,
            breakout_direction: None,
            breakout_confirmed: false,
            macd: None,
            error: Some(err.to_string()),
        }
    }

    /// Error record for a timeframe that never reached the engine (e.g. the
    /// market-data fetch failed).
    pub fn failed(timeframe: &str, message: impl Into<String>) -> Self {
        let mut result = Self::from_error(&EngineError::computation(timeframe, ""), 0);
        result.error = Some(message.into());
        result
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Round every output field to the configured precision.
    pub fn rounded(mut self, price_decimals: u32, rsi_decimals: u32) -> Self {
        self.entry = round_to(self.entry, price_decimals);
        self.stop_loss = round_to(self.stop_loss, price_decimals);
        self.take_profit = round_to(self.take_profit, price_decimals);
        self.atr = round_to(self.atr, price_decimals);
        self.rsi = round_to(self.rsi, rsi_decimals);
        self.breakout_level = self.breakout_level.map(|l| round_to(l, price_decimals));
        self.macd = self.macd.map(|m| MacdSnapshot {
            line: round_to(m.line, price_decimals),
            signal: round_to(m.signal, price_decimals),
            histogram: round_to(m.histogram, price_decimals),
        });
        self
    }
}

/// Round half away from zero to `places` decimals.
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    let rounded = (value * factor).round() / factor;
    // Collapse -0.0 so serialised output never shows a signed zero.
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}
