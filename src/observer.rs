// =============================================================================
// Analysis Observer — diagnostics kept out of the numeric pipeline
// =============================================================================
//
// The engine notifies an observer at each stage instead of logging inline.
// `TracingObserver` is the default and turns notifications into structured
// tracing events; `NoopObserver` discards them.

use tracing::{debug, info, warn};

use crate::analysis::AnalysisResult;
use crate::breakout::BreakoutAssessment;
use crate::error::EngineError;

/// Indicator values the engine settled on, before any rounding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorSnapshot {
    pub close: f64,
    pub sma_fast: f64,
    pub sma_slow: f64,
    pub rsi: f64,
    pub atr: f64,
    /// `true` when the raw ATR was missing or zero and a fallback was used.
    pub atr_floored: bool,
    pub levels: usize,
}

/// Receives diagnostics from the engine.  All methods default to no-ops.
pub trait AnalysisObserver: Send + Sync {
    fn on_start(&self, _timeframe: &str, _bars: usize) {}
    fn on_rejected(&self, _timeframe: &str, _error: &EngineError) {}
    fn on_indicators(&self, _timeframe: &str, _snapshot: &IndicatorSnapshot) {}
    fn on_breakout(&self, _timeframe: &str, _assessment: &BreakoutAssessment) {}
    fn on_complete(&self, _timeframe: &str, _result: &AnalysisResult) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl AnalysisObserver for NoopObserver {}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl AnalysisObserver for TracingObserver {
    fn on_start(&self, timeframe: &str, bars: usize) {
        debug!(timeframe, bars, "analysis started");
    }

    fn on_rejected(&self, timeframe: &str, error: &EngineError) {
        match error {
            EngineError::InsufficientData { got, need, .. } => {
                warn!(timeframe, got, need, "insufficient data");
            }
            other => warn!(timeframe, error = %other, "analysis rejected"),
        }
    }

    fn on_indicators(&self, timeframe: &str, s: &IndicatorSnapshot) {
        debug!(
            timeframe,
            close = s.close,
            sma_fast = s.sma_fast,
            sma_slow = s.sma_slow,
            rsi = format!("{:.2}", s.rsi),
            atr = s.atr,
            atr_floored = s.atr_floored,
            levels = s.levels,
            "indicators computed"
        );
    }

    fn on_breakout(&self, timeframe: &str, a: &BreakoutAssessment) {
        match &a.event {
            Some(e) => debug!(
                timeframe,
                level = e.level,
                crossed_at = e.crossed_at,
                direction = %e.direction,
                retested = e.retested,
                large_range = e.large_range,
                high_volume = e.high_volume,
                confirmed = e.confirmed,
                "breakout detected"
            ),
            None => debug!(
                timeframe,
                resistance = a.nearest.resistance,
                support = a.nearest.support,
                "no breakout"
            ),
        }
    }

    fn on_complete(&self, timeframe: &str, r: &AnalysisResult) {
        info!(
            timeframe,
            trend = %r.trend,
            signal = %r.signal,
            entry = r.entry,
            rsi = r.rsi,
            atr = r.atr,
            breakout_confirmed = r.breakout_confirmed,
            "analysis completed"
        );
    }
}
