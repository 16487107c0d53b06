// =============================================================================
// Signal Engine — the single function boundary
// =============================================================================
//
// Pipeline (strictly forward, no state carried between calls):
//
//   Validator → Indicators → Level Detector → Breakout Classifier → Composer
//
// `SignalEngine::analyze` ALWAYS returns an `AnalysisResult`.  Stage errors and
// unexpected panics are converted into sentinel-tagged records here, so a bad
// series for one timeframe never aborts a batch.
// =============================================================================

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use rayon::prelude::*;
use serde_json::Value;

use crate::analysis::AnalysisResult;
use crate::breakout;
use crate::composer::{self, ComposerInputs};
use crate::error::EngineError;
use crate::indicators::atr::{floored_atr, latest_atr};
use crate::indicators::macd::calculate_macd;
use crate::indicators::rsi::latest_rsi;
use crate::indicators::sma::latest_sma;
use crate::levels::find_significant_levels;
use crate::market_data::{Bar, SeriesColumns};
use crate::observer::{AnalysisObserver, IndicatorSnapshot, TracingObserver};
use crate::runtime_config::AnalysisPolicy;
use crate::validator;

/// RSI reported when the series is too short for even a clamped period.
const NEUTRAL_RSI: f64 = 50.0;

/// Stateless analysis engine: an immutable policy plus a diagnostics sink.
///
/// Cheap to clone and safe to share across threads.
#[derive(Clone)]
pub struct SignalEngine {
    policy: AnalysisPolicy,
    observer: Arc<dyn AnalysisObserver>,
}

impl Default for SignalEngine {
    fn default() -> Self {
        Self::new(AnalysisPolicy::default())
    }
}

impl std::fmt::Debug for SignalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalEngine")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl SignalEngine {
    pub fn new(policy: AnalysisPolicy) -> Self {
        Self {
            policy,
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn AnalysisObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn policy(&self) -> &AnalysisPolicy {
        &self.policy
    }

    /// Analyse one bar series for `timeframe`.
    pub fn analyze(&self, bars: &[Bar], timeframe: &str) -> AnalysisResult {
        self.observer.on_start(timeframe, bars.len());

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run(bars, timeframe)))
            .unwrap_or_else(|payload| {
                Err(EngineError::computation(timeframe, panic_message(payload.as_ref())))
            });

        match outcome {
            Ok(result) => {
                self.observer.on_complete(timeframe, &result);
                result
            }
            Err(err) => {
                self.observer.on_rejected(timeframe, &err);
                AnalysisResult::from_error(&err, bars.len())
            }
        }
    }

    /// Analyse an untyped JSON payload, reporting malformed input as an
    /// `InvalidInput` record.
    pub fn analyze_value(&self, value: &Value, timeframe: &str) -> AnalysisResult {
        match validator::parse_bars(value, timeframe) {
            Ok(bars) => self.analyze(&bars, timeframe),
            Err(err) => {
                let len = value.as_array().map_or(0, Vec::len);
                self.observer.on_start(timeframe, len);
                self.observer.on_rejected(timeframe, &err);
                AnalysisResult::from_error(&err, len)
            }
        }
    }

    /// Analyse several timeframes independently and in parallel.
    ///
    /// Keyed by timeframe label; a failure in one entry only affects that
    /// entry's record.
    pub fn analyze_batch(&self, series: &[(String, Vec<Bar>)]) -> BTreeMap<String, AnalysisResult> {
        series
            .par_iter()
            .map(|(timeframe, bars)| (timeframe.clone(), self.analyze(bars, timeframe)))
            .collect()
    }

    fn run(&self, bars: &[Bar], timeframe: &str) -> Result<AnalysisResult, EngineError> {
        let policy = &self.policy;
        let bars = validator::validate(bars, timeframe, policy)?;

        let cols = SeriesColumns::from_bars(bars);
        let n = cols.len();
        let close = *cols
            .closes
            .last()
            .ok_or_else(|| EngineError::computation(timeframe, "empty series after validation"))?;

        // --- Indicators ------------------------------------------------------
        let rsi = latest_rsi(&cols.closes, policy.rsi_period_for(n)).unwrap_or(NEUTRAL_RSI);

        let raw_atr = latest_atr(&cols.highs, &cols.lows, &cols.closes, policy.atr_period_for(n));
        let atr = floored_atr(
            raw_atr,
            &cols.highs,
            &cols.lows,
            close,
            policy.atr_floor_pct,
            policy.price_decimals,
        );
        let atr_floored = raw_atr != Some(atr);

        let sma_fast = latest_sma(&cols.closes, policy.sma_fast_for(n)).unwrap_or(close);
        let sma_slow = latest_sma(&cols.closes, policy.sma_slow_for(n)).unwrap_or(close);

        let (fast, slow, signal) = policy.macd_periods_for(n);
        let macd = calculate_macd(&cols.closes, fast, slow, signal).latest();

        // --- Levels & breakout -----------------------------------------------
        let levels = find_significant_levels(&cols.highs, &cols.lows, policy.pivot_window_for(n));

        self.observer.on_indicators(
            timeframe,
            &IndicatorSnapshot {
                close,
                sma_fast,
                sma_slow,
                rsi,
                atr,
                atr_floored,
                levels: levels.len(),
            },
        );

        let assessment = breakout::classify(&cols, &levels, policy)
            .ok_or_else(|| EngineError::computation(timeframe, "breakout needs at least two bars"))?;
        self.observer.on_breakout(timeframe, &assessment);

        // --- Decision --------------------------------------------------------
        let (trend, plan) = composer::compose(
            &ComposerInputs {
                close,
                sma_fast,
                sma_slow,
                rsi,
                atr,
                breakout: assessment.event.as_ref(),
            },
            policy,
        );

        let outputs = [
            ("entry", plan.entry),
            ("stop_loss", plan.stop_loss),
            ("take_profit", plan.take_profit),
            ("rsi", rsi),
            ("atr", atr),
        ];
        if let Some((name, value)) = outputs.iter().find(|(_, v)| !v.is_finite()) {
            return Err(EngineError::computation(
                timeframe,
                format!("{name} is not finite ({value})"),
            ));
        }

        let event = assessment.event;
        let result = AnalysisResult {
            timeframe: timeframe.to_string(),
            bars: n,
            trend,
            signal: plan.signal,
            entry: plan.entry,
            stop_loss: plan.stop_loss,
            take_profit: plan.take_profit,
            rsi,
            atr,
            breakout_level: event.map(|e| e.level),
            breakout_direction: event.map(|e| e.direction),
            breakout_confirmed: assessment.confirmed(),
            macd,
            error: None,
        };

        Ok(result.rounded(policy.price_decimals, policy.rsi_decimals))
    }
}

/// Analyse `bars` with the default policy and tracing diagnostics.
pub fn analyze(bars: &[Bar], timeframe: &str) -> AnalysisResult {
    SignalEngine::default().analyze(bars, timeframe)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unexpected panic during analysis".to_string()
    }
}
