// =============================================================================
// TA Signal Engine — library root
// =============================================================================
//
// Stateless technical-analysis signal engine for OHLCV bar series:
//
//   validator → indicators → levels → breakout → composer → AnalysisResult
//
// `engine::SignalEngine` is the single entry point.  The `api`, `app_state`
// and `market_data::polygon` modules make up the HTTP service around it.
// =============================================================================

pub mod analysis;
pub mod api;
pub mod app_state;
pub mod breakout;
pub mod composer;
pub mod engine;
pub mod error;
pub mod indicators;
pub mod levels;
pub mod market_data;
pub mod observer;
pub mod runtime_config;
pub mod types;
pub mod validator;

pub use analysis::AnalysisResult;
pub use engine::{analyze, SignalEngine};
pub use error::EngineError;
pub use market_data::Bar;
pub use runtime_config::AnalysisPolicy;
pub use types::{BreakoutDirection, Signal, Trend};
