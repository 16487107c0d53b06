// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators used by the signal
// engine.  Series functions return an empty `Vec` and point lookups return
// `None` when there is not enough data, so callers decide how to degrade.

pub mod atr;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;
