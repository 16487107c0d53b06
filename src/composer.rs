// =============================================================================
// Trend & Signal Composer
// =============================================================================
//
// Trend (price vs. fast SMA vs. slow SMA):
//   Uptrend   — close > SMA_fast > SMA_slow
//   Downtrend — close < SMA_fast < SMA_slow
//   Sideways  — anything else
//
// Signal, first match wins:
//   1. Confirmed UP breakout in an Uptrend       → BUY,  stop 1.5 ATR, target 2R
//   2. Confirmed DOWN breakout in a Downtrend    → SELL, stop 1.5 ATR, target 2R
//   3. Confirmed breakout against the trend      → Hold
//   4. No confirmed breakout:
//        Uptrend and RSI < 40                    → BUY,  stop 2 ATR, target 3 ATR
//        Downtrend and RSI > 60                  → SELL, stop 2 ATR, target 3 ATR
//   5. Otherwise                                 → Hold, price fields zero
//
// Multiples and RSI thresholds come from `AnalysisPolicy`.
// =============================================================================

use crate::breakout::BreakoutEvent;
use crate::runtime_config::AnalysisPolicy;
use crate::types::{BreakoutDirection, Signal, Trend};

/// Signal plus its price levels.  All prices are zero for `Hold`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradePlan {
    pub signal: Signal,
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

impl TradePlan {
    pub fn hold() -> Self {
        Self {
            signal: Signal::Hold,
            entry: 0.0,
            stop_loss: 0.0,
            take_profit: 0.0,
        }
    }
}

/// Inputs the composer needs from the earlier stages.
#[derive(Debug, Clone, Copy)]
pub struct ComposerInputs<'a> {
    pub close: f64,
    pub sma_fast: f64,
    pub sma_slow: f64,
    pub rsi: f64,
    pub atr: f64,
    pub breakout: Option<&'a BreakoutEvent>,
}

pub fn classify_trend(close: f64, sma_fast: f64, sma_slow: f64) -> Trend {
    if close > sma_fast && sma_fast > sma_slow {
        Trend::Uptrend
    } else if close < sma_fast && sma_fast < sma_slow {
        Trend::Downtrend
    } else {
        Trend::Sideways
    }
}

/// Combine trend, momentum and breakout state into a trade plan.
pub fn compose(inputs: &ComposerInputs<'_>, policy: &AnalysisPolicy) -> (Trend, TradePlan) {
    let trend = classify_trend(inputs.close, inputs.sma_fast, inputs.sma_slow);
    let entry = inputs.close;
    let atr = inputs.atr;

    let confirmed = inputs.breakout.filter(|b| b.confirmed);

    let plan = match (confirmed.map(|b| b.direction), trend) {
        (Some(BreakoutDirection::Up), Trend::Uptrend) => {
            let stop_loss = entry - atr * policy.breakout_stop_atr;
            TradePlan {
                signal: Signal::Buy,
                entry,
                stop_loss,
                take_profit: entry + (entry - stop_loss) * policy.breakout_reward_ratio,
            }
        }
        (Some(BreakoutDirection::Down), Trend::Downtrend) => {
            let stop_loss = entry + atr * policy.breakout_stop_atr;
            TradePlan {
                signal: Signal::Sell,
                entry,
                stop_loss,
                take_profit: entry - (stop_loss - entry) * policy.breakout_reward_ratio,
            }
        }
        (Some(_), _) => TradePlan::hold(),
        (None, Trend::Uptrend) if inputs.rsi < policy.rsi_buy_below => TradePlan {
            signal: Signal::Buy,
            entry,
            stop_loss: entry - atr * policy.fallback_stop_atr,
            take_profit: entry + atr * policy.fallback_target_atr,
        },
        (None, Trend::Downtrend) if inputs.rsi > policy.rsi_sell_above => TradePlan {
            signal: Signal::Sell,
            entry,
            stop_loss: entry + atr * policy.fallback_stop_atr,
            take_profit: entry - atr * policy.fallback_target_atr,
        },
        (None, _) => TradePlan::hold(),
    };

    (trend, plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(direction: BreakoutDirection, confirmed: bool) -> BreakoutEvent {
        BreakoutEvent {
            level: 100.0,
            direction,
            crossed_at: 0,
            retested: confirmed,
            large_range: true,
            high_volume: false,
            confirmed,
        }
    }

    fn inputs(close: f64, fast: f64, slow: f64, rsi: f64, breakout: Option<&BreakoutEvent>) -> ComposerInputs<'_> {
        ComposerInputs {
            close,
            sma_fast: fast,
            sma_slow: slow,
            rsi,
            atr: 2.0,
            breakout,
        }
    }

    #[test]
    fn trend_ordering() {
        assert_eq!(classify_trend(110.0, 105.0, 100.0), Trend::Uptrend);
        assert_eq!(classify_trend(90.0, 95.0, 100.0), Trend::Downtrend);
        assert_eq!(classify_trend(104.0, 105.0, 100.0), Trend::Sideways);
        assert_eq!(classify_trend(100.0, 100.0, 100.0), Trend::Sideways);
    }

    #[test]
    fn confirmed_up_breakout_in_uptrend_buys_with_two_r_target() {
        let e = event(BreakoutDirection::Up, true);
        let (trend, plan) = compose(&inputs(110.0, 105.0, 100.0, 70.0, Some(&e)), &AnalysisPolicy::default());
        assert_eq!(trend, Trend::Uptrend);
        assert_eq!(plan.signal, Signal::Buy);
        assert_eq!(plan.entry, 110.0);
        assert!((plan.stop_loss - 107.0).abs() < 1e-12);
        assert!((plan.take_profit - 116.0).abs() < 1e-12);
    }

    #[test]
    fn confirmed_down_breakout_in_downtrend_sells() {
        let e = event(BreakoutDirection::Down, true);
        let (_, plan) = compose(&inputs(90.0, 95.0, 100.0, 30.0, Some(&e)), &AnalysisPolicy::default());
        assert_eq!(plan.signal, Signal::Sell);
        assert!((plan.stop_loss - 93.0).abs() < 1e-12);
        assert!((plan.take_profit - 84.0).abs() < 1e-12);
    }

    #[test]
    fn confirmed_breakout_against_trend_holds() {
        // Would trigger the RSI fallback if the breakout were ignored.
        let e = event(BreakoutDirection::Down, true);
        let (trend, plan) = compose(&inputs(110.0, 105.0, 100.0, 35.0, Some(&e)), &AnalysisPolicy::default());
        assert_eq!(trend, Trend::Uptrend);
        assert_eq!(plan, TradePlan::hold());
    }

    #[test]
    fn unconfirmed_breakout_falls_back_to_rsi() {
        let e = event(BreakoutDirection::Up, false);
        let (_, plan) = compose(&inputs(110.0, 105.0, 100.0, 35.0, Some(&e)), &AnalysisPolicy::default());
        assert_eq!(plan.signal, Signal::Buy);
        assert!((plan.stop_loss - 106.0).abs() < 1e-12);
        assert!((plan.take_profit - 116.0).abs() < 1e-12);
    }

    #[test]
    fn rsi_fallback_sell_in_downtrend() {
        let (_, plan) = compose(&inputs(90.0, 95.0, 100.0, 65.0, None), &AnalysisPolicy::default());
        assert_eq!(plan.signal, Signal::Sell);
        assert!((plan.stop_loss - 94.0).abs() < 1e-12);
        assert!((plan.take_profit - 84.0).abs() < 1e-12);
    }

    #[test]
    fn neutral_rsi_in_trend_holds() {
        let (_, plan) = compose(&inputs(110.0, 105.0, 100.0, 55.0, None), &AnalysisPolicy::default());
        assert_eq!(plan, TradePlan::hold());
        let (_, plan) = compose(&inputs(104.0, 105.0, 100.0, 10.0, None), &AnalysisPolicy::default());
        assert_eq!(plan, TradePlan::hold());
    }
}
