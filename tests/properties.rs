//! Property tests for the signal engine.
//!
//! Uses proptest to verify:
//! 1. Indicator outputs are finite and in range on any valid series
//! 2. EMA seed equals the SMA of the first window
//! 3. Trade plans are ordered consistently with the signal
//! 4. A confirmed breakout always passed the retest gate
//! 5. Repeated analysis is identical
//! 6. Short series always produce the insufficient-data sentinel

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use ta_signal_engine::breakout::classify;
use ta_signal_engine::indicators::{ema::calculate_ema, rsi::calculate_rsi, sma::calculate_sma};
use ta_signal_engine::levels::find_significant_levels;
use ta_signal_engine::market_data::SeriesColumns;
use ta_signal_engine::observer::NoopObserver;
use ta_signal_engine::{AnalysisPolicy, Bar, Signal, SignalEngine, Trend};

// ── Strategies (proptest) ────────────────────────────────────────────

/// Per-bar move: (close change, upper wick, lower wick, volume).
fn arb_step() -> impl Strategy<Value = (f64, f64, f64, f64)> {
    (-0.03..0.03_f64, 0.0..0.01_f64, 0.0..0.01_f64, prop_oneof![Just(0.0), 1.0..1000.0_f64])
}

/// A structurally valid bar series of `len` bars starting near 100.
fn arb_series(len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<Bar>> {
    prop::collection::vec(arb_step(), len).prop_map(|steps| {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut prev = 100.0_f64;
        steps
            .into_iter()
            .enumerate()
            .map(|(i, (delta, up, down, volume))| {
                let open = prev;
                let close = prev * (1.0 + delta);
                let high = open.max(close) * (1.0 + up);
                let low = open.min(close) * (1.0 - down);
                prev = close;
                Bar::new(t0 + Duration::days(i as i64), open, high, low, close, volume)
            })
            .collect()
    })
}

fn engine() -> SignalEngine {
    SignalEngine::default().with_observer(std::sync::Arc::new(NoopObserver))
}

// ── 1. Finite, in-range outputs ──────────────────────────────────────

proptest! {
    #[test]
    fn valid_series_yield_finite_outputs(bars in arb_series(50..200)) {
        let r = engine().analyze(&bars, "D1");
        prop_assert!(r.error.is_none(), "unexpected error: {:?}", r.error);
        prop_assert!(matches!(r.trend, Trend::Uptrend | Trend::Downtrend | Trend::Sideways));
        for v in [r.entry, r.stop_loss, r.take_profit, r.rsi, r.atr] {
            prop_assert!(v.is_finite());
        }
        prop_assert!((0.0..=100.0).contains(&r.rsi));
        prop_assert!(r.atr > 0.0);
    }

    #[test]
    fn rsi_stays_in_range(closes in prop::collection::vec(1.0..1000.0_f64, 2..120), period in 1usize..30) {
        for v in calculate_rsi(&closes, period) {
            prop_assert!((0.0..=100.0).contains(&v));
        }
    }

    #[test]
    fn sma_of_constant_is_constant(c in 1.0..1000.0_f64, n in 1usize..80, period in 1usize..20) {
        for v in calculate_sma(&vec![c; n], period) {
            prop_assert!((v - c).abs() < 1e-9 * c);
        }
    }
}

// ── 2. EMA seed ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn ema_seed_is_sma(closes in prop::collection::vec(1.0..1000.0_f64, 1..100), period in 1usize..30) {
        prop_assume!(closes.len() >= period);
        let ema = calculate_ema(&closes, period);
        let sma = closes[..period].iter().sum::<f64>() / period as f64;
        prop_assert_eq!(ema.len(), closes.len() - period + 1);
        prop_assert!((ema[0] - sma).abs() < 1e-9 * sma.abs().max(1.0));
    }
}

// ── 3. Trade plan ordering ───────────────────────────────────────────

proptest! {
    #[test]
    fn trade_plan_matches_signal(bars in arb_series(50..200)) {
        let r = engine().analyze(&bars, "D1");
        match r.signal {
            Signal::Buy => {
                prop_assert!(r.stop_loss < r.entry && r.entry < r.take_profit);
                prop_assert_eq!(r.trend, Trend::Uptrend);
            }
            Signal::Sell => {
                prop_assert!(r.take_profit < r.entry && r.entry < r.stop_loss);
                prop_assert_eq!(r.trend, Trend::Downtrend);
            }
            Signal::Hold => {
                prop_assert_eq!((r.entry, r.stop_loss, r.take_profit), (0.0, 0.0, 0.0));
            }
            other => prop_assert!(false, "unexpected signal {other:?}"),
        }
    }
}

// ── 4. Retest gate ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn confirmed_breakout_was_retested(bars in arb_series(30..150)) {
        let policy = AnalysisPolicy::default();
        let cols = SeriesColumns::from_bars(&bars);
        let levels = find_significant_levels(&cols.highs, &cols.lows, policy.pivot_window_for(cols.len()));
        let assessment = classify(&cols, &levels, &policy).unwrap();
        if let Some(event) = assessment.event {
            prop_assert_eq!(event.confirmed, event.retested && (event.large_range || event.high_volume));
            // The crossing bar cannot retest itself.
            prop_assert!(!event.retested || event.crossed_at + 1 < cols.len());
        }
        prop_assert_eq!(assessment.confirmed(), assessment.event.is_some_and(|e| e.retested && e.confirmed));
    }
}

// ── 5. Determinism ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn analysis_is_deterministic(bars in arb_series(40..120)) {
        let e = engine();
        let a = serde_json::to_string(&e.analyze(&bars, "H1")).unwrap();
        let b = serde_json::to_string(&e.analyze(&bars, "H1")).unwrap();
        prop_assert_eq!(a, b);
    }
}

// ── 6. Insufficient data ─────────────────────────────────────────────

proptest! {
    #[test]
    fn short_series_are_insufficient(
        bars in arb_series(0..50),
        tf in prop_oneof![Just("M15"), Just("H1"), Just("H4"), Just("D1")],
    ) {
        let need = AnalysisPolicy::default().min_bars(tf);
        prop_assume!(bars.len() < need);
        let r = engine().analyze(&bars, tf);
        prop_assert_eq!(r.trend, Trend::InsufficientData);
        prop_assert_eq!(r.signal, Signal::NoSignal);
        prop_assert_eq!((r.entry, r.stop_loss, r.take_profit), (0.0, 0.0, 0.0));
        let expected = format!("({}/{} candles)", bars.len(), need);
        prop_assert!(r.error.unwrap().ends_with(&expected));
    }
}
