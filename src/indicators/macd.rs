// =============================================================================
// Moving Average Convergence Divergence (MACD)
// =============================================================================
//
//   macd_line = EMA(fast) - EMA(slow)
//   signal    = EMA(macd_line, signal_period)
//   histogram = macd_line - signal
//
// EMA(fast) starts `slow - fast` bars before EMA(slow), so the fast series is
// offset to line up with the slow one.  The histogram is aligned at the first
// signal value.

use serde::{Deserialize, Serialize};

use super::ema::calculate_ema;

/// Full MACD output.  `macd` starts at bar `slow - 1`; `signal` and
/// `histogram` start `signal_period - 1` values later.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MacdSeries {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

/// Most recent MACD values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdSnapshot {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Compute the MACD series.
///
/// Returns an empty [`MacdSeries`] when `fast >= slow`, any period is zero, or
/// there are too few closes for the slow EMA.  When the MACD line is shorter
/// than `signal_period`, `macd` is populated and the other two stay empty.
pub fn calculate_macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> MacdSeries {
    if fast == 0 || signal_period == 0 || fast >= slow {
        return MacdSeries::default();
    }

    let fast_ema = calculate_ema(closes, fast);
    let slow_ema = calculate_ema(closes, slow);
    if slow_ema.is_empty() {
        return MacdSeries::default();
    }

    let offset = slow - fast;
    let macd: Vec<f64> = slow_ema
        .iter()
        .enumerate()
        .map_while(|(i, s)| fast_ema.get(i + offset).map(|f| f - s))
        .collect();

    let signal = calculate_ema(&macd, signal_period);
    let start = signal_period - 1;
    let histogram: Vec<f64> = signal
        .iter()
        .zip(macd.iter().skip(start))
        .map(|(s, m)| m - s)
        .collect();

    MacdSeries {
        macd,
        signal,
        histogram,
    }
}

impl MacdSeries {
    /// Latest `(line, signal, histogram)` triple, if the signal line exists.
    pub fn latest(&self) -> Option<MacdSnapshot> {
        let histogram = *self.histogram.last()?;
        let signal = *self.signal.last()?;
        let line = *self.macd.last()?;
        Some(MacdSnapshot {
            line,
            signal,
            histogram,
        })
    }
}
