// =============================================================================
// Average True Range (ATR)
// =============================================================================
//
// ATR measures market volatility by decomposing the entire range of a bar.
//
// True Range (TR) for each bar after the first:
//   TR = max(H - L, |H - prevClose|, |L - prevClose|)
//
// ATR is the simple moving average of TR over `period` bars.  Stop and target
// sizing depends on ATR being strictly positive after output rounding, so
// `floored_atr` replaces a missing, non-finite, or sub-resolution reading with a
// fraction of the current close.
// =============================================================================

use super::sma::calculate_sma;

/// True Range for every bar that has a predecessor (`len - 1` values).
///
/// Returns an empty vec when the three slices differ in length or hold fewer
/// than two bars.
pub fn true_range(highs: &[f64], lows: &[f64], closes: &[f64]) -> Vec<f64> {
    let n = closes.len();
    if n < 2 || highs.len() != n || lows.len() != n {
        return Vec::new();
    }

    (1..n)
        .map(|i| {
            let prev_close = closes[i - 1];
            let hl = highs[i] - lows[i];
            let hc = (highs[i] - prev_close).abs();
            let lc = (lows[i] - prev_close).abs();
            hl.max(hc).max(lc)
        })
        .collect()
}

/// ATR series: SMA of the True Range over `period`.
///
/// # Edge cases
/// - `period == 0` => empty vec
/// - fewer than `period + 1` bars => empty vec (`period` TR values need a
///   previous close each)
pub fn calculate_atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period + 1 {
        return Vec::new();
    }
    calculate_sma(&true_range(highs, lows, closes), period)
}

/// Most recent ATR value, if the series is long enough.
pub fn latest_atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Option<f64> {
    calculate_atr(highs, lows, closes, period).last().copied()
}

/// Resolve the ATR used for risk sizing.
///
/// - `None` (series too short) falls back to 1 % of the full high/low span.
/// - A value that is non-finite or would round to zero at `decimals` places
///   is replaced by `floor_pct` percent of `close`, and never less than one
///   unit of the last reported decimal.
///
/// The result is always strictly positive and survives output rounding.
pub fn floored_atr(
    raw: Option<f64>,
    highs: &[f64],
    lows: &[f64],
    close: f64,
    floor_pct: f64,
    decimals: u32,
) -> f64 {
    let value = raw.unwrap_or_else(|| {
        let max_high = highs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min_low = lows.iter().copied().fold(f64::INFINITY, f64::min);
        (max_high - min_low) * 0.01
    });

    let resolution = 10f64.powi(-(decimals.min(300) as i32));
    if value.is_finite() && value >= resolution {
        value
    } else {
        let floor = (close * floor_pct / 100.0).abs();
        if floor.is_finite() {
            floor.max(resolution)
        } else {
            resolution
        }
    }
}
