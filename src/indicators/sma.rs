// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================
//
// Arithmetic mean over each trailing window of `period` values.  The output is
// `period - 1` elements shorter than the input.
//
// A running sum keeps the calculation O(n) regardless of the period.
// =============================================================================

/// Compute the SMA series for `values` over `period`.
///
/// Element `i` of the result is the mean of `values[i..i + period]`.
///
/// # Edge cases
/// - `period == 0` => empty vec
/// - `values.len() < period` => empty vec
/// - A non-finite window mean truncates the series at that point.
pub fn calculate_sma(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let period_f = period as f64;
    let mut result = Vec::with_capacity(values.len() - period + 1);

    let mut sum: f64 = values[..period].iter().sum();
    for i in period..=values.len() {
        if i > period {
            sum += values[i - 1] - values[i - 1 - period];
        }
        let mean = sum / period_f;
        if !mean.is_finite() {
            break;
        }
        result.push(mean);
    }

    result
}

/// Most recent SMA value, if the series is long enough.
pub fn latest_sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    let mean = window.iter().sum::<f64>() / period as f64;
    mean.is_finite().then_some(mean)
}
