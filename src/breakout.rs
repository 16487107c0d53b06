// =============================================================================
// Breakout Classifier — level cross, retest, and confirmation gates
// =============================================================================
//
// A crossing bar is one whose close lies beyond the nearest level on either
// side of the PREVIOUS bar's close (synthetic ±band when a side is empty):
//
//   UP   — close > nearest resistance
//   DOWN — close < nearest support
//
// The most recent crossing bar within the retest window is the breakout
// candidate.  A close back through the level is itself a newer crossing, so
// the candidate is never a level price has already fallen back through.
// A breakout is confirmed only when BOTH gates pass:
//
//   1. Retest: a close AFTER the crossing bar sits within ±tolerance of the
//      level.  The crossing bar never retests itself, so a breakout on the
//      latest bar is always unconfirmed.
//   2. Confirmation: the current bar's range, or its volume when the series
//      carries volume, exceeds `multiplier` × the recent average.
//
// The retest is a hard gate.  A large candle without a retest never confirms.
// =============================================================================

use crate::levels::{LevelSet, NearestLevels};
use crate::market_data::SeriesColumns;
use crate::runtime_config::AnalysisPolicy;
use crate::types::BreakoutDirection;

/// The latest level crossed within the retest window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakoutEvent {
    pub level: f64,
    pub direction: BreakoutDirection,
    /// Index of the bar whose close crossed the level.
    pub crossed_at: usize,
    pub retested: bool,
    pub large_range: bool,
    pub high_volume: bool,
    pub confirmed: bool,
}

/// Everything the classifier derived for the current bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakoutAssessment {
    /// Levels around the close preceding the crossing bar, or around the
    /// previous close when nothing crossed.
    pub nearest: NearestLevels,
    pub event: Option<BreakoutEvent>,
}

impl BreakoutAssessment {
    pub fn confirmed(&self) -> bool {
        self.event.is_some_and(|e| e.confirmed)
    }
}

/// Classify the latest bar of `cols` against `levels`.
///
/// Returns `None` for series with fewer than two bars.
pub fn classify(
    cols: &SeriesColumns,
    levels: &LevelSet,
    policy: &AnalysisPolicy,
) -> Option<BreakoutAssessment> {
    let n = cols.len();
    if n < 2 {
        return None;
    }

    let band = policy.synthetic_band_pct;

    let Some((index, nearest, level, direction)) = latest_crossing(cols, levels, policy) else {
        return Some(BreakoutAssessment {
            nearest: levels.nearest(cols.closes[n - 2], band),
            event: None,
        });
    };

    let retested = has_retest(&cols.closes[index + 1..], level, policy.retest_tolerance_pct);
    let lookback = policy.confirmation_lookback_for(n);
    let large_range = is_large_range(cols, lookback, policy.confirmation_multiplier);
    let high_volume = is_high_volume(cols, lookback, policy.confirmation_multiplier);

    Some(BreakoutAssessment {
        nearest,
        event: Some(BreakoutEvent {
            level,
            direction,
            crossed_at: index,
            retested,
            large_range,
            high_volume,
            confirmed: retested && (large_range || high_volume),
        }),
    })
}

/// Most recent bar within the retest window whose close crossed a level,
/// with the levels it was measured against.
fn latest_crossing(
    cols: &SeriesColumns,
    levels: &LevelSet,
    policy: &AnalysisPolicy,
) -> Option<(usize, NearestLevels, f64, BreakoutDirection)> {
    let n = cols.len();
    let window = policy.retest_window_for(n);
    let first = n.saturating_sub(window + 1).max(1);

    (first..n).rev().find_map(|i| {
        let nearest = levels.nearest(cols.closes[i - 1], policy.synthetic_band_pct);
        let close = cols.closes[i];
        if close > nearest.resistance {
            Some((i, nearest, nearest.resistance, BreakoutDirection::Up))
        } else if close < nearest.support {
            Some((i, nearest, nearest.support, BreakoutDirection::Down))
        } else {
            None
        }
    })
}

/// `true` when any of `closes` lies within `tolerance_pct` percent of `level`.
///
/// Callers pass only the closes after the crossing bar.
pub fn has_retest(closes: &[f64], level: f64, tolerance_pct: f64) -> bool {
    let tol = tolerance_pct / 100.0;
    let (lo, hi) = (level * (1.0 - tol), level * (1.0 + tol));
    closes.iter().any(|c| (lo..=hi).contains(c))
}

/// Current bar range versus the average range of the last `lookback` bars
/// (current bar included).
pub fn is_large_range(cols: &SeriesColumns, lookback: usize, multiplier: f64) -> bool {
    let n = cols.len();
    if n == 0 || lookback == 0 {
        return false;
    }
    let start = n.saturating_sub(lookback);
    let ranges: Vec<f64> = (start..n).map(|i| cols.highs[i] - cols.lows[i]).collect();
    let avg = mean(&ranges);
    let current = cols.highs[n - 1] - cols.lows[n - 1];
    avg.is_finite() && current > avg * multiplier
}

/// Current volume versus the average volume of the last `lookback` bars.
///
/// Always `false` when the current bar has no volume.
pub fn is_high_volume(cols: &SeriesColumns, lookback: usize, multiplier: f64) -> bool {
    let Some(&current) = cols.volumes.last() else {
        return false;
    };
    if current <= 0.0 || lookback == 0 {
        return false;
    }
    let avg = mean(tail(&cols.volumes, lookback));
    avg > 0.0 && current > avg * multiplier
}

fn tail(values: &[f64], count: usize) -> &[f64] {
    &values[values.len().saturating_sub(count)..]
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build columns from `(high, low, close, volume)` tuples.
    fn cols(bars: &[(f64, f64, f64, f64)]) -> SeriesColumns {
        SeriesColumns {
            highs: bars.iter().map(|b| b.0).collect(),
            lows: bars.iter().map(|b| b.1).collect(),
            closes: bars.iter().map(|b| b.2).collect(),
            volumes: bars.iter().map(|b| b.3).collect(),
        }
    }

    /// 40 quiet bars around 99.8 followed by the given bars.
    fn base_with(tail: &[(f64, f64, f64, f64)]) -> SeriesColumns {
        let mut bars = vec![(100.0, 99.6, 99.8, 100.0); 40];
        bars.extend_from_slice(tail);
        cols(&bars)
    }

    fn base_with_last(last: (f64, f64, f64, f64)) -> SeriesColumns {
        base_with(&[last])
    }

    #[test]
    fn single_bar_is_not_classified() {
        let c = cols(&[(1.0, 0.5, 0.8, 0.0)]);
        assert!(classify(&c, &LevelSet::default(), &AnalysisPolicy::default()).is_none());
    }

    #[test]
    fn no_cross_means_no_event() {
        let c = base_with_last((100.0, 99.6, 99.9, 100.0));
        let levels = LevelSet::from_levels(vec![99.0, 100.5]);
        let a = classify(&c, &levels, &AnalysisPolicy::default()).unwrap();
        assert!(a.event.is_none());
        assert!(!a.confirmed());
        assert_eq!(a.nearest.resistance, 100.5);
    }

    #[test]
    fn retested_large_bar_confirms_up_breakout() {
        // Cross at 100.5, pull back to 100.2 (within 0.5 % of 100.0), then a
        // wide bar away from the level.
        let c = base_with(&[
            (100.6, 99.8, 100.5, 100.0),
            (100.5, 100.0, 100.2, 100.0),
            (102.0, 100.1, 101.5, 100.0),
        ]);
        let levels = LevelSet::from_levels(vec![98.0, 100.0]);
        let a = classify(&c, &levels, &AnalysisPolicy::default()).unwrap();
        let e = a.event.unwrap();
        assert_eq!(e.direction, BreakoutDirection::Up);
        assert_eq!(e.level, 100.0);
        assert_eq!(e.crossed_at, 40);
        assert!(e.retested);
        assert!(e.large_range);
        assert!(!e.high_volume);
        assert!(e.confirmed);
    }

    #[test]
    fn high_volume_alone_confirms_after_retest() {
        let c = base_with(&[
            (100.6, 99.8, 100.5, 100.0),
            (100.4, 100.0, 100.3, 1_000.0),
        ]);
        let levels = LevelSet::from_levels(vec![100.0]);
        let e = classify(&c, &levels, &AnalysisPolicy::default()).unwrap().event.unwrap();
        assert_eq!(e.crossed_at, 40);
        assert!(e.retested);
        assert!(!e.large_range);
        assert!(e.high_volume);
        assert!(e.confirmed);
    }

    #[test]
    fn single_gap_bar_never_retests_itself() {
        // One bar jumps from 95 to just past the level: its own close sits in
        // the tolerance band but no later close exists.
        let mut bars = vec![(95.1, 94.9, 95.0, 100.0); 40];
        bars.push((100.4, 95.0, 100.3, 5_000.0));
        let c = cols(&bars);
        let levels = LevelSet::from_levels(vec![100.0]);
        let e = classify(&c, &levels, &AnalysisPolicy::default()).unwrap().event.unwrap();
        assert_eq!(e.direction, BreakoutDirection::Up);
        assert_eq!(e.crossed_at, 40);
        assert!(e.large_range && e.high_volume);
        assert!(!e.retested);
        assert!(!e.confirmed);
    }

    #[test]
    fn large_bar_without_retest_is_not_confirmed() {
        // Crossed, then ran away without returning to the level.
        let c = base_with(&[
            (103.0, 99.8, 102.5, 100.0),
            (104.0, 102.5, 103.8, 100.0),
            (109.0, 103.7, 108.5, 5_000.0),
        ]);
        let levels = LevelSet::from_levels(vec![100.0]);
        let a = classify(&c, &levels, &AnalysisPolicy::default()).unwrap();
        // Later bars cross synthetic bands; the latest crossing has no retest.
        let e = a.event.unwrap();
        assert_eq!(e.direction, BreakoutDirection::Up);
        assert!(e.large_range && e.high_volume);
        assert!(!e.retested);
        assert!(!e.confirmed);
    }

    #[test]
    fn reversal_through_level_is_the_latest_crossing() {
        // Crossed above 100.0, then closed back under it: the down move is
        // the newer crossing and has not been retested.
        let c = base_with(&[(100.6, 99.8, 100.5, 100.0), (100.5, 99.7, 99.9, 100.0)]);
        let levels = LevelSet::from_levels(vec![98.0, 100.0]);
        let e = classify(&c, &levels, &AnalysisPolicy::default()).unwrap().event.unwrap();
        assert_eq!(e.direction, BreakoutDirection::Down);
        assert_eq!(e.crossed_at, 41);
        assert!(!e.retested);
        assert!(!e.confirmed);
    }

    #[test]
    fn down_breakout_through_support() {
        let mut bars = vec![(100.2, 99.9, 100.1, 0.0); 40];
        bars.push((100.1, 99.5, 99.6, 0.0));
        bars.push((99.9, 99.6, 99.8, 0.0));
        bars.push((99.8, 97.5, 98.0, 0.0));
        let c = cols(&bars);
        let levels = LevelSet::from_levels(vec![100.0, 103.0]);
        let e = classify(&c, &levels, &AnalysisPolicy::default()).unwrap().event.unwrap();
        assert_eq!(e.direction, BreakoutDirection::Down);
        assert_eq!(e.level, 100.0);
        assert_eq!(e.crossed_at, 40);
        assert!(e.retested);
        assert!(e.large_range);
        assert!(!e.high_volume);
        assert!(e.confirmed);
    }

    #[test]
    fn retest_band_is_inclusive() {
        assert!(has_retest(&[100.4], 100.0, 0.5));
        assert!(has_retest(&[99.6], 100.0, 0.5));
        assert!(!has_retest(&[100.6, 99.4], 100.0, 0.5));
        assert!(!has_retest(&[], 100.0, 0.5));
    }

    #[test]
    fn synthetic_band_applies_without_levels() {
        let c = base_with_last((100.0, 99.6, 99.8, 100.0));
        let a = classify(&c, &LevelSet::default(), &AnalysisPolicy::default()).unwrap();
        assert!(a.nearest.synthetic_resistance && a.nearest.synthetic_support);
        assert!((a.nearest.resistance - 99.8 * 1.02).abs() < 1e-9);
        assert!(a.event.is_none());
    }

    #[test]
    fn zero_volume_never_counts_as_high_volume() {
        let c = cols(&[(1.0, 0.5, 0.8, 0.0); 10]);
        assert!(!is_high_volume(&c, 10, 1.5));
    }
}
