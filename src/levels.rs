// =============================================================================
// Significant Level Detector — pivot highs / lows
// =============================================================================
//
// A bar's high is a pivot high when it equals the maximum of the symmetric
// window [i - w, i + w]; a pivot low is the mirror image on lows.  Only bars
// with `w` neighbours on both sides qualify, so the newest `w` bars can never
// form a level.
//
// All pivots are merged into one ascending, de-duplicated set.  O(n * w),
// which is fine for the few thousand bars a request retrieves.

/// Sorted, de-duplicated pivot price levels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelSet {
    levels: Vec<f64>,
}

/// Nearest level on each side of a reference price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestLevels {
    pub resistance: f64,
    pub support: f64,
    /// `true` when the resistance side came from the synthetic band.
    pub synthetic_resistance: bool,
    pub synthetic_support: bool,
}

/// Detect pivot levels over `highs` / `lows` with window radius `window`.
///
/// Returns an empty set when `window == 0`, the slices differ in length, or
/// the series is too short to hold a single full window (`n <= 2 * window`).
pub fn find_significant_levels(highs: &[f64], lows: &[f64], window: usize) -> LevelSet {
    let n = highs.len();
    if window == 0 || lows.len() != n || n <= 2 * window {
        return LevelSet::default();
    }

    let mut levels = Vec::new();
    for i in window..n - window {
        let span = i - window..=i + window;

        let max_high = highs[span.clone()].iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if highs[i] == max_high {
            levels.push(highs[i]);
        }

        let min_low = lows[span].iter().copied().fold(f64::INFINITY, f64::min);
        if lows[i] == min_low {
            levels.push(lows[i]);
        }
    }

    LevelSet::from_levels(levels)
}

impl LevelSet {
    /// Build a set from arbitrary prices: non-finite values are dropped, the
    /// rest sorted ascending and de-duplicated.
    pub fn from_levels(mut levels: Vec<f64>) -> Self {
        levels.retain(|l| l.is_finite());
        levels.sort_by(f64::total_cmp);
        levels.dedup();
        Self { levels }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Nearest level strictly above and strictly below `price`.
    ///
    /// A missing side is replaced by a synthetic level `band_pct` percent away
    /// from `price`.
    pub fn nearest(&self, price: f64, band_pct: f64) -> NearestLevels {
        let split = self.levels.partition_point(|l| *l <= price);
        let above = self.levels.get(split).copied();
        let below_end = self.levels.partition_point(|l| *l < price);
        let below = below_end.checked_sub(1).map(|i| self.levels[i]);

        let band = band_pct / 100.0;
        NearestLevels {
            resistance: above.unwrap_or(price * (1.0 + band)),
            support: below.unwrap_or(price * (1.0 - band)),
            synthetic_resistance: above.is_none(),
            synthetic_support: below.is_none(),
        }
    }
}
