// =============================================================================
// Runtime Configuration — analysis policy and service settings
// =============================================================================
//
// `AnalysisPolicy` holds every tunable threshold the engine uses: minimum
// history per timeframe class, indicator period caps, window scaling, and the
// stop/target multiples.  `RuntimeConfig` wraps it together with the service
// settings (default symbol, timeframe set, request pacing).
//
// Persistence uses an atomic tmp + rename pattern.  All fields carry serde
// defaults so that older config files keep loading after new fields appear.
//
// =============================================================================

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::market_data::TimeframeClass;

/// Upper bound for output rounding precision.
const MAX_DECIMALS: u32 = 10;

// =============================================================================
// AnalysisPolicy
// =============================================================================

/// Tunable thresholds for a single analysis run.
///
/// Period and window values are caps: at run time each is scaled down to the
/// available history (`min(cap, n / divisor)`) so short series degrade rather
/// than fail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisPolicy {
    // --- Minimum history ----------------------------------------------------
    pub min_bars_intraday_fine: usize,
    pub min_bars_intraday_coarse: usize,
    pub min_bars_daily: usize,
    /// Per-label floors that take precedence over the class table.
    pub min_bars_overrides: BTreeMap<String, usize>,

    // --- Indicator periods --------------------------------------------------
    pub rsi_period: usize,
    pub atr_period: usize,
    /// RSI/ATR period is `min(cap, n / period_divisor)`.
    pub period_divisor: usize,
    pub sma_fast_period: usize,
    pub sma_slow_period: usize,
    /// Fast SMA period is `min(cap, n * fraction)`.
    pub sma_fast_fraction: f64,
    pub sma_slow_fraction: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,

    // --- Levels & breakout --------------------------------------------------
    pub pivot_window: usize,
    pub pivot_window_divisor: usize,
    pub retest_window: usize,
    pub retest_window_divisor: usize,
    /// Retest band half-width, percent of the breakout level.
    pub retest_tolerance_pct: f64,
    pub confirmation_lookback: usize,
    pub confirmation_lookback_divisor: usize,
    pub confirmation_multiplier: f64,
    /// Synthetic level distance when one side has no pivots, percent of price.
    pub synthetic_band_pct: f64,

    // --- Risk sizing --------------------------------------------------------
    /// ATR floor, percent of the current close.
    pub atr_floor_pct: f64,
    pub breakout_stop_atr: f64,
    /// Target distance as a multiple of the breakout stop distance.
    pub breakout_reward_ratio: f64,
    pub fallback_stop_atr: f64,
    pub fallback_target_atr: f64,
    pub rsi_buy_below: f64,
    pub rsi_sell_above: f64,

    // --- Output -------------------------------------------------------------
    pub price_decimals: u32,
    pub rsi_decimals: u32,
}

impl Default for AnalysisPolicy {
    fn default() -> Self {
        let mut overrides = BTreeMap::new();
        overrides.insert("H4".to_string(), 45);
        Self {
            min_bars_intraday_fine: 30,
            min_bars_intraday_coarse: 40,
            min_bars_daily: 50,
            min_bars_overrides: overrides,
            rsi_period: 14,
            atr_period: 14,
            period_divisor: 3,
            sma_fast_period: 20,
            sma_slow_period: 50,
            sma_fast_fraction: 0.5,
            sma_slow_fraction: 0.8,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            pivot_window: 20,
            pivot_window_divisor: 4,
            retest_window: 5,
            retest_window_divisor: 10,
            retest_tolerance_pct: 0.5,
            confirmation_lookback: 10,
            confirmation_lookback_divisor: 5,
            confirmation_multiplier: 1.5,
            synthetic_band_pct: 2.0,
            atr_floor_pct: 0.1,
            breakout_stop_atr: 1.5,
            breakout_reward_ratio: 2.0,
            fallback_stop_atr: 2.0,
            fallback_target_atr: 3.0,
            rsi_buy_below: 40.0,
            rsi_sell_above: 60.0,
            price_decimals: 5,
            rsi_decimals: 2,
        }
    }
}

impl AnalysisPolicy {
    /// Minimum number of bars required before `timeframe` is analysed.
    pub fn min_bars(&self, timeframe: &str) -> usize {
        if let Some(n) = self.min_bars_overrides.get(&timeframe.trim().to_uppercase()) {
            return *n;
        }
        match TimeframeClass::from_label(timeframe) {
            TimeframeClass::IntradayFine => self.min_bars_intraday_fine,
            TimeframeClass::IntradayCoarse => self.min_bars_intraday_coarse,
            TimeframeClass::Daily => self.min_bars_daily,
        }
    }

    /// RSI period clamped to a series of length `n`.
    pub fn rsi_period_for(&self, n: usize) -> usize {
        scaled(self.rsi_period, n, self.period_divisor)
    }

    pub fn atr_period_for(&self, n: usize) -> usize {
        scaled(self.atr_period, n, self.period_divisor)
    }

    pub fn sma_fast_for(&self, n: usize) -> usize {
        fraction(self.sma_fast_period, n, self.sma_fast_fraction)
    }

    pub fn sma_slow_for(&self, n: usize) -> usize {
        fraction(self.sma_slow_period, n, self.sma_slow_fraction)
    }

    /// MACD `(fast, slow, signal)` periods clamped so the signal line still
    /// has data on short series.
    pub fn macd_periods_for(&self, n: usize) -> (usize, usize, usize) {
        let slow = self.macd_slow.min(n / 2).max(2);
        let fast = self.macd_fast.min(slow - 1).max(1);
        let signal = self.macd_signal.min(n.saturating_sub(slow) + 1).max(1);
        (fast, slow, signal)
    }

    pub fn pivot_window_for(&self, n: usize) -> usize {
        scaled(self.pivot_window, n, self.pivot_window_divisor)
    }

    pub fn retest_window_for(&self, n: usize) -> usize {
        scaled(self.retest_window, n, self.retest_window_divisor)
    }

    pub fn confirmation_lookback_for(&self, n: usize) -> usize {
        scaled(self.confirmation_lookback, n, self.confirmation_lookback_divisor)
    }

    /// Reject policies that would produce meaningless stops or reorder the
    /// minimum-history table.
    pub fn validate(&self) -> Result<()> {
        if !(self.min_bars_intraday_fine <= self.min_bars_intraday_coarse
            && self.min_bars_intraday_coarse <= self.min_bars_daily)
        {
            anyhow::bail!(
                "minimum bars must not decrease with timeframe ({} / {} / {})",
                self.min_bars_intraday_fine,
                self.min_bars_intraday_coarse,
                self.min_bars_daily
            );
        }
        if self.min_bars_intraday_fine < 2 {
            anyhow::bail!("minimum bars must be at least 2");
        }
        // An override sits between the floors of the neighbouring classes.
        for (label, &n) in &self.min_bars_overrides {
            let class = TimeframeClass::from_label(label);
            let (lo, hi) = match class {
                TimeframeClass::IntradayFine => (2, Some(self.min_bars_intraday_coarse)),
                TimeframeClass::IntradayCoarse => {
                    (self.min_bars_intraday_fine, Some(self.min_bars_daily))
                }
                TimeframeClass::Daily => (self.min_bars_intraday_coarse, None),
            };
            if n < lo || hi.is_some_and(|hi| n > hi) {
                anyhow::bail!(
                    "min_bars_overrides[{label}] = {n} is outside the {class} range \
                     (at least {lo}{})",
                    hi.map(|hi| format!(", at most {hi}")).unwrap_or_default()
                );
            }
        }
        if self.price_decimals > MAX_DECIMALS || self.rsi_decimals > MAX_DECIMALS {
            anyhow::bail!(
                "decimals must be at most {MAX_DECIMALS} (price {}, rsi {})",
                self.price_decimals,
                self.rsi_decimals
            );
        }
        let positive = [
            ("retest_tolerance_pct", self.retest_tolerance_pct),
            ("confirmation_multiplier", self.confirmation_multiplier),
            ("synthetic_band_pct", self.synthetic_band_pct),
            ("atr_floor_pct", self.atr_floor_pct),
            ("breakout_stop_atr", self.breakout_stop_atr),
            ("breakout_reward_ratio", self.breakout_reward_ratio),
            ("fallback_stop_atr", self.fallback_stop_atr),
            ("fallback_target_atr", self.fallback_target_atr),
            ("sma_fast_fraction", self.sma_fast_fraction),
            ("sma_slow_fraction", self.sma_slow_fraction),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                anyhow::bail!("{name} must be a positive number, got {value}");
            }
        }
        let divisors = [
            self.period_divisor,
            self.pivot_window_divisor,
            self.retest_window_divisor,
            self.confirmation_lookback_divisor,
        ];
        if divisors.contains(&0) {
            anyhow::bail!("window divisors must be non-zero");
        }
        if self.rsi_buy_below >= self.rsi_sell_above {
            anyhow::bail!(
                "rsi_buy_below ({}) must be below rsi_sell_above ({})",
                self.rsi_buy_below,
                self.rsi_sell_above
            );
        }
        Ok(())
    }
}

/// `min(cap, n / divisor)`, never below 1.
fn scaled(cap: usize, n: usize, divisor: usize) -> usize {
    cap.min(n / divisor.max(1)).max(1)
}

fn fraction(cap: usize, n: usize, fraction: f64) -> usize {
    cap.min((n as f64 * fraction).floor() as usize).max(1)
}

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbol() -> String {
    "XAUUSD".to_string()
}

fn default_timeframes() -> Vec<TimeframeRequest> {
    vec![
        TimeframeRequest::new("M15", 7),
        TimeframeRequest::new("H1", 30),
        TimeframeRequest::new("H4", 90),
        TimeframeRequest::new("D1", 365),
    ]
}

fn default_request_delay_ms() -> u64 {
    100
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// One timeframe the service analyses, with how far back to fetch bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeframeRequest {
    pub name: String,
    pub lookback_days: i64,
}

impl TimeframeRequest {
    pub fn new(name: impl Into<String>, lookback_days: i64) -> Self {
        Self {
            name: name.into(),
            lookback_days,
        }
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Symbol analysed when a request does not name one.
    #[serde(default = "default_symbol")]
    pub default_symbol: String,

    /// Timeframes evaluated per analysis request, in response order.
    #[serde(default = "default_timeframes")]
    pub timeframes: Vec<TimeframeRequest>,

    /// Pause between successive provider requests, in milliseconds.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default)]
    pub policy: AnalysisPolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_symbol: default_symbol(),
            timeframes: default_timeframes(),
            request_delay_ms: default_request_delay_ms(),
            policy: AnalysisPolicy::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        config
            .policy
            .validate()
            .with_context(|| format!("invalid analysis policy in {}", path.display()))?;

        info!(
            path = %path.display(),
            default_symbol = %config.default_symbol,
            timeframes = config.timeframes.len(),
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }
}
