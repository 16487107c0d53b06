use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single OHLCV bar as delivered by the market-data collaborator.
///
/// Bars are never mutated by the engine once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Zero when the provider has no volume for the instrument (most FX).
    #[serde(default)]
    pub volume: f64,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// High minus low.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Column-oriented view of a bar series, extracted once per analysis so the
/// indicator functions can work on plain `&[f64]` slices.
#[derive(Debug, Clone, Default)]
pub struct SeriesColumns {
    pub closes: Vec<f64>,
    pub highs: Vec<f64>,
    pub lows: Vec<f64>,
    pub volumes: Vec<f64>,
}

impl SeriesColumns {
    pub fn from_bars(bars: &[Bar]) -> Self {
        let mut cols = Self {
            closes: Vec::with_capacity(bars.len()),
            highs: Vec::with_capacity(bars.len()),
            lows: Vec::with_capacity(bars.len()),
            volumes: Vec::with_capacity(bars.len()),
        };
        for b in bars {
            cols.closes.push(b.close);
            cols.highs.push(b.high);
            cols.lows.push(b.low);
            cols.volumes.push(b.volume);
        }
        cols
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    /// `true` when at least one bar carries a non-zero volume.
    pub fn has_volume(&self) -> bool {
        self.volumes.iter().any(|v| *v > 0.0)
    }
}

// ---------------------------------------------------------------------------
// Timeframe classes
// ---------------------------------------------------------------------------

/// Coarse grouping of timeframe labels used by the minimum-history policy.
///
/// Finer timeframes need fewer bars before their averages stabilise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TimeframeClass {
    IntradayFine,
    IntradayCoarse,
    Daily,
}

impl TimeframeClass {
    /// Classify a timeframe label (`M15`, `H1`, `D1`, ...).
    ///
    /// Unknown labels fall into `Daily`, the most demanding class.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_uppercase().as_str() {
            "M1" | "M5" | "M15" | "M30" => Self::IntradayFine,
            "H1" | "H2" | "H4" | "H6" | "H8" | "H12" => Self::IntradayCoarse,
            _ => Self::Daily,
        }
    }
}

impl std::fmt::Display for TimeframeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IntradayFine => write!(f, "intraday-fine"),
            Self::IntradayCoarse => write!(f, "intraday-coarse"),
            Self::Daily => write!(f, "daily+"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(high: f64, low: f64, close: f64, volume: f64) -> Bar {
        Bar::new(Utc::now(), close, high, low, close, volume)
    }

    #[test]
    fn columns_follow_bar_order() {
        let bars = vec![bar(2.0, 1.0, 1.5, 0.0), bar(3.0, 2.0, 2.5, 10.0)];
        let cols = SeriesColumns::from_bars(&bars);
        assert_eq!(cols.len(), 2);
        assert_eq!(cols.closes, vec![1.5, 2.5]);
        assert_eq!(cols.highs, vec![2.0, 3.0]);
        assert_eq!(cols.lows, vec![1.0, 2.0]);
        assert!(cols.has_volume());
    }

    #[test]
    fn zero_volume_series_has_no_volume() {
        let bars = vec![bar(2.0, 1.0, 1.5, 0.0); 5];
        assert!(!SeriesColumns::from_bars(&bars).has_volume());
    }

    #[test]
    fn timeframe_classes() {
        assert_eq!(TimeframeClass::from_label("m15"), TimeframeClass::IntradayFine);
        assert_eq!(TimeframeClass::from_label("H4"), TimeframeClass::IntradayCoarse);
        assert_eq!(TimeframeClass::from_label("D1"), TimeframeClass::Daily);
        assert_eq!(TimeframeClass::from_label("UNKNOWN"), TimeframeClass::Daily);
        assert!(TimeframeClass::IntradayFine < TimeframeClass::Daily);
    }

    #[test]
    fn bar_deserialises_without_volume() {
        let json = r#"{"timestamp":"2024-01-02T00:00:00Z","open":1.0,"high":2.0,"low":0.5,"close":1.5}"#;
        let b: Bar = serde_json::from_str(json).unwrap();
        assert_eq!(b.volume, 0.0);
        assert!((b.range() - 1.5).abs() < 1e-12);
    }
}
