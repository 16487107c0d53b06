// =============================================================================
// Shared types used across the signal engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// Trend classification derived from the ordering of close vs. SMA fast/slow.
///
/// `InsufficientData` and `Error` are sentinels used only by rejected
/// analyses so the output record keeps one shape for every outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Uptrend,
    Downtrend,
    Sideways,
    #[serde(rename = "Insufficient Data")]
    InsufficientData,
    Error,
}

impl Default for Trend {
    fn default() -> Self {
        Self::Sideways
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uptrend => write!(f, "Uptrend"),
            Self::Downtrend => write!(f, "Downtrend"),
            Self::Sideways => write!(f, "Sideways"),
            Self::InsufficientData => write!(f, "Insufficient Data"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// Discrete trade signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
    Hold,
    #[serde(rename = "No Signal")]
    NoSignal,
    Error,
}

impl Default for Signal {
    fn default() -> Self {
        Self::Hold
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
            Self::Hold => write!(f, "Hold"),
            Self::NoSignal => write!(f, "No Signal"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// Side of a level that price has crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakoutDirection {
    #[serde(rename = "UP")]
    Up,
    #[serde(rename = "DOWN")]
    Down,
}

impl std::fmt::Display for BreakoutDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up => write!(f, "UP"),
            Self::Down => write!(f, "DOWN"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_labels_match_display() {
        assert_eq!(
            serde_json::to_string(&Trend::InsufficientData).unwrap(),
            "\"Insufficient Data\""
        );
        assert_eq!(serde_json::to_string(&Signal::NoSignal).unwrap(), "\"No Signal\"");
        assert_eq!(serde_json::to_string(&Signal::Buy).unwrap(), "\"BUY\"");
        assert_eq!(serde_json::to_string(&BreakoutDirection::Down).unwrap(), "\"DOWN\"");
        assert_eq!(Trend::InsufficientData.to_string(), "Insufficient Data");
        assert_eq!(Signal::Hold.to_string(), "Hold");
    }
}
