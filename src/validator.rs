// =============================================================================
// Input Validator — rejects malformed or insufficient bar series
// =============================================================================
//
// Runs before any indicator math.  Two failure classes:
//
//   InsufficientData — fewer bars than the timeframe's policy floor.
//   InvalidInput     — not a sequence, non-numeric fields, a bar breaking the
//                      OHLC invariants, or timestamps going backwards.
//
// The length floor is checked first, so a short series is always reported as
// insufficient regardless of its contents.
// =============================================================================

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::error::EngineError;
use crate::market_data::Bar;
use crate::runtime_config::AnalysisPolicy;

/// Validate `bars` for `timeframe`, returning the series unchanged on success.
pub fn validate<'a>(
    bars: &'a [Bar],
    timeframe: &str,
    policy: &AnalysisPolicy,
) -> Result<&'a [Bar], EngineError> {
    let need = policy.min_bars(timeframe);
    if bars.len() < need {
        return Err(EngineError::InsufficientData {
            timeframe: timeframe.to_string(),
            got: bars.len(),
            need,
        });
    }

    for (i, bar) in bars.iter().enumerate() {
        check_bar(bar).map_err(|detail| EngineError::invalid(timeframe, format!("bar {i}: {detail}")))?;
    }

    if let Some(i) = bars.windows(2).position(|w| w[1].timestamp < w[0].timestamp) {
        return Err(EngineError::invalid(
            timeframe,
            format!("bar {}: timestamp precedes the previous bar", i + 1),
        ));
    }

    Ok(bars)
}

/// Check the per-bar OHLC invariants.
fn check_bar(bar: &Bar) -> Result<(), String> {
    let fields = [
        ("open", bar.open),
        ("high", bar.high),
        ("low", bar.low),
        ("close", bar.close),
        ("volume", bar.volume),
    ];
    for (name, value) in fields {
        if !value.is_finite() {
            return Err(format!("{name} is not a finite number"));
        }
    }
    if bar.high < bar.low {
        return Err(format!("high {} < low {}", bar.high, bar.low));
    }
    if bar.close <= 0.0 {
        return Err(format!("non-positive close {}", bar.close));
    }
    if bar.high < bar.open.max(bar.close) {
        return Err(format!("high {} below open/close", bar.high));
    }
    if bar.low > bar.open.min(bar.close) {
        return Err(format!("low {} above open/close", bar.low));
    }
    if bar.volume < 0.0 {
        return Err(format!("negative volume {}", bar.volume));
    }
    Ok(())
}

// =============================================================================
// Raw JSON parsing
// =============================================================================

/// Parse an untyped JSON payload into bars.
///
/// Accepts `{timestamp, open, high, low, close, volume?}` objects where
/// `timestamp` is an RFC 3339 string or epoch milliseconds.  Anything else is
/// reported as `InvalidInput`; OHLC invariants are left to [`validate`].
pub fn parse_bars(value: &Value, timeframe: &str) -> Result<Vec<Bar>, EngineError> {
    let items = match value {
        Value::Null => return Err(EngineError::invalid(timeframe, "candles data is missing")),
        Value::Array(items) => items,
        other => {
            return Err(EngineError::invalid(
                timeframe,
                format!("expected an array of candles, got {}", json_kind(other)),
            ))
        }
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            parse_bar(item).map_err(|detail| EngineError::invalid(timeframe, format!("bar {i}: {detail}")))
        })
        .collect()
}

fn parse_bar(item: &Value) -> Result<Bar, String> {
    let obj = item
        .as_object()
        .ok_or_else(|| format!("expected an object, got {}", json_kind(item)))?;

    let number = |name: &str| -> Result<f64, String> {
        obj.get(name)
            .and_then(Value::as_f64)
            .ok_or_else(|| format!("{name} is missing or not numeric"))
    };

    let timestamp = parse_timestamp(obj.get("timestamp"))?;
    let volume = match obj.get("volume") {
        None | Some(Value::Null) => 0.0,
        Some(v) => v.as_f64().ok_or("volume is not numeric")?,
    };

    Ok(Bar::new(
        timestamp,
        number("open")?,
        number("high")?,
        number("low")?,
        number("close")?,
        volume,
    ))
}

fn parse_timestamp(value: Option<&Value>) -> Result<DateTime<Utc>, String> {
    match value {
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| format!("timestamp '{s}' is not RFC 3339: {e}")),
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .ok_or_else(|| format!("timestamp {n} is not a valid epoch-millisecond value")),
        _ => Err("timestamp is missing".to_string()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
