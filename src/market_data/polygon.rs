// =============================================================================
// Polygon.io REST client — aggregates and last trade
// =============================================================================
//
// SECURITY: The API key travels as the `apiKey` query parameter.  It is never
// logged and `Debug` redacts it.
//
// Aggregates are requested oldest-first with the maximum page size; Polygon
// returns a `next_url` when a window spans more than one page, which is
// followed until exhausted.  429 and 5xx responses are retried with
// exponential backoff.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::bar::Bar;
use super::source::MarketDataSource;

const DEFAULT_BASE_URL: &str = "https://api.polygon.io";

/// Attempts per request, including the first.
const MAX_ATTEMPTS: u32 = 3;
/// Backoff before the second attempt; doubled for each subsequent one.
const BASE_BACKOFF_MS: u64 = 500;
/// Upper bound on pages followed for one aggregates request.
const MAX_PAGES: usize = 50;

#[derive(Clone)]
pub struct PolygonClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl PolygonClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("failed to build HTTP client")?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        debug!(base_url = %base_url, "PolygonClient initialised");

        Ok(Self {
            api_key: api_key.into(),
            base_url,
            client,
        })
    }

    // -------------------------------------------------------------------------
    // Aggregates
    // -------------------------------------------------------------------------

    /// GET /v2/aggs/ticker/{ticker}/range/{multiplier}/{timespan}/{from}/{to}
    #[instrument(skip(self, from, to), name = "polygon::get_aggregates")]
    pub async fn get_aggregates(
        &self,
        symbol: &str,
        timeframe: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Bar>> {
        let ticker = polygon_ticker(symbol);
        let (multiplier, timespan) = polygon_timespan(timeframe);
        let url = format!(
            "{}/v2/aggs/ticker/{}/range/{}/{}/{}/{}",
            self.base_url,
            ticker,
            multiplier,
            timespan,
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d"),
        );

        let mut bars = Vec::new();
        let mut next = Some(url);
        let mut pages = 0;

        while let Some(url) = next.take() {
            let query: &[(&str, &str)] = if pages == 0 {
                &[("adjusted", "true"), ("sort", "asc"), ("limit", "50000")]
            } else {
                // `next_url` already carries the initial query.
                &[]
            };
            let body = self.get_json(&url, query).await?;
            let page = parse_aggregates(&body)?;
            bars.extend(page.bars);
            pages += 1;

            match page.next_url {
                Some(u) if pages < MAX_PAGES => next = Some(u),
                Some(_) => warn!(symbol, timeframe, pages, "pagination limit reached"),
                None => {}
            }
        }

        if bars.is_empty() {
            warn!(symbol, timeframe, "no aggregates returned");
        } else {
            debug!(symbol, timeframe, count = bars.len(), pages, "aggregates fetched");
        }
        Ok(bars)
    }

    // -------------------------------------------------------------------------
    // Last trade
    // -------------------------------------------------------------------------

    /// GET /v2/last/trade/{ticker}, falling back to the close of the latest
    /// one-minute bar of the past 24 hours.
    #[instrument(skip(self), name = "polygon::get_last_price")]
    pub async fn get_last_price(&self, symbol: &str) -> Result<Option<f64>> {
        let url = format!("{}/v2/last/trade/{}", self.base_url, polygon_ticker(symbol));
        let body = self.get_json(&url, &[]).await?;

        if let Some(price) = parse_last_trade(&body) {
            debug!(symbol, price, "last trade retrieved");
            return Ok(Some(price));
        }

        debug!(symbol, "no last trade; falling back to minute aggregates");
        let now = Utc::now();
        let bars = self
            .get_aggregates(symbol, "M1", now - chrono::Duration::hours(24), now)
            .await?;
        Ok(bars.last().map(|b| b.close))
    }

    // -------------------------------------------------------------------------
    // Transport
    // -------------------------------------------------------------------------

    async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value> {
        let mut attempt = 1;
        loop {
            let resp = self
                .client
                .get(url)
                .query(query)
                .query(&[("apiKey", self.api_key.as_str())])
                .send()
                .await;

            let retry_reason = match resp {
                Ok(resp) if resp.status().is_success() => {
                    return resp
                        .json()
                        .await
                        .with_context(|| format!("failed to parse response from {url}"));
                }
                Ok(resp) if is_retryable(resp.status()) => format!("status {}", resp.status()),
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    anyhow::bail!("Polygon GET {url} returned {status}: {text}");
                }
                // Strip the URL: it carries the API key.
                Err(e) if e.is_timeout() || e.is_connect() => e.without_url().to_string(),
                Err(e) => {
                    return Err(anyhow::Error::new(e.without_url()).context(format!("GET {url} request failed")))
                }
            };

            if attempt >= MAX_ATTEMPTS {
                anyhow::bail!("Polygon GET {url} failed after {attempt} attempts: {retry_reason}");
            }

            let backoff = BASE_BACKOFF_MS * 2u64.pow(attempt - 1);
            warn!(url, attempt, backoff_ms = backoff, reason = %retry_reason, "retrying Polygon request");
            tokio::time::sleep(Duration::from_millis(backoff)).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl MarketDataSource for PolygonClient {
    fn name(&self) -> &str {
        "Polygon.io"
    }

    async fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Bar>> {
        self.get_aggregates(symbol, timeframe, from, to).await
    }

    async fn last_price(&self, symbol: &str) -> Result<Option<f64>> {
        self.get_last_price(symbol).await
    }
}

impl std::fmt::Debug for PolygonClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolygonClient")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

// =============================================================================
// Mapping and parsing helpers
// =============================================================================

/// Polygon ticker for a trading symbol.
///
/// Bare symbols are treated as currency pairs (`XAUUSD` → `C:XAUUSD`).  A
/// symbol that already carries a market prefix (`X:BTCUSD`, `I:SPX`) is
/// passed through.
pub fn polygon_ticker(symbol: &str) -> String {
    let upper = symbol.trim().to_uppercase();
    if upper.contains(':') {
        upper
    } else {
        format!("C:{upper}")
    }
}

/// `(multiplier, timespan)` for a timeframe label.  Unknown labels map to one
/// hour.
pub fn polygon_timespan(timeframe: &str) -> (u32, &'static str) {
    match timeframe.to_uppercase().as_str() {
        "M1" => (1, "minute"),
        "M5" => (5, "minute"),
        "M15" => (15, "minute"),
        "M30" => (30, "minute"),
        "H1" => (1, "hour"),
        "H4" => (4, "hour"),
        "D1" => (1, "day"),
        "W1" => (1, "week"),
        _ => (1, "hour"),
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// One page of an aggregates response.
#[derive(Debug, Default)]
pub struct AggregatesPage {
    pub bars: Vec<Bar>,
    pub next_url: Option<String>,
}

/// Parse an aggregates body.  A non-`OK`/`DELAYED` status or a missing
/// `results` array is an empty page, not an error.
pub fn parse_aggregates(body: &Value) -> Result<AggregatesPage> {
    let status = body["status"].as_str().unwrap_or_default();
    if status != "OK" && status != "DELAYED" {
        warn!(status, "aggregates response not OK");
        return Ok(AggregatesPage::default());
    }

    let Some(results) = body["results"].as_array() else {
        return Ok(AggregatesPage::default());
    };

    let bars = results
        .iter()
        .enumerate()
        .map(|(i, r)| parse_aggregate(r).with_context(|| format!("malformed aggregate at index {i}")))
        .collect::<Result<Vec<_>>>()?;

    Ok(AggregatesPage {
        bars,
        next_url: body["next_url"].as_str().map(str::to_string),
    })
}

fn parse_aggregate(r: &Value) -> Result<Bar> {
    let field = |name: &str| -> Result<f64> {
        r[name]
            .as_f64()
            .with_context(|| format!("field '{name}' missing or not numeric"))
    };
    let millis = r["t"].as_i64().context("field 't' missing or not an integer")?;
    let timestamp = Utc
        .timestamp_millis_opt(millis)
        .single()
        .with_context(|| format!("timestamp {millis} out of range"))?;

    Ok(Bar::new(
        timestamp,
        field("o")?,
        field("h")?,
        field("l")?,
        field("c")?,
        r["v"].as_f64().unwrap_or(0.0),
    ))
}

/// Price of the last trade, if the body carries one.
pub fn parse_last_trade(body: &Value) -> Option<f64> {
    if body["status"].as_str() != Some("OK") {
        return None;
    }
    body["results"]["p"].as_f64().filter(|p| p.is_finite())
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ticker_mapping() {
        assert_eq!(polygon_ticker("xauusd"), "C:XAUUSD");
        assert_eq!(polygon_ticker("EURUSD"), "C:EURUSD");
        assert_eq!(polygon_ticker(" seknok "), "C:SEKNOK");
        assert_eq!(polygon_ticker("x:btcusd"), "X:BTCUSD");
        assert_eq!(polygon_ticker("C:EURUSD"), "C:EURUSD");
    }

    #[test]
    fn timespan_mapping() {
        assert_eq!(polygon_timespan("M15"), (15, "minute"));
        assert_eq!(polygon_timespan("h4"), (4, "hour"));
        assert_eq!(polygon_timespan("D1"), (1, "day"));
        assert_eq!(polygon_timespan("W1"), (1, "week"));
        assert_eq!(polygon_timespan("X9"), (1, "hour"));
    }

    #[test]
    fn parses_aggregate_page() {
        let body = json!({
            "status": "OK",
            "results": [
                {"t": 1_700_000_000_000_i64, "o": 1.0, "h": 2.0, "l": 0.5, "c": 1.5, "v": 10.0},
                {"t": 1_700_000_060_000_i64, "o": 1.5, "h": 1.6, "l": 1.4, "c": 1.45}
            ],
            "next_url": "https://api.polygon.io/v2/aggs/next?cursor=abc"
        });
        let page = parse_aggregates(&body).unwrap();
        assert_eq!(page.bars.len(), 2);
        assert_eq!(page.bars[0].high, 2.0);
        assert_eq!(page.bars[1].volume, 0.0);
        assert_eq!(page.bars[0].timestamp.timestamp_millis(), 1_700_000_000_000);
        assert!(page.next_url.unwrap().contains("cursor=abc"));
    }

    #[test]
    fn non_ok_status_is_empty() {
        let page = parse_aggregates(&json!({"status": "ERROR", "error": "bad key"})).unwrap();
        assert!(page.bars.is_empty());
        assert!(page.next_url.is_none());

        let page = parse_aggregates(&json!({"status": "OK", "resultsCount": 0})).unwrap();
        assert!(page.bars.is_empty());
    }

    #[test]
    fn malformed_aggregate_is_error() {
        let body = json!({"status": "OK", "results": [{"t": 1, "o": 1.0, "h": "x", "l": 0.5, "c": 1.0}]});
        assert!(parse_aggregates(&body).is_err());
    }

    #[test]
    fn last_trade_parsing() {
        assert_eq!(parse_last_trade(&json!({"status": "OK", "results": {"p": 2034.5}})), Some(2034.5));
        assert_eq!(parse_last_trade(&json!({"status": "NOT_FOUND"})), None);
        assert_eq!(parse_last_trade(&json!({"status": "OK"})), None);
    }

    #[test]
    fn debug_redacts_key() {
        let client = PolygonClient::new("super-secret").unwrap();
        let rendered = format!("{client:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
