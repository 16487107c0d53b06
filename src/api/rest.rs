// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
//   GET  /                 service banner
//   GET  /health           liveness + recent errors
//   POST /analysis         fetch and analyse every configured timeframe
//   POST /analysis/bars    analyse caller-supplied bars
//   GET  /price/:symbol    last traded price
//   GET  /config           current runtime config
//   POST /config/policy    replace the analysis policy
//
// Analysis endpoints always answer 200 with per-timeframe records; failures
// are carried inside the records, never as HTTP errors.  CORS is permissive.
// =============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::AnalysisResult;
use crate::app_state::{AppState, ErrorRecord};
use crate::runtime_config::AnalysisPolicy;

// =============================================================================
// Router construction
// =============================================================================

/// Build the REST router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(banner))
        .route("/health", get(health))
        .route("/analysis", post(analyze_symbol))
        .route("/analysis/bars", post(analyze_bars))
        .route("/price/:symbol", get(price))
        .route("/config", get(get_config))
        .route("/config/policy", post(set_policy))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Banner & health
// =============================================================================

async fn banner(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "ta-signal-engine",
        "version": env!("CARGO_PKG_VERSION"),
        "data_provider": state.source.name(),
        "endpoints": {
            "health": "GET /health",
            "analysis": "POST /analysis",
            "analysis_bars": "POST /analysis/bars",
            "price": "GET /price/:symbol",
            "config": "GET /config",
            "config_policy": "POST /config/policy",
        },
    }))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    server_time: i64,
    uptime_secs: i64,
    config_version: u64,
    recent_errors: Vec<ErrorRecord>,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let recent_errors = state.recent_errors.read().iter().cloned().collect();
    Json(HealthResponse {
        status: "ok",
        server_time: Utc::now().timestamp_millis(),
        uptime_secs: state.uptime_secs(),
        config_version: state.current_version(),
        recent_errors,
    })
}

// =============================================================================
// Analysis
// =============================================================================

#[derive(Debug, Default, Deserialize)]
struct AnalysisRequest {
    #[serde(default)]
    symbol: Option<String>,
}

#[derive(Serialize)]
struct AnalysisResponse {
    request_id: String,
    symbol: String,
    analysis: BTreeMap<String, AnalysisResult>,
    data_provider: String,
    timestamp: String,
}

/// Fetch each configured timeframe in turn and analyse it.
///
/// Requests are sequential with a configurable pause so a single call does
/// not trip the provider's rate limit.
async fn analyze_symbol(
    State(state): State<Arc<AppState>>,
    request: Option<Json<AnalysisRequest>>,
) -> impl IntoResponse {
    let Json(request) = request.unwrap_or_default();
    let config = state.runtime_config.read().clone();
    let engine = state.engine();

    let symbol = request
        .symbol
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .unwrap_or(config.default_symbol);
    let request_id = Uuid::new_v4().to_string();
    info!(request_id = %request_id, symbol = %symbol, "analysis requested");

    let mut analysis = BTreeMap::new();
    for (i, tf) in config.timeframes.iter().enumerate() {
        if i > 0 && config.request_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(config.request_delay_ms)).await;
        }

        let to = Utc::now();
        let from = to - chrono::Duration::days(tf.lookback_days);
        let record = match state.source.fetch_bars(&symbol, &tf.name, from, to).await {
            Ok(bars) => engine.analyze(&bars, &tf.name),
            Err(e) => {
                let message = format!("Failed to process {}: {e}", tf.name);
                warn!(request_id = %request_id, timeframe = %tf.name, error = %e, "fetch failed");
                state.push_error(message.clone());
                AnalysisResult::failed(&tf.name, message)
            }
        };
        analysis.insert(tf.name.clone(), record);
    }

    Json(AnalysisResponse {
        request_id,
        symbol,
        analysis,
        data_provider: state.source.name().to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Deserialize)]
struct RawBarsRequest {
    timeframe: String,
    #[serde(default)]
    bars: serde_json::Value,
}

/// Run the engine directly on caller-supplied bars.  Malformed bars come
/// back as an `Error` record.
async fn analyze_bars(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RawBarsRequest>,
) -> impl IntoResponse {
    let result = state.engine().analyze_value(&request.bars, &request.timeframe);
    Json(result)
}

// =============================================================================
// Price
// =============================================================================

async fn price(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> impl IntoResponse {
    let symbol = symbol.to_uppercase();
    let provider = state.source.name().to_string();

    match state.source.last_price(&symbol).await {
        Ok(price) => Json(serde_json::json!({
            "symbol": symbol,
            "price": price,
            "data_provider": provider,
            "timestamp": Utc::now().to_rfc3339(),
        }))
        .into_response(),
        Err(e) => {
            warn!(symbol = %symbol, error = %e, "price lookup failed");
            state.push_error(format!("price lookup for {symbol} failed: {e}"));
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": e.to_string(),
                    "data_provider": provider,
                })),
            )
                .into_response()
        }
    }
}

// =============================================================================
// Config
// =============================================================================

async fn get_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let config = state.runtime_config.read().clone();
    Json(config)
}

async fn set_policy(
    State(state): State<Arc<AppState>>,
    Json(policy): Json<AnalysisPolicy>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    policy.validate().map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
    })?;

    // Clone config and drop the write lock before saving.
    let config = {
        let mut config = state.runtime_config.write();
        config.policy = policy;
        config.clone()
    };
    let version = state.increment_version();
    info!(config_version = version, "analysis policy updated");

    // Save to disk (best-effort).
    if let Err(e) = config.save(&state.config_path) {
        warn!(error = %e, "failed to save runtime config to disk");
    }

    Ok(Json(serde_json::json!({
        "config_version": version,
        "policy": config.policy,
    })))
}
