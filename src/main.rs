// =============================================================================
// TA Signal Server — Main Entry Point
// =============================================================================
//
// Loads `.env`, the runtime config (defaults when missing), connects the
// Polygon.io data source and serves the REST API until Ctrl+C.
// =============================================================================

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ta_signal_engine::api;
use ta_signal_engine::app_state::AppState;
use ta_signal_engine::market_data::PolygonClient;
use ta_signal_engine::runtime_config::RuntimeConfig;

const DEFAULT_CONFIG_PATH: &str = "runtime_config.json";
const DEFAULT_PORT: u16 = 10000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("TA Signal Server starting up");

    let config_path = PathBuf::from(
        std::env::var("SIGNAL_CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into()),
    );
    let config = RuntimeConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });

    info!(
        default_symbol = %config.default_symbol,
        timeframes = ?config.timeframes.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
        "Runtime config ready"
    );

    // ── 2. Data source ───────────────────────────────────────────────────
    let api_key = std::env::var("POLYGON_API_KEY")
        .context("POLYGON_API_KEY must be set to reach the market-data provider")?;
    let source = PolygonClient::new(api_key)?;

    // ── 3. Shared state ──────────────────────────────────────────────────
    let state = Arc::new(AppState::new(config, config_path, Arc::new(source)));

    // ── 4. API server ────────────────────────────────────────────────────
    let host = std::env::var("SIGNAL_BIND_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port = match std::env::var("PORT") {
        Ok(p) => p.parse::<u16>().with_context(|| format!("invalid PORT '{p}'"))?,
        Err(_) => DEFAULT_PORT,
    };
    let bind_addr = format!("{host}:{port}");

    let app = api::router(state.clone());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            warn!("Shutdown signal received, stopping gracefully");
        })
        .await
        .context("API server failed")?;

    info!(uptime_secs = state.uptime_secs(), "TA Signal Server shut down complete.");
    Ok(())
}
