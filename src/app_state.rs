// =============================================================================
// Shared Application State — signal service
// =============================================================================
//
// Held behind `Arc<AppState>` by every HTTP handler.
//
// Thread safety:
//   - `parking_lot::RwLock` around the runtime config; handlers clone what
//     they need and drop the guard before any `.await`.
//   - Atomic counter for the config version.
//   - The market-data source manages its own interior state.
// =============================================================================

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::engine::SignalEngine;
use crate::market_data::MarketDataSource;
use crate::runtime_config::RuntimeConfig;

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

/// A recorded failure surfaced through `/health`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    /// ISO 8601 timestamp.
    pub at: String,
}

pub struct AppState {
    /// Incremented whenever the runtime config changes.
    pub config_version: AtomicU64,

    pub runtime_config: Arc<RwLock<RuntimeConfig>>,

    /// Where config changes are persisted.
    pub config_path: PathBuf,

    pub source: Arc<dyn MarketDataSource>,

    pub started_at: DateTime<Utc>,

    pub recent_errors: RwLock<VecDeque<ErrorRecord>>,
}

impl AppState {
    pub fn new(
        config: RuntimeConfig,
        config_path: impl Into<PathBuf>,
        source: Arc<dyn MarketDataSource>,
    ) -> Self {
        Self {
            config_version: AtomicU64::new(0),
            runtime_config: Arc::new(RwLock::new(config)),
            config_path: config_path.into(),
            source,
            started_at: Utc::now(),
            recent_errors: RwLock::new(VecDeque::with_capacity(MAX_RECENT_ERRORS)),
        }
    }

    /// Engine built from the current analysis policy.
    pub fn engine(&self) -> SignalEngine {
        SignalEngine::new(self.runtime_config.read().policy.clone())
    }

    pub fn increment_version(&self) -> u64 {
        self.config_version.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current_version(&self) -> u64 {
        self.config_version.load(Ordering::SeqCst)
    }

    pub fn push_error(&self, message: String) {
        let mut errors = self.recent_errors.write();
        if errors.len() >= MAX_RECENT_ERRORS {
            errors.pop_front();
        }
        errors.push_back(ErrorRecord {
            message,
            at: Utc::now().to_rfc3339(),
        });
    }

    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}
