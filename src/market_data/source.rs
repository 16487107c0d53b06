// =============================================================================
// Market-data source abstraction
// =============================================================================
//
// The engine never fetches data itself.  The HTTP service pulls bars through
// this trait, so tests can substitute an in-memory source for the live
// provider.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::bar::Bar;

#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Short provider name reported alongside analysis responses.
    fn name(&self) -> &str;

    /// Bars for `symbol` on `timeframe` between `from` and `to`, oldest first.
    ///
    /// An empty vec means the provider had no data for the window.
    async fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Bar>>;

    /// Most recent traded price, or `None` when the provider has none.
    async fn last_price(&self, symbol: &str) -> Result<Option<f64>>;
}
