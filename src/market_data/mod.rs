pub mod bar;
pub mod polygon;
pub mod source;

// Re-export the core types for convenient access (e.g. `use crate::market_data::Bar`).
pub use bar::{Bar, SeriesColumns, TimeframeClass};
pub use polygon::PolygonClient;
pub use source::MarketDataSource;
