//! Price feed module
//!
//! Exchange-specific ticker formats and the snapshot they parse into.

mod binance;
mod types;

pub use binance::{BinanceTicker, BINANCE_WS_URL};
pub use types::{FeedError, PriceSnapshot, DEFAULT_DEDUP_THRESHOLD};

use tokio::time::Instant;

/// Trait for exchange ticker stream formats
pub trait TickerFormat: Send + Sync {
    /// Build the stream URL for `symbol` under `endpoint`
    fn stream_url(&self, endpoint: &str, symbol: &str) -> String;

    /// Parse one text payload received at `observed_at`
    fn parse(&self, payload: &str, observed_at: Instant) -> Result<PriceSnapshot, FeedError>;
}
