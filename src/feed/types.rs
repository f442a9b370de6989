//! Price feed types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

/// Minimum price move that counts as a new snapshot
pub const DEFAULT_DEDUP_THRESHOLD: Decimal = dec!(0.01);

/// Latest ticker state for one symbol, replaced wholesale on update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSnapshot {
    /// Trading symbol (e.g., "BTCUSDT")
    pub symbol: String,
    /// Last traded price
    pub price: Decimal,
    /// Absolute change over the exchange's rolling window
    pub price_change: Decimal,
    /// Relative change over the rolling window, in percent
    pub price_change_percent: Decimal,
    /// Window high
    pub high: Decimal,
    /// Window low
    pub low: Decimal,
    /// Window base-asset volume
    pub volume: Decimal,
    /// Exchange event time
    pub exchange_ts: DateTime<Utc>,
    /// Monotonic receipt time; only meaningful inside this process
    #[serde(skip)]
    pub observed_at: Instant,
}

impl PriceSnapshot {
    /// Whether this snapshot moved at least `threshold` away from `previous`.
    ///
    /// Only the price participates; the other fields ride along with it.
    pub fn differs_from(&self, previous: &PriceSnapshot, threshold: Decimal) -> bool {
        (self.price - previous.price).abs() >= threshold
    }
}

/// Ticker payload errors
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("invalid ticker JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("unexpected event type {0:?}")]
    UnexpectedEvent(String),
    #[error("invalid decimal in field {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("invalid event timestamp {0}")]
    InvalidTimestamp(i64),
}
