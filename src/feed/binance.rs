//! Binance 24h rolling ticker stream

use super::{FeedError, PriceSnapshot, TickerFormat};
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use tokio::time::Instant;

/// Binance WebSocket base URL
pub const BINANCE_WS_URL: &str = "wss://stream.binance.com:9443/ws";

const TICKER_EVENT: &str = "24hrTicker";

/// Binance individual symbol ticker message
#[derive(Debug, Deserialize)]
struct BinanceTickerMessage {
    /// Event type
    #[serde(rename = "e")]
    event_type: String,
    /// Event time (milliseconds)
    #[serde(rename = "E")]
    event_time: i64,
    /// Symbol
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "p")]
    price_change: String,
    #[serde(rename = "P")]
    price_change_percent: String,
    /// Last price
    #[serde(rename = "c")]
    last_price: String,
    #[serde(rename = "h")]
    high: String,
    #[serde(rename = "l")]
    low: String,
    /// Total traded base asset volume
    #[serde(rename = "v")]
    volume: String,
}

/// Binance `<symbol>@ticker` stream format
#[derive(Debug, Clone, Copy, Default)]
pub struct BinanceTicker;

fn decimal(field: &'static str, value: &str) -> Result<Decimal, FeedError> {
    Decimal::from_str(value).map_err(|_| FeedError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

impl TickerFormat for BinanceTicker {
    fn stream_url(&self, endpoint: &str, symbol: &str) -> String {
        format!(
            "{}/{}@ticker",
            endpoint.trim_end_matches('/'),
            symbol.to_lowercase()
        )
    }

    fn parse(&self, payload: &str, observed_at: Instant) -> Result<PriceSnapshot, FeedError> {
        let msg: BinanceTickerMessage = serde_json::from_str(payload)?;

        if msg.event_type != TICKER_EVENT {
            return Err(FeedError::UnexpectedEvent(msg.event_type));
        }

        let exchange_ts = Utc
            .timestamp_millis_opt(msg.event_time)
            .single()
            .ok_or(FeedError::InvalidTimestamp(msg.event_time))?;

        Ok(PriceSnapshot {
            price: decimal("c", &msg.last_price)?,
            price_change: decimal("p", &msg.price_change)?,
            price_change_percent: decimal("P", &msg.price_change_percent)?,
            high: decimal("h", &msg.high)?,
            low: decimal("l", &msg.low)?,
            volume: decimal("v", &msg.volume)?,
            symbol: msg.symbol,
            exchange_ts,
            observed_at,
        })
    }
}
