//! Client state and configuration types

use super::ReconnectPolicy;
use crate::config::Config;
use crate::feed::{BINANCE_WS_URL, DEFAULT_DEDUP_THRESHOLD};
use crate::ws::WsConfig;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Connection lifecycle state; exactly one holds at a time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.pad(name)
    }
}

/// Published view of the client's retry bookkeeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryStatus {
    /// Consecutive automatic retries since the last successful connect
    pub attempts: u32,
    /// When the most recent connection attempt was dialed
    pub last_attempt_at: Option<Instant>,
    /// Delay of the scheduled retry, if one is pending
    pub pending: Option<Duration>,
    /// Retry budget used up; only `start()` or `reconnect()` resume
    pub exhausted: bool,
}

/// Streaming client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Stream endpoint the ticker path is appended to
    pub endpoint: String,
    pub reconnect: ReconnectPolicy,
    /// Minimum price move that publishes a new snapshot
    pub dedup_threshold: Decimal,
    /// Handshakes slower than this count as failed attempts
    pub connect_timeout: Duration,
    pub ws: WsConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: BINANCE_WS_URL.to_string(),
            reconnect: ReconnectPolicy::default(),
            dedup_threshold: DEFAULT_DEDUP_THRESHOLD,
            connect_timeout: Duration::from_secs(10),
            ws: WsConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Create a config for the given endpoint with default policies
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set the reconnect policy
    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Set the dedup threshold
    pub fn dedup_threshold(mut self, threshold: Decimal) -> Self {
        self.dedup_threshold = threshold;
        self
    }

    /// Set the handshake timeout
    pub fn connect_timeout(mut self, d: Duration) -> Self {
        self.connect_timeout = d;
        self
    }
}

impl From<&Config> for ClientConfig {
    fn from(config: &Config) -> Self {
        Self {
            endpoint: config.feed.endpoint.clone(),
            reconnect: ReconnectPolicy::from(&config.reconnect),
            dedup_threshold: config.stream.dedup_threshold,
            connect_timeout: Duration::from_secs(config.stream.connect_timeout_secs),
            ws: WsConfig::default()
                .ping_interval(Duration::from_secs(config.stream.ping_interval_secs)),
        }
    }
}
