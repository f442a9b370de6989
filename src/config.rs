//! Configuration types for price-stream

use crate::feed::{BINANCE_WS_URL, DEFAULT_DEDUP_THRESHOLD};
use crate::telemetry::LogFormat;
use rust_decimal::Decimal;
use serde::Deserialize;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub feed: FeedConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Price feed configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub exchange: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    pub symbols: Vec<String>,
}

fn default_endpoint() -> String {
    BINANCE_WS_URL.to_string()
}

/// Automatic reconnection policy
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ReconnectConfig {
    /// Automatic retries before the client parks in Disconnected
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay before the first retry (milliseconds)
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Growth factor applied per attempt
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Cap on the exponential part of the delay (milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Upper bound of the uniform jitter added on top (milliseconds)
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}
fn default_initial_delay_ms() -> u64 {
    1000
}
fn default_multiplier() -> f64 {
    1.5
}
fn default_max_delay_ms() -> u64 {
    5000
}
fn default_jitter_ms() -> u64 {
    1000
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 1000,
            multiplier: 1.5,
            max_delay_ms: 5000,
            jitter_ms: 1000,
        }
    }
}

/// Per-connection stream handling
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StreamConfig {
    /// Minimum price move that publishes a new snapshot
    #[serde(default = "default_dedup_threshold")]
    pub dedup_threshold: Decimal,

    /// Handshake timeout (seconds)
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Keepalive ping interval (seconds, 0 disables)
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
}

fn default_dedup_threshold() -> Decimal {
    DEFAULT_DEDUP_THRESHOLD
}
fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_ping_interval_secs() -> u64 {
    30
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            dedup_threshold: DEFAULT_DEDUP_THRESHOLD,
            connect_timeout_secs: 10,
            ping_interval_secs: 30,
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Serve Prometheus metrics on this port when set
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
