//! price-stream: auto-reconnecting streaming ticker client
//!
//! This library provides:
//! - A per-symbol streaming price client with bounded, jittered backoff
//! - Exchange ticker formats (Binance 24h rolling ticker)
//! - A WebSocket transport with ping/pong keepalive
//! - Configuration, logging and Prometheus metrics

pub mod cli;
pub mod config;
pub mod feed;
pub mod stream;
pub mod telemetry;
pub mod ws;
