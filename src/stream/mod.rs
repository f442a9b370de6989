//! Streaming price client
//!
//! Keeps one live ticker subscription per client with bounded, jittered
//! exponential backoff on involuntary disconnects.

mod backoff;
mod client;
mod types;

pub use backoff::ReconnectPolicy;
pub use client::StreamingPriceClient;
pub use types::{ClientConfig, ConnectionState, RetryStatus};
