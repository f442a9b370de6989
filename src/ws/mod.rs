//! WebSocket transport
//!
//! A [`Connector`] dials a URL and hands back a channel of frames. Retry
//! policy lives with the caller, so a connector never reconnects on its own.

mod client;
mod types;

pub use client::WsConnector;
pub use types::{WsConfig, WsConnection, WsError, WsMessage};

use async_trait::async_trait;

/// Trait for transports that open a single streaming connection
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection; resolves once the handshake completes
    async fn connect(&self, url: &str) -> Result<WsConnection, WsError>;
}
