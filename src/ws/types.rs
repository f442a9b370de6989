//! WebSocket types and configuration

use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Receiving half of an open WebSocket connection.
///
/// Dropping it closes the underlying socket.
pub type WsConnection = mpsc::Receiver<WsMessage>;

/// WebSocket transport configuration
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Interval for sending keepalive ping frames (zero disables pings)
    pub ping_interval: Duration,
    /// Buffered frames between the socket pump and the reader
    pub buffer_size: usize,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            buffer_size: 1024,
        }
    }
}

impl WsConfig {
    /// Set ping interval
    pub fn ping_interval(mut self, d: Duration) -> Self {
        self.ping_interval = d;
        self
    }

    /// Set the frame buffer size
    pub fn buffer_size(mut self, n: usize) -> Self {
        self.buffer_size = n.max(1);
        self
    }
}

/// Frames and lifecycle events delivered on a [`WsConnection`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsMessage {
    /// Text message
    Text(String),
    /// Binary message
    Binary(Vec<u8>),
    /// Connection closed; `None` for a clean close, otherwise the error
    Closed(Option<String>),
}

/// WebSocket errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WsError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    /// Handshake did not complete in time
    #[error("Handshake timed out after {0:?}")]
    Timeout(Duration),
    /// Send failed
    #[error("Send failed: {0}")]
    SendFailed(String),
}
