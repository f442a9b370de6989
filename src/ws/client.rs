//! tokio-tungstenite transport

use super::types::{WsConfig, WsConnection, WsError, WsMessage};
use super::Connector;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens one WebSocket per [`Connector::connect`] call with ping/pong keepalive.
///
/// Reconnection is not handled here; callers decide when to dial again.
#[derive(Debug, Clone, Default)]
pub struct WsConnector {
    config: WsConfig,
}

impl WsConnector {
    /// Create a new connector with the given configuration
    pub fn new(config: WsConfig) -> Self {
        Self { config }
    }

    /// Get the transport configuration
    pub fn config(&self) -> &WsConfig {
        &self.config
    }

    /// Forward frames from the socket until either side goes away
    async fn run_pump(socket: Socket, tx: mpsc::Sender<WsMessage>, ping_interval: Duration) {
        let (mut write, mut read) = socket.split();

        let mut ping = (!ping_interval.is_zero()).then(|| {
            let mut interval = interval_at(Instant::now() + ping_interval, ping_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });
        let mut waiting_for_pong = false;

        let reason = loop {
            tokio::select! {
                _ = tx.closed() => {
                    tracing::debug!("Reader dropped, closing socket");
                    let _ = write.send(Message::Close(None)).await;
                    return;
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if tx.send(WsMessage::Text(text)).await.is_err() {
                                let _ = write.send(Message::Close(None)).await;
                                return;
                            }
                        }
                        Some(Ok(Message::Binary(data))) => {
                            if tx.send(WsMessage::Binary(data)).await.is_err() {
                                let _ = write.send(Message::Close(None)).await;
                                return;
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = write.send(Message::Pong(data)).await {
                                break Some(WsError::SendFailed(e.to_string()).to_string());
                            }
                        }
                        Some(Ok(Message::Pong(_))) => {
                            waiting_for_pong = false;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            tracing::info!(
                                code = ?frame.as_ref().map(|f| f.code),
                                "Received close frame"
                            );
                            break None;
                        }
                        Some(Ok(Message::Frame(_))) => {}
                        Some(Err(e)) => break Some(e.to_string()),
                        None => break Some("Stream ended unexpectedly".to_string()),
                    }
                }

                _ = async {
                    match ping.as_mut() {
                        Some(interval) => {
                            interval.tick().await;
                        }
                        None => std::future::pending::<()>().await,
                    }
                } => {
                    if waiting_for_pong {
                        break Some("Pong timeout".to_string());
                    }
                    if let Err(e) = write.send(Message::Ping(Vec::new())).await {
                        break Some(WsError::SendFailed(e.to_string()).to_string());
                    }
                    waiting_for_pong = true;
                }
            }
        };

        let _ = tx.send(WsMessage::Closed(reason)).await;
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<WsConnection, WsError> {
        tracing::info!(url, "Connecting to WebSocket");

        let (socket, _response) = connect_async(url)
            .await
            .map_err(|e| WsError::ConnectionFailed(e.to_string()))?;

        tracing::info!(url, "WebSocket connected");

        let (tx, rx) = mpsc::channel(self.config.buffer_size);
        tokio::spawn(Self::run_pump(socket, tx, self.config.ping_interval));

        Ok(rx)
    }
}
