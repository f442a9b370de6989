//! Shared helpers for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use price_stream::feed::BinanceTicker;
use price_stream::stream::{ClientConfig, ConnectionState, RetryStatus, StreamingPriceClient};
use price_stream::ws::{Connector, WsConnection, WsError, WsMessage};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

const WAIT: Duration = Duration::from_secs(60);

enum Outcome {
    Accept(WsConnection),
    Refuse,
    Hang,
}

/// Connector that plays back queued outcomes; an empty queue refuses
#[derive(Default)]
pub struct ScriptedConnector {
    outcomes: Mutex<VecDeque<Outcome>>,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl ScriptedConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a successful handshake; the returned sender plays the server
    pub fn accept(&self) -> mpsc::Sender<WsMessage> {
        let (tx, rx) = mpsc::channel(64);
        self.outcomes.lock().unwrap().push_back(Outcome::Accept(rx));
        tx
    }

    pub fn refuse(&self) {
        self.outcomes.lock().unwrap().push_back(Outcome::Refuse);
    }

    /// Queue a handshake that never completes
    pub fn hang(&self) {
        self.outcomes.lock().unwrap().push_back(Outcome::Hang);
    }

    pub fn calls(&self) -> Vec<(String, Instant)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, url: &str) -> Result<WsConnection, WsError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), Instant::now()));

        let outcome = self.outcomes.lock().unwrap().pop_front();
        match outcome {
            Some(Outcome::Accept(rx)) => Ok(rx),
            Some(Outcome::Hang) => std::future::pending().await,
            Some(Outcome::Refuse) | None => {
                Err(WsError::ConnectionFailed("connection refused".to_string()))
            }
        }
    }
}

pub fn client(connector: Arc<ScriptedConnector>) -> StreamingPriceClient {
    client_with(ClientConfig::new("ws://scripted.test/ws"), connector)
}

pub fn client_with(config: ClientConfig, connector: Arc<ScriptedConnector>) -> StreamingPriceClient {
    StreamingPriceClient::with_parts(config, connector, Arc::new(BinanceTicker))
}

/// Binance 24h ticker payload with the given last price
pub fn ticker(symbol: &str, price: &str) -> String {
    format!(
        r#"{{"e":"24hrTicker","E":1704067200000,"s":"{}","p":"1.20","P":"1.20","c":"{}","h":"102.00","l":"98.00","v":"1234.5"}}"#,
        symbol, price
    )
}

pub async fn wait_for_state(client: &StreamingPriceClient, state: ConnectionState) {
    let mut rx = client.watch_state();
    tokio::time::timeout(WAIT, rx.wait_for(|s| *s == state))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {}", state))
        .expect("client task ended");
}

pub async fn wait_for_retry(client: &StreamingPriceClient, f: impl FnMut(&RetryStatus) -> bool) {
    let mut rx = client.watch_retry();
    tokio::time::timeout(WAIT, rx.wait_for(f))
        .await
        .expect("timed out waiting for retry status")
        .expect("client task ended");
}

/// Send a frame and wait until the client has parsed a tick.
///
/// Only returns for payloads that parse; malformed ones never publish latency.
pub async fn send_tick(client: &StreamingPriceClient, server: &mpsc::Sender<WsMessage>, payload: String) {
    let mut latency = client.watch_latency();
    latency.borrow_and_update();

    server.send(WsMessage::Text(payload)).await.unwrap();

    tokio::time::timeout(WAIT, latency.changed())
        .await
        .expect("timed out waiting for tick")
        .expect("client task ended");
}
