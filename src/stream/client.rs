//! Auto-reconnecting streaming price client
//!
//! Each [`StreamingPriceClient`] owns one subscription to one symbol. All
//! lifecycle work runs on a single actor task: commands from the handle,
//! handshake completion, inbound frames and the retry timer are serialized
//! through one `select!` loop, so no two mutations of the client state race.
//! Published state lives in `watch` channels; readers always see a complete
//! value and never block the actor.

use super::types::{ClientConfig, ConnectionState, RetryStatus};
use crate::feed::{BinanceTicker, PriceSnapshot, TickerFormat};
use crate::telemetry::{self, CounterMetric, GaugeMetric, LatencyMetric};
use crate::ws::{Connector, WsConnection, WsConnector, WsError, WsMessage};
use futures_util::future::BoxFuture;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Sleep};

/// Requests from the handle to the actor
#[derive(Debug)]
enum Command {
    Start(String),
    Stop,
    Reconnect,
}

type Handshake = BoxFuture<'static, Result<WsConnection, WsError>>;

/// What the actor is currently waiting on
enum Phase {
    /// Disconnected with nothing scheduled
    Idle,
    /// Disconnected with a retry pending
    Backoff(Pin<Box<Sleep>>),
    Connecting {
        handshake: Handshake,
        dialed_at: Instant,
    },
    Connected(WsConnection),
}

enum Event {
    Command(Command),
    RetryDue,
    Handshake(Result<WsConnection, WsError>),
    Frame(Option<WsMessage>),
}

impl Phase {
    fn state(&self) -> ConnectionState {
        match self {
            Phase::Idle | Phase::Backoff(_) => ConnectionState::Disconnected,
            Phase::Connecting { .. } => ConnectionState::Connecting,
            Phase::Connected(_) => ConnectionState::Connected,
        }
    }

    async fn next_event(&mut self) -> Event {
        match self {
            Phase::Idle => std::future::pending().await,
            Phase::Backoff(sleep) => {
                sleep.as_mut().await;
                Event::RetryDue
            }
            Phase::Connecting { handshake, .. } => Event::Handshake(handshake.await),
            Phase::Connected(connection) => Event::Frame(connection.recv().await),
        }
    }
}

#[derive(Debug, Default)]
struct RetryState {
    attempt_count: u32,
    last_attempt_at: Option<Instant>,
    exhausted: bool,
}

impl RetryState {
    fn reset(&mut self) {
        self.attempt_count = 0;
        self.exhausted = false;
    }
}

/// Single writer of all client state
struct ClientActor {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    format: Arc<dyn TickerFormat>,
    symbol: Option<String>,
    stopped: bool,
    retry: RetryState,
    phase: Phase,
    /// Receipt time of the previous tick, or of connection establishment
    last_receipt: Instant,
    state_tx: watch::Sender<ConnectionState>,
    snapshot_tx: watch::Sender<Option<PriceSnapshot>>,
    latency_tx: watch::Sender<u64>,
    retry_tx: watch::Sender<RetryStatus>,
}

impl ClientActor {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            let event = tokio::select! {
                biased;
                cmd = commands.recv() => match cmd {
                    Some(cmd) => Event::Command(cmd),
                    None => break,
                },
                event = self.phase.next_event() => event,
            };
            self.handle(event);
        }

        tracing::debug!(symbol = ?self.symbol, "Client handle dropped, shutting down");
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::Command(Command::Start(symbol)) => self.start(symbol),
            Event::Command(Command::Stop) => self.stop(),
            Event::Command(Command::Reconnect) => self.reconnect(),
            Event::RetryDue => self.on_retry_due(),
            Event::Handshake(Ok(connection)) => self.on_connected(connection),
            Event::Handshake(Err(e)) => self.on_disconnected(Some(e.to_string())),
            Event::Frame(Some(WsMessage::Text(text))) => self.on_payload(&text),
            Event::Frame(Some(WsMessage::Binary(data))) => match String::from_utf8(data) {
                Ok(text) => self.on_payload(&text),
                Err(_) => {
                    tracing::warn!(symbol = ?self.symbol, "Dropping non-UTF-8 binary frame");
                    telemetry::increment(CounterMetric::DroppedPayloads, self.symbol_label());
                }
            },
            Event::Frame(Some(WsMessage::Closed(reason))) => self.on_disconnected(reason),
            Event::Frame(None) => {
                self.on_disconnected(Some("connection channel closed".to_string()))
            }
        }
    }

    fn start(&mut self, symbol: String) {
        if matches!(self.phase, Phase::Connecting { .. } | Phase::Connected(_)) {
            if self.symbol.as_deref() != Some(symbol.as_str()) {
                tracing::warn!(
                    current = ?self.symbol,
                    requested = %symbol,
                    "Client already streaming another symbol, ignoring start"
                );
            }
            return;
        }

        if self.symbol.as_deref() != Some(symbol.as_str()) {
            self.snapshot_tx.send_replace(None);
        }

        tracing::info!(symbol = %symbol, "Starting price stream");
        self.stopped = false;
        self.symbol = Some(symbol);
        self.retry.reset();
        self.dial();
    }

    fn stop(&mut self) {
        self.stopped = true;
        self.phase = Phase::Idle;
        self.retry.exhausted = false;
        self.publish_state();
        self.publish_retry(None);
        tracing::info!(symbol = ?self.symbol, "Price stream stopped");
    }

    fn reconnect(&mut self) {
        if self.symbol.is_none() {
            tracing::warn!("Reconnect requested before start, ignoring");
            return;
        }

        tracing::info!(
            symbol = ?self.symbol,
            from = %self.phase.state(),
            "Forcing reconnect"
        );
        self.stopped = false;
        self.phase = Phase::Idle;
        self.publish_state();
        self.retry.reset();
        self.dial();
    }

    fn on_retry_due(&mut self) {
        if self.stopped {
            self.phase = Phase::Idle;
            return;
        }
        self.dial();
    }

    fn dial(&mut self) {
        let Some(symbol) = self.symbol.as_deref() else {
            return;
        };

        let url = self.format.stream_url(&self.config.endpoint, symbol);
        tracing::info!(
            symbol,
            url = %url,
            attempt = self.retry.attempt_count,
            "Connecting price stream"
        );

        let connector = Arc::clone(&self.connector);
        let timeout = self.config.connect_timeout;
        let handshake: Handshake = Box::pin(async move {
            match tokio::time::timeout(timeout, connector.connect(&url)).await {
                Ok(result) => result,
                Err(_) => Err(WsError::Timeout(timeout)),
            }
        });

        let now = Instant::now();
        self.retry.last_attempt_at = Some(now);
        self.phase = Phase::Connecting {
            handshake,
            dialed_at: now,
        };
        self.publish_state();
        self.publish_retry(None);
    }

    fn on_connected(&mut self, connection: WsConnection) {
        let now = Instant::now();
        if let Phase::Connecting { dialed_at, .. } = &self.phase {
            telemetry::record_latency(
                LatencyMetric::Handshake,
                self.symbol_label(),
                now.saturating_duration_since(*dialed_at),
            );
        }

        self.phase = Phase::Connected(connection);
        self.last_receipt = now;
        self.retry.reset();
        self.publish_state();
        self.publish_retry(None);
        tracing::info!(symbol = ?self.symbol, "Price stream connected");
    }

    fn on_disconnected(&mut self, reason: Option<String>) {
        let from = self.phase.state();
        self.phase = Phase::Idle;
        self.publish_state();
        tracing::warn!(
            symbol = ?self.symbol,
            from = %from,
            reason = reason.as_deref().unwrap_or("closed"),
            "Price stream disconnected"
        );

        if self.stopped {
            return;
        }

        let attempt = self.retry.attempt_count;
        if self.config.reconnect.allows_retry(attempt) {
            let delay = self.config.reconnect.next_delay(attempt);
            self.retry.attempt_count += 1;
            self.phase = Phase::Backoff(Box::pin(tokio::time::sleep(delay)));
            self.publish_retry(Some(delay));
            telemetry::increment(CounterMetric::RetriesScheduled, self.symbol_label());
            tracing::info!(
                symbol = ?self.symbol,
                attempt = self.retry.attempt_count,
                delay_ms = delay.as_millis() as u64,
                "Scheduling reconnect"
            );
        } else {
            self.retry.exhausted = true;
            self.publish_retry(None);
            telemetry::increment(CounterMetric::RetriesExhausted, self.symbol_label());
            tracing::error!(
                symbol = ?self.symbol,
                attempts = attempt,
                "Reconnect attempts exhausted, waiting for start or reconnect"
            );
        }
    }

    fn on_payload(&mut self, text: &str) {
        let received_at = Instant::now();

        let candidate = match self.format.parse(text, received_at) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(
                    symbol = ?self.symbol,
                    error = %e,
                    msg_preview = %text.chars().take(100).collect::<String>(),
                    "Dropping malformed ticker payload"
                );
                telemetry::increment(CounterMetric::DroppedPayloads, self.symbol_label());
                return;
            }
        };

        let spacing = received_at.saturating_duration_since(self.last_receipt);
        self.last_receipt = received_at;
        self.latency_tx.send_replace(round_millis(spacing));
        telemetry::record_latency(LatencyMetric::TickSpacing, self.symbol_label(), spacing);

        let threshold = self.config.dedup_threshold;
        let publish = match &*self.snapshot_tx.borrow() {
            Some(previous) => candidate.differs_from(previous, threshold),
            None => true,
        };

        if publish {
            tracing::debug!(symbol = %candidate.symbol, price = %candidate.price, "Publishing snapshot");
            self.snapshot_tx.send_replace(Some(candidate));
            telemetry::increment(CounterMetric::SnapshotsPublished, self.symbol_label());
        } else {
            telemetry::increment(CounterMetric::SnapshotsDeduplicated, self.symbol_label());
        }
    }

    fn publish_state(&self) {
        let state = self.phase.state();
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
        telemetry::set_gauge(
            GaugeMetric::ConnectionState,
            self.symbol_label(),
            telemetry::connection_state_value(state),
        );
    }

    fn publish_retry(&self, pending: Option<Duration>) {
        self.retry_tx.send_replace(RetryStatus {
            attempts: self.retry.attempt_count,
            last_attempt_at: self.retry.last_attempt_at,
            pending,
            exhausted: self.retry.exhausted,
        });
        telemetry::set_gauge(
            GaugeMetric::RetryAttempts,
            self.symbol_label(),
            f64::from(self.retry.attempt_count),
        );
    }

    fn symbol_label(&self) -> &str {
        self.symbol.as_deref().unwrap_or("")
    }
}

fn round_millis(d: Duration) -> u64 {
    (d.as_secs_f64() * 1000.0).round() as u64
}

/// Handle to a streaming price subscription for one symbol.
///
/// `start`, `stop` and `reconnect` return immediately; their effects show up
/// in the published state. Dropping every handle shuts the client down and
/// releases its socket.
#[derive(Clone)]
pub struct StreamingPriceClient {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    snapshot: watch::Receiver<Option<PriceSnapshot>>,
    latency: watch::Receiver<u64>,
    retry: watch::Receiver<RetryStatus>,
}

impl StreamingPriceClient {
    /// Create a client for the Binance ticker stream over tokio-tungstenite
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn new(config: ClientConfig) -> Self {
        let connector = Arc::new(WsConnector::new(config.ws.clone()));
        Self::with_parts(config, connector, Arc::new(BinanceTicker))
    }

    /// Create a client with a custom transport and ticker format
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn with_parts(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
        format: Arc<dyn TickerFormat>,
    ) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ConnectionState::Disconnected);
        let (snapshot_tx, snapshot) = watch::channel(None);
        let (latency_tx, latency) = watch::channel(0);
        let (retry_tx, retry) = watch::channel(RetryStatus::default());

        let actor = ClientActor {
            config,
            connector,
            format,
            symbol: None,
            stopped: false,
            retry: RetryState::default(),
            phase: Phase::Idle,
            last_receipt: Instant::now(),
            state_tx,
            snapshot_tx,
            latency_tx,
            retry_tx,
        };
        tokio::spawn(actor.run(command_rx));

        Self {
            commands,
            state,
            snapshot,
            latency,
            retry,
        }
    }

    /// Begin streaming `symbol`; a no-op while connected or connecting
    pub fn start(&self, symbol: impl Into<String>) {
        let _ = self.commands.send(Command::Start(symbol.into()));
    }

    /// Terminate the subscription and cancel any pending retry
    pub fn stop(&self) {
        let _ = self.commands.send(Command::Stop);
    }

    /// Drop any live connection and dial again immediately with a fresh retry budget
    pub fn reconnect(&self) {
        let _ = self.commands.send(Command::Reconnect);
    }

    /// Current connection state
    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    /// Latest published snapshot, if any tick has arrived
    pub fn snapshot(&self) -> Option<PriceSnapshot> {
        self.snapshot.borrow().clone()
    }

    /// Milliseconds between the last two ticks (or between connecting and the
    /// first tick). This is inter-message spacing, not network round-trip time.
    pub fn latency_ms(&self) -> u64 {
        *self.latency.borrow()
    }

    pub fn retry_status(&self) -> RetryStatus {
        *self.retry.borrow()
    }

    /// Disconnected with the retry budget spent; needs `start()` or `reconnect()`
    pub fn needs_attention(&self) -> bool {
        self.connection_state() == ConnectionState::Disconnected && self.retry_status().exhausted
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn watch_snapshot(&self) -> watch::Receiver<Option<PriceSnapshot>> {
        self.snapshot.clone()
    }

    /// Notified on every parsed tick, even when the value repeats
    pub fn watch_latency(&self) -> watch::Receiver<u64> {
        self.latency.clone()
    }

    pub fn watch_retry(&self) -> watch::Receiver<RetryStatus> {
        self.retry.clone()
    }
}
