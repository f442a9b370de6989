//! Prometheus metrics

use crate::stream::ConnectionState;
use std::time::Duration;

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// Spacing between consecutive ticks on one connection
    TickSpacing,
    /// Time from dialing to a completed handshake
    Handshake,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Connection state (0 disconnected, 1 connecting, 2 connected)
    ConnectionState,
    /// Consecutive automatic retry attempts
    RetryAttempts,
}

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Automatic retries scheduled
    RetriesScheduled,
    /// Retry budget exhausted
    RetriesExhausted,
    /// Payloads dropped as malformed
    DroppedPayloads,
    /// Snapshots published
    SnapshotsPublished,
    /// Ticks suppressed by the dedup threshold
    SnapshotsDeduplicated,
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, symbol: &str, duration: Duration) {
    let metric_name = match metric {
        LatencyMetric::TickSpacing => "pricestream_tick_spacing_ms",
        LatencyMetric::Handshake => "pricestream_handshake_latency_ms",
    };

    metrics::histogram!(metric_name, "symbol" => symbol.to_string())
        .record(duration.as_secs_f64() * 1000.0);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, symbol: &str, value: f64) {
    let metric_name = match metric {
        GaugeMetric::ConnectionState => "pricestream_connection_state",
        GaugeMetric::RetryAttempts => "pricestream_retry_attempts",
    };

    metrics::gauge!(metric_name, "symbol" => symbol.to_string()).set(value);
}

/// Increment a counter by one
pub fn increment(metric: CounterMetric, symbol: &str) {
    let metric_name = match metric {
        CounterMetric::RetriesScheduled => "pricestream_retries_scheduled_total",
        CounterMetric::RetriesExhausted => "pricestream_retries_exhausted_total",
        CounterMetric::DroppedPayloads => "pricestream_dropped_payloads_total",
        CounterMetric::SnapshotsPublished => "pricestream_snapshots_published_total",
        CounterMetric::SnapshotsDeduplicated => "pricestream_snapshots_deduplicated_total",
    };

    metrics::counter!(metric_name, "symbol" => symbol.to_string()).increment(1);
}

/// Gauge encoding of a connection state
pub fn connection_state_value(state: ConnectionState) -> f64 {
    match state {
        ConnectionState::Disconnected => 0.0,
        ConnectionState::Connecting => 1.0,
        ConnectionState::Connected => 2.0,
    }
}
