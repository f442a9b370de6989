//! State machine tests for the streaming price client

mod common;

use common::{client, client_with, send_tick, ticker, wait_for_retry, wait_for_state, ScriptedConnector};
use price_stream::stream::{ClientConfig, ConnectionState, ReconnectPolicy};
use price_stream::ws::WsMessage;
use rust_decimal_macros::dec;
use std::time::Duration;
use tokio::time::Instant;

fn price(client: &price_stream::stream::StreamingPriceClient) -> Option<rust_decimal::Decimal> {
    client.snapshot().map(|s| s.price)
}

#[tokio::test(start_paused = true)]
async fn test_connect_publishes_first_tick_with_latency() {
    let connector = ScriptedConnector::new();
    let server = connector.accept();
    let client = client(connector.clone());

    client.start("BTCUSDT");
    wait_for_state(&client, ConnectionState::Connected).await;

    assert_eq!(client.retry_status().attempts, 0);
    assert_eq!(connector.calls()[0].0, "ws://scripted.test/ws/btcusdt@ticker");
    assert!(client.snapshot().is_none());

    tokio::time::advance(Duration::from_millis(250)).await;
    send_tick(&client, &server, ticker("BTCUSDT", "100.00")).await;

    let snapshot = client.snapshot().unwrap();
    assert_eq!(snapshot.symbol, "BTCUSDT");
    assert_eq!(snapshot.price, dec!(100.00));
    assert_eq!(snapshot.high, dec!(102.00));
    assert_eq!(snapshot.volume, dec!(1234.5));
    assert_eq!(client.latency_ms(), 250);
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_dedup_then_recovery() {
    let connector = ScriptedConnector::new();
    let first = connector.accept();
    let client = client(connector.clone());

    client.start("BTCUSDT");
    wait_for_state(&client, ConnectionState::Connected).await;

    send_tick(&client, &first, ticker("BTCUSDT", "100.00")).await;
    assert_eq!(price(&client), Some(dec!(100.00)));

    send_tick(&client, &first, ticker("BTCUSDT", "100.005")).await;
    assert_eq!(price(&client), Some(dec!(100.00)));

    send_tick(&client, &first, ticker("BTCUSDT", "101.20")).await;
    assert_eq!(price(&client), Some(dec!(101.20)));

    let second = connector.accept();
    let dropped_at = Instant::now();
    drop(first);

    wait_for_state(&client, ConnectionState::Disconnected).await;
    let retry = client.retry_status();
    assert_eq!(retry.attempts, 1);
    let pending = retry.pending.expect("retry should be scheduled");
    assert!(pending >= Duration::from_millis(1000) && pending <= Duration::from_millis(2000));

    wait_for_state(&client, ConnectionState::Connected).await;
    let redialed = connector.calls()[1].1 - dropped_at;
    assert!(
        redialed >= Duration::from_millis(1000) && redialed <= Duration::from_millis(2000),
        "redialed after {:?}",
        redialed
    );
    assert_eq!(client.retry_status().attempts, 0);
    assert_eq!(price(&client), Some(dec!(101.20)));

    // Latency restarts from the new connection
    tokio::time::advance(Duration::from_millis(40)).await;
    send_tick(&client, &second, ticker("BTCUSDT", "101.205")).await;
    assert_eq!(client.latency_ms(), 40);
    assert_eq!(price(&client), Some(dec!(101.20)));
}

#[tokio::test(start_paused = true)]
async fn test_malformed_payload_changes_nothing() {
    let connector = ScriptedConnector::new();
    let server = connector.accept();
    let client = client(connector.clone());

    client.start("BTCUSDT");
    wait_for_state(&client, ConnectionState::Connected).await;
    send_tick(&client, &server, ticker("BTCUSDT", "100.00")).await;

    tokio::time::advance(Duration::from_millis(100)).await;
    server
        .send(WsMessage::Text("{not json".to_string()))
        .await
        .unwrap();
    server
        .send(WsMessage::Text(ticker("BTCUSDT", "abc")))
        .await
        .unwrap();
    server
        .send(WsMessage::Binary(vec![0xff, 0xfe]))
        .await
        .unwrap();
    tokio::time::advance(Duration::from_millis(100)).await;

    // Spacing is measured from the last parsed tick, skipping the bad frames
    send_tick(&client, &server, ticker("BTCUSDT", "100.001")).await;
    assert_eq!(client.latency_ms(), 200);
    assert_eq!(price(&client), Some(dec!(100.00)));
    assert_eq!(client.connection_state(), ConnectionState::Connected);
    assert_eq!(connector.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_binary_text_frames_are_parsed() {
    let connector = ScriptedConnector::new();
    let server = connector.accept();
    let client = client(connector.clone());

    client.start("ETHUSDT");
    wait_for_state(&client, ConnectionState::Connected).await;

    let mut latency = client.watch_latency();
    latency.borrow_and_update();
    server
        .send(WsMessage::Binary(ticker("ETHUSDT", "2300.10").into_bytes()))
        .await
        .unwrap();
    latency.changed().await.unwrap();

    assert_eq!(price(&client), Some(dec!(2300.10)));
}

#[tokio::test(start_paused = true)]
async fn test_retry_delays_follow_backoff_and_stop_after_budget() {
    let connector = ScriptedConnector::new();
    let client = client(connector.clone());
    let policy = ReconnectPolicy::default();

    client.start("BTCUSDT");
    wait_for_retry(&client, |r| r.exhausted).await;

    // Initial attempt plus five automatic retries
    let calls = connector.calls();
    assert_eq!(calls.len(), 6);
    for n in 0..5u32 {
        let spacing = calls[n as usize + 1].1 - calls[n as usize].1;
        let base = policy.base_delay(n);
        assert!(
            spacing >= base && spacing <= base + policy.jitter,
            "retry {} after {:?}, expected {:?}..={:?}",
            n,
            spacing,
            base,
            base + policy.jitter
        );
    }

    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    assert!(client.needs_attention());
    assert_eq!(client.retry_status().attempts, 5);
    assert!(client.retry_status().pending.is_none());

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(connector.call_count(), 6);
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_after_exhaustion_resets_budget() {
    let connector = ScriptedConnector::new();
    let config = ClientConfig::new("ws://scripted.test/ws").reconnect(ReconnectPolicy {
        max_attempts: 2,
        ..ReconnectPolicy::default()
    });
    let client = client_with(config, connector.clone());

    client.start("BTCUSDT");
    wait_for_retry(&client, |r| r.exhausted).await;
    assert_eq!(connector.call_count(), 3);

    let _server = connector.accept();
    client.reconnect();
    wait_for_state(&client, ConnectionState::Connected).await;

    assert_eq!(connector.call_count(), 4);
    let retry = client.retry_status();
    assert_eq!(retry.attempts, 0);
    assert!(!retry.exhausted);
    assert!(!client.needs_attention());
}

#[tokio::test(start_paused = true)]
async fn test_start_after_exhaustion_resets_budget() {
    let connector = ScriptedConnector::new();
    let config = ClientConfig::new("ws://scripted.test/ws").reconnect(ReconnectPolicy {
        max_attempts: 1,
        ..ReconnectPolicy::default()
    });
    let client = client_with(config, connector.clone());

    client.start("BTCUSDT");
    wait_for_retry(&client, |r| r.exhausted).await;
    assert_eq!(connector.call_count(), 2);

    client.start("BTCUSDT");
    wait_for_retry(&client, |r| r.attempts == 1 && r.pending.is_some()).await;
    assert_eq!(connector.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_pending_retry() {
    let connector = ScriptedConnector::new();
    let server = connector.accept();
    let client = client(connector.clone());

    client.start("BTCUSDT");
    wait_for_state(&client, ConnectionState::Connected).await;

    connector.accept();
    server.send(WsMessage::Closed(None)).await.unwrap();
    wait_for_retry(&client, |r| r.pending.is_some()).await;

    client.stop();
    wait_for_retry(&client, |r| r.pending.is_none()).await;

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(connector.call_count(), 1);
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    assert!(!client.needs_attention());
}

#[tokio::test(start_paused = true)]
async fn test_stop_releases_socket() {
    let connector = ScriptedConnector::new();
    let server = connector.accept();
    let client = client(connector.clone());

    client.start("BTCUSDT");
    wait_for_state(&client, ConnectionState::Connected).await;

    client.stop();
    wait_for_state(&client, ConnectionState::Disconnected).await;
    server.closed().await;

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(connector.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_start_is_idempotent_while_connected() {
    let connector = ScriptedConnector::new();
    let _server = connector.accept();
    let client = client(connector.clone());

    client.start("BTCUSDT");
    client.start("BTCUSDT");
    wait_for_state(&client, ConnectionState::Connected).await;
    client.start("BTCUSDT");
    client.start("ETHUSDT");

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(connector.call_count(), 1);
    assert!(client.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_replaces_live_connection() {
    let connector = ScriptedConnector::new();
    let first = connector.accept();
    let client = client(connector.clone());

    client.start("BTCUSDT");
    wait_for_state(&client, ConnectionState::Connected).await;
    send_tick(&client, &first, ticker("BTCUSDT", "100.00")).await;

    let second = connector.accept();
    client.reconnect();
    first.closed().await;
    wait_for_state(&client, ConnectionState::Connected).await;

    assert_eq!(connector.call_count(), 2);
    assert_eq!(client.retry_status().attempts, 0);

    send_tick(&client, &second, ticker("BTCUSDT", "105.00")).await;
    assert_eq!(price(&client), Some(dec!(105.00)));
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_during_backoff_bypasses_delay() {
    let connector = ScriptedConnector::new();
    let client = client(connector.clone());

    client.start("BTCUSDT");
    wait_for_retry(&client, |r| r.pending.is_some()).await;
    let failed_at = connector.calls()[0].1;

    let _server = connector.accept();
    client.reconnect();
    wait_for_state(&client, ConnectionState::Connected).await;

    assert_eq!(connector.call_count(), 2);
    assert!(connector.calls()[1].1 - failed_at < Duration::from_millis(1000));
}

#[tokio::test(start_paused = true)]
async fn test_handshake_timeout_counts_as_failure() {
    let connector = ScriptedConnector::new();
    connector.hang();
    let config = ClientConfig::new("ws://scripted.test/ws").connect_timeout(Duration::from_secs(2));
    let client = client_with(config, connector.clone());

    client.start("BTCUSDT");
    wait_for_state(&client, ConnectionState::Connecting).await;
    wait_for_retry(&client, |r| r.attempts == 1).await;

    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    let retry = client.retry_status();
    let dialed = retry.last_attempt_at.unwrap();
    assert!(Instant::now() - dialed >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_start_new_symbol_after_stop_clears_snapshot() {
    let connector = ScriptedConnector::new();
    let server = connector.accept();
    let client = client(connector.clone());

    client.start("BTCUSDT");
    wait_for_state(&client, ConnectionState::Connected).await;
    send_tick(&client, &server, ticker("BTCUSDT", "100.00")).await;

    client.stop();
    wait_for_state(&client, ConnectionState::Disconnected).await;

    let _eth = connector.accept();
    client.start("ETHUSDT");
    wait_for_state(&client, ConnectionState::Connected).await;

    assert!(client.snapshot().is_none());
    assert_eq!(connector.calls()[1].0, "ws://scripted.test/ws/ethusdt@ticker");
}

#[tokio::test(start_paused = true)]
async fn test_dropping_client_releases_socket() {
    let connector = ScriptedConnector::new();
    let server = connector.accept();
    let client = client(connector.clone());

    client.start("BTCUSDT");
    wait_for_state(&client, ConnectionState::Connected).await;

    drop(client);
    server.closed().await;
}
