//! Watch command implementation

use crate::config::Config;
use crate::feed::{BinanceTicker, PriceSnapshot, TickerFormat};
use crate::stream::{ClientConfig, ConnectionState, StreamingPriceClient};
use crate::ws::{Connector, WsConnector};
use clap::Args;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Symbols to stream, comma separated (defaults to the configured list)
    #[arg(short, long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Seconds between status reports
    #[arg(long, default_value_t = 5)]
    pub report_interval_secs: u64,

    /// Print reports as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Force a reconnect on clients that exhausted their retries
    #[arg(long)]
    pub auto_recover: bool,
}

/// One line of watch output
#[derive(Debug, Serialize)]
struct Report<'a> {
    symbol: &'a str,
    state: ConnectionState,
    latency_ms: u64,
    retry_attempts: u32,
    snapshot: Option<PriceSnapshot>,
}

/// Resolve the ticker format for an exchange name
pub fn ticker_format(exchange: &str) -> anyhow::Result<Arc<dyn TickerFormat>> {
    match exchange.to_lowercase().as_str() {
        "binance" => Ok(Arc::new(BinanceTicker)),
        other => anyhow::bail!("Unsupported exchange: {}", other),
    }
}

impl WatchArgs {
    fn symbols(&self, config: &Config) -> Vec<String> {
        if self.symbols.is_empty() {
            config.feed.symbols.clone()
        } else {
            self.symbols.clone()
        }
    }

    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let symbols = self.symbols(config);
        anyhow::ensure!(!symbols.is_empty(), "No symbols to watch");

        let format = ticker_format(&config.feed.exchange)?;
        let client_config = ClientConfig::from(config);
        let connector: Arc<dyn Connector> = Arc::new(WsConnector::new(client_config.ws.clone()));

        let clients: Vec<(String, StreamingPriceClient)> = symbols
            .into_iter()
            .map(|symbol| {
                let client = StreamingPriceClient::with_parts(
                    client_config.clone(),
                    Arc::clone(&connector),
                    Arc::clone(&format),
                );
                client.start(symbol.clone());
                (symbol, client)
            })
            .collect();

        tracing::info!(count = clients.len(), "Watching price streams");

        let mut report = tokio::time::interval(Duration::from_secs(self.report_interval_secs.max(1)));
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested");
                    break;
                }
                _ = report.tick() => {
                    for (symbol, client) in &clients {
                        self.print_report(symbol, client)?;

                        if self.auto_recover && client.needs_attention() {
                            tracing::warn!(symbol = %symbol, "Retries exhausted, forcing reconnect");
                            client.reconnect();
                        }
                    }
                }
            }
        }

        for (_, client) in &clients {
            client.stop();
        }

        Ok(())
    }

    fn print_report(&self, symbol: &str, client: &StreamingPriceClient) -> anyhow::Result<()> {
        let report = Report {
            symbol,
            state: client.connection_state(),
            latency_ms: client.latency_ms(),
            retry_attempts: client.retry_status().attempts,
            snapshot: client.snapshot(),
        };

        if self.json {
            println!("{}", serde_json::to_string(&report)?);
            return Ok(());
        }

        match &report.snapshot {
            Some(s) => println!(
                "{:<10} {:<12} {} ({}%) H {} L {} V {} | {}ms",
                symbol,
                report.state,
                s.price,
                s.price_change_percent,
                s.high,
                s.low,
                s.volume,
                report.latency_ms
            ),
            None => println!(
                "{:<10} {:<12} waiting for first tick (retry {})",
                symbol, report.state, report.retry_attempts
            ),
        }

        Ok(())
    }
}
