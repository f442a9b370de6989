use clap::Parser;
use price_stream::cli::{Cli, Commands};
use price_stream::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using default configuration");
            toml::from_str(include_str!("../config.toml.example"))?
        }
    };

    price_stream::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Watch(args) => {
            tracing::info!("Starting price streams");
            args.execute(&config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!("  Feed: {} {}", config.feed.exchange, config.feed.endpoint);
            println!("  Symbols: {}", config.feed.symbols.join(", "));
            println!(
                "  Reconnect: max {} attempts, {}ms x{} capped at {}ms, +{}ms jitter",
                config.reconnect.max_attempts,
                config.reconnect.initial_delay_ms,
                config.reconnect.multiplier,
                config.reconnect.max_delay_ms,
                config.reconnect.jitter_ms
            );
            println!(
                "  Stream: dedup {}, connect timeout {}s, ping every {}s",
                config.stream.dedup_threshold,
                config.stream.connect_timeout_secs,
                config.stream.ping_interval_secs
            );
            println!(
                "  Telemetry: {} ({:?}), metrics port {:?}",
                config.telemetry.log_level, config.telemetry.log_format, config.telemetry.metrics_port
            );
        }
    }

    Ok(())
}
