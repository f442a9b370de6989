//! CLI interface for price-stream
//!
//! Provides subcommands for:
//! - `watch`: Stream tickers and print periodic status
//! - `config`: Show the effective configuration

mod watch;

pub use watch::{ticker_format, WatchArgs};

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "price-stream")]
#[command(about = "Auto-reconnecting streaming ticker client")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream tickers and print periodic status
    Watch(WatchArgs),
    /// Show the effective configuration
    Config,
}
