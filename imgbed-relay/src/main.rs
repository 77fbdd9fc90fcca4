//! imgbed compression relay - standalone binary
//!
//! Reads the TinyPNG key from `TINYPNG_API_KEY` (or `VITE_TINYPNG_API_KEY`)
//! and serves `POST /api/tinypng`.

use clap::Parser;
use imgbed_relay::{Compressor, TinifyClient};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on (0 for random)
    #[arg(short, long, default_value_t = 8787)]
    port: u16,

    /// Host to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Log level (overridden by RUST_LOG)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_env_file();
    let args = Args::parse();

    // Set up logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let compressor: Option<Arc<dyn Compressor>> = match config::tinypng_api_key(config::env_var) {
        Some(key) => Some(Arc::new(TinifyClient::new(&key)?)),
        None => None,
    };

    let handle = imgbed_relay::start_server_on(&args.host, args.port, compressor).await?;

    println!("Compression relay running at {}", handle.url());
    println!("Press Ctrl+C to stop");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    handle.stop();
    Ok(())
}
