//! FinBug API server.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────┐
//!                     │                    FINBUG API                    │
//!                     │                                                  │
//!  Client Request     │  ┌────────────┐   ┌─────────┐   ┌─────────────┐  │
//!  ───────────────────┼─▶│ request-id │──▶│ origin  │──▶│ body parser │  │
//!                     │  │ trace, gz  │   │  gate   │   │  (10 MiB)   │  │
//!                     │  └────────────┘   └─────────┘   └──────┬──────┘  │
//!                     │                                        │         │
//!                     │                                        ▼         │
//!                     │  ┌────────────┐   ┌─────────┐   ┌─────────────┐  │
//!  Client Response    │  │   error    │   │ route   │   │  database   │  │
//!  ◀──────────────────┼──│ translation│◀──│ modules │◀──│    gate     │◀─┼── MongoDB
//!                     │  └────────────┘   └────┬────┘   └─────────────┘  │
//!                     │                        │                         │
//!                     └────────────────────────┼─────────────────────────┘
//!                                              ▼
//!                                   auth / income / expense /
//!                                   dashboard / ai / bill services
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use finbug_api::config::loader;
use finbug_api::lifecycle::{signals, Shutdown};
use finbug_api::observability::{logging, metrics};
use finbug_api::ApiServer;

#[derive(Parser, Debug)]
#[command(name = "finbug-api", version, about = "FinBug finance tracker API server")]
struct Args {
    /// Path to a TOML configuration file. Environment variables override it.
    #[arg(short, long, env = "FINBUG_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = loader::load(args.config.as_deref())?;
    logging::init(&config.observability, config.environment);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.environment,
        bind_address = %config.listener.bind_address,
        api_prefix = %config.routes.api_prefix,
        "finbug-api starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = ApiServer::from_config(config);

    let shutdown = Arc::new(Shutdown::new());
    let server_shutdown = shutdown.subscribe();
    signals::spawn_signal_handler(Arc::clone(&shutdown));

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
