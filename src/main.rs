//! Reactive HTTP demo server.
//!
//! ```text
//!     Client Request
//!     ───────────────▶ axum (request id, trace, timeout)
//!                        │
//!                        ▼
//!                  ServerRequest ──▶ route chain ──▶ Route ──▶ Response
//!                        │                                       │
//!     Client Response    ▼                                       │
//!     ◀─────────────── streamed entity ◀─────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use reactive_http::config::{load_config, ServerConfig};
use reactive_http::http::HttpServer;
use reactive_http::lifecycle::{spawn_signal_handler, Shutdown};
use reactive_http::observability::{logging, metrics};

#[derive(Debug, Parser)]
#[command(name = "reactive-http", version, about = "Reactive HTTP demo server")]
struct Cli {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability)?;
    tracing::info!("reactive-http v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        charset = %config.http.default_charset,
        max_buffered_body_bytes = config.http.max_buffered_body_bytes,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let router = reactive_http::demo::router_with(&config.http)?;
    tracing::info!(entries = router.len(), "Route chain ready");

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_rx = shutdown.subscribe();
    spawn_signal_handler(shutdown);

    HttpServer::new(config, router).run(listener, server_rx).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
