//! Scan gateway.
//!
//! Accepts multipart uploads over HTTP and runs each one through an external
//! antivirus engine, never running more engines at once than configured.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client                ┌──────────────────────── SCAN GATEWAY ─────────────────────────┐
//!     POST /scan  ─────────▶│  http (request id, CORS, body limit, timeout)                  │
//!                           │      │                                                         │
//!                           │      ▼                                                         │
//!                           │  scan::admission ──▶ scan::multipart ──▶ scan::engine ──┐      │
//!                           │   (slot per scan)     (`file` part)      (stdin pipe)   │      │──▶ clamscan
//!                           │                                                         ▼      │
//!     JSON verdict ◀────────│  scan::result ◀──────────────────────────────── scan::verdict   │
//!                           │                                                                │
//!                           │  config · observability · lifecycle                            │
//!                           └────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use scan_gateway::config::loader::load_config;
use scan_gateway::lifecycle::signals::spawn_signal_handler;
use scan_gateway::observability::{logging, metrics};
use scan_gateway::{HttpServer, ScanConfig, Shutdown};

#[derive(Parser)]
#[command(name = "scan-gateway", version, about = "Bounded-concurrency virus scan gateway")]
struct Args {
    /// TOML configuration file. Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ScanConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability);
    tracing::info!("scan-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        config_file = ?args.config,
        bind_address = %config.listener.bind_address,
        max_body_size = config.limits.max_body_size,
        max_concurrent_scans = config.limits.effective_concurrency(),
        request_timeout_secs = config.timeouts.request_secs,
        scan_timeout_secs = config.timeouts.scan_secs,
        engine = %config.engine.program,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(config);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
