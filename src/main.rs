//! Iris inference service.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────────┐
//!                         │                  INFERENCE SERVICE                   │
//!                         │                                                      │
//!   Client Request        │  ┌────────────┐   ┌──────────────────┐   ┌────────┐  │
//!   ──────────────────────┼─▶│ CatchPanic │──▶│ RequestObserv-   │──▶│ routes │  │
//!                         │  │  (500)     │   │ ability (ID, log)│   │        │  │
//!                         │  └────────────┘   └────────┬─────────┘   └───┬────┘  │
//!                         │                            │                 │       │
//!                         │                            ▼                 ▼       │
//!   stdout  ◀─────────────┼──────────────── JSON log line         ModelSlot     │
//!                         │                                     (trained at     │
//!                         │                                      startup)       │
//!                         └──────────────────────────────────────────────────────┘
//! ```
//!
//! Startup order: config, logging, metrics, bind, spawn training, serve.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use inference_service::config::{load_config, Overrides};
use inference_service::lifecycle::{spawn_model_training, wait_for_termination};
use inference_service::observability::{init_logging, install_panic_hook, metrics};
use inference_service::{HttpServer, ModelSlot, Shutdown};

#[derive(Debug, Parser)]
#[command(name = "inference-service", version)]
#[command(about = "Serve Iris species predictions over HTTP", long_about = None)]
struct Args {
    /// TOML configuration file; environment variables override it
    #[arg(short, long, env = "CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Override the listener bind address
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let overrides = Overrides {
        bind_address: args.bind,
    };
    let config = load_config(args.config.as_deref(), &overrides)?;

    init_logging(&config.observability)?;
    install_panic_hook();

    tracing::info!(
        component = "lifecycle",
        "{} {} starting in {}",
        config.observability.service_name,
        config.observability.version,
        config.observability.environment
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let model = ModelSlot::new();
    spawn_model_training(model.clone(), config.model.clone());

    let shutdown = Shutdown::new();
    let stop = shutdown.subscribe();
    tokio::spawn(async move {
        wait_for_termination().await;
        shutdown.trigger();
    });

    HttpServer::new(config, model).run(listener, stop).await?;

    tracing::info!(component = "lifecycle", "shutdown complete");
    Ok(())
}
