//! Ollama Farm - Model-aware proxy in front of a pool of Ollama servers

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;

use config::{Config, LoggingConfig, WorkerConfig};
use farm_api::{AppState, create_router};
use farm_core::Registry;

/// Ollama Farm - Route Ollama API requests to the worker hosting the model
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/ollama-farm.toml")]
    config: String,

    /// Bind address
    #[arg(long, env = "OLLAMA_FARM_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "OLLAMA_FARM_PORT")]
    port: Option<u16>,

    /// Additional worker URL (repeatable)
    #[arg(short, long = "worker", env = "OLLAMA_FARM_WORKERS", value_delimiter = ',')]
    workers: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let loaded = Config::load(&args.config)?;
    let found = loaded.is_some();
    let config = loaded.unwrap_or_default();

    init_logging(&config.logging);

    info!("Starting Ollama Farm v{}", env!("CARGO_PKG_VERSION"));
    if found {
        info!("Loaded configuration from {}", args.config);
    } else {
        info!("Config file not found at {}, using defaults", args.config);
    }

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    let registry = Registry::with_options(config.farm.registry_options());

    let workers = config
        .workers
        .iter()
        .cloned()
        .chain(args.workers.into_iter().map(WorkerConfig::from_url));
    for worker in workers {
        register_worker(&registry, &worker);
    }

    if registry.is_empty() {
        warn!("No workers registered, add them via POST /farm/workers");
    }

    let state = AppState::new(registry.clone());
    let app = create_router(state, Some(metrics_handle)).layer(TraceLayer::new_for_http());

    let bind_addr = args.bind.unwrap_or(config.server.bind_address);
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", bind_addr, port)
        .parse()
        .with_context(|| format!("Invalid bind address: {}:{}", bind_addr, port))?;

    info!("Listening on {}", addr);
    info!("Workers: {}", registry.len());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    registry.shutdown();
    info!("Server stopped");
    Ok(())
}

/// Register a configured worker; failures are logged and skipped
fn register_worker(registry: &Registry, worker: &WorkerConfig) {
    let properties = Some(worker.properties());
    let result = match &worker.name {
        Some(name) => registry.register(name, &worker.url, properties),
        None => registry.register_url(&worker.url, properties),
    };

    match result {
        Ok(true) => info!(
            "Registered worker {} (group '{}', priority {})",
            worker.url, worker.group, worker.priority
        ),
        Ok(false) => warn!(
            "Worker {} is configured more than once, keeping the first entry",
            worker.url
        ),
        Err(e) => warn!("Skipping worker {}: {}", worker.url, e),
    }
}

/// Initialize logging
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let subscriber = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber.with(fmt::layer()).init();
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install CTRL+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
