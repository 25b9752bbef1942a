use arc_swap::ArcSwap;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tollgate::admission::AdmissionFilter;
use tollgate::config::TollgateConfig;
use tollgate::http::HttpServer;
use tollgate::license::{self, SharedSnapshot};
use tollgate::ratelimit::{BucketStore, MemoryStore, RateLimiterStore, RedisStore};

/// License-aware admission control gateway.
#[derive(Parser)]
#[command(name = "tollgate", version, about)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long)]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Starting Tollgate Admission Gateway");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let config = TollgateConfig::from_file(&args.config)?;
    info!(listen_addr = %config.server.listen_addr, "Configuration loaded");

    // The license set is required before any traffic is admitted.
    let snapshot = license::load_snapshot(Path::new(&config.license.path))?;
    info!(
        path = %config.license.path,
        clients = snapshot.client_count(),
        "License snapshot loaded"
    );
    let snapshot: SharedSnapshot = Arc::new(ArcSwap::from_pointee(snapshot));

    if config.license.reload_interval_secs > 0 {
        license::spawn_reload_task(
            PathBuf::from(&config.license.path),
            Duration::from_secs(config.license.reload_interval_secs),
            snapshot.clone(),
        );
        info!(
            interval_secs = config.license.reload_interval_secs,
            "License reload task started"
        );
    }

    let store: Arc<dyn BucketStore> = match &config.store.redis_url {
        Some(url) => {
            info!(url = %url, "Connecting to shared bucket store");
            Arc::new(RedisStore::connect(url).await?)
        }
        None => {
            warn!("No redis_url configured; buckets are local to this instance");
            Arc::new(MemoryStore::new())
        }
    };

    let limiter = Arc::new(RateLimiterStore::new(store, &config.store));
    let filter = Arc::new(AdmissionFilter::new(
        snapshot,
        limiter,
        config.store.failure_policy,
    ));

    let server = HttpServer::new(
        config.server.listen_addr,
        config.server.api_key_header.clone(),
        filter,
    );

    server.serve_with_shutdown(shutdown_signal()).await?;

    info!("Tollgate Admission Gateway stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
