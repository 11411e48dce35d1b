use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pasteguard::config::ServiceConfig;
use pasteguard::maintenance::{build_backend, spawn_expiry_job};
use pasteguard::paste::PasteStore;
use pasteguard::ratelimit::RateLimiter;
use pasteguard::service::PasteService;

/// Rate-limited paste storage service.
#[derive(Debug, Parser)]
#[command(name = "pasteguard", version, about)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long, env = "PASTEGUARD_CONFIG")]
    config: Option<String>,

    /// Delete expired pastes once and exit
    #[arg(long)]
    purge_once: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(true)
            .init();
    }

    info!("Starting Pasteguard");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = ServiceConfig::load(args.config.as_deref())?;
    info!(
        backend = ?config.storage.backend,
        cleanup_period_secs = config.paste.cleanup_period_secs,
        "Configuration loaded"
    );

    let backend = build_backend(&config.storage).await?;
    let store = PasteStore::new(backend);

    if args.purge_once {
        let removed = store.delete_expired().await?;
        info!(removed = removed, "Expired pastes purged");
        return Ok(());
    }

    let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limiting));
    info!("Rate limiter initialized");

    let service = PasteService::new(rate_limiter.clone(), store.clone(), config.paste.clone());
    info!(pastes = service.store().count().await?, "Paste service ready");

    let sweeper = rate_limiter.spawn_sweeper();
    let expiry = spawn_expiry_job(
        store,
        Duration::from_secs(config.paste.cleanup_period_secs),
    );

    shutdown_signal().await;

    sweeper.shutdown().await;
    expiry.shutdown().await;

    info!("Pasteguard stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
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
