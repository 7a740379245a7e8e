//! memstash - write-back JSON document cache server
//!
//! Serves one cache instance over a filesystem backing store.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use memstash::api::{create_router, AppState};
use memstash::config::ServerConfig;

/// Main entry point for the memstash server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the cache context and a filesystem-backed instance
/// 4. Start HTTP server on configured port
/// 5. On SIGINT/SIGTERM, stop accepting requests and flush pending writes
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "memstash=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting memstash server");

    let config = ServerConfig::from_env();
    info!(
        "Configuration loaded: max_memory_usage={:?}, drain_interval={}ms, max_batch_size={}, port={}, data_dir={}",
        config.cache.max_memory_usage,
        config.cache.drain_interval.as_millis(),
        config.cache.max_batch_size,
        config.server_port,
        config.data_dir.display()
    );

    let state = AppState::from_config(&config).context("Invalid cache configuration")?;
    let context = state.context().clone();
    info!("Cache initialized");

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Pending writes must reach disk before exiting
    context.flush().await;
    let stats = context.stats().await;
    info!(
        writes_flushed = stats.writes_flushed,
        deletes_flushed = stats.deletes_flushed,
        "Server shutdown complete"
    );
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
