//! Application startup and server initialization.
//!
//! This module builds the persistence backend and the metrics registry from
//! the configuration, wires them into the router and serves until Ctrl-C.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::Config;
use crate::hooks::Hooks;
use crate::metrics::Registry;
use crate::routes;
use crate::state::AppState;
use crate::store::{create_store, SnapshotStore};

/// Builds the shared application state: store backend, then registry.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or its saved metrics
/// cannot be read back.
pub async fn build_state(
    config: Arc<Config>,
    hooks: Hooks,
) -> Result<AppState, Box<dyn std::error::Error>> {
    let backend = create_store(&config.cache_backend, &config.cache_directory).await?;
    let registry = Registry::load(&config.metrics_namespace, SnapshotStore::new(backend)).await?;

    Ok(AppState {
        config,
        registry: Arc::new(registry),
        hooks,
    })
}

/// Initializes and runs the application server.
///
/// Binds to the configured address, runs the `on_start` hook and serves
/// requests until a shutdown signal arrives.
///
/// # Errors
///
/// Returns an error if the state cannot be built, the server fails to bind
/// to the specified address, or encounters a runtime error during execution.
pub async fn run(config: Arc<Config>, hooks: Hooks) -> Result<(), Box<dyn std::error::Error>> {
    let state = build_state(config.clone(), hooks.clone()).await?;
    let app = routes::create_router(state);

    let address = config.bind_address();
    let listener = TcpListener::bind(address).await?;

    info!("Metrics server running at http://{}", address);
    info!("/metrics instrumented for Prometheus");
    if config.example_routes {
        info!("/example/metrics sets some fake metrics");
        info!("/example/flush flushes all metrics");
        info!("/example/delay answers after a fake delay");
    }

    hooks.started();

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Metrics server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for the shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
