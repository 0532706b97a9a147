//! Demo endpoints that feed the registry with sample data.

use std::time::Duration;

use axum::{extract::State, routing::get, Router};
use tracing::info;

use crate::state::AppState;
use crate::utils::http_helpers::HTTPError;

const EXAMPLE_LABELS: [&str; 2] = ["label1", "label2"];

/// Registers the `/example/*` routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/example/metrics", get(example_metrics))
        .route("/example/flush", get(example_flush))
        .route("/example/delay", get(example_delay))
}

/// Registers an example counter and gauge and records one sample in each.
async fn example_metrics(State(state): State<AppState>) -> Result<&'static str, HTTPError> {
    let registry = &state.registry;

    let counter = registry
        .register_counter("some_example_counter", "description or empty", &EXAMPLE_LABELS)
        .await?;
    registry.increment(&counter, &["a", "b"], 1.0).await?;

    let gauge = registry
        .register_gauge("some_example_gauge", "description or empty", &EXAMPLE_LABELS)
        .await?;
    registry.set(&gauge, &["a", "b"], 10.0).await?;

    Ok("done")
}

async fn example_flush(State(state): State<AppState>) -> Result<&'static str, HTTPError> {
    state.registry.flush().await?;
    Ok("done")
}

/// Answers after five seconds; handy for checking request hooks and timeouts.
async fn example_delay() -> &'static str {
    info!("Delaying example response");
    tokio::time::sleep(Duration::from_secs(5)).await;
    "done"
}
