//! Metrics exposition endpoint.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};

use super::not_found;
use crate::metrics::exposition::CONTENT_TYPE;
use crate::state::AppState;
use crate::utils::http_helpers::HTTPError;

/// Creates the metrics route. Methods other than GET fall through to 404.
pub fn routes() -> Router<AppState> {
    Router::new().route("/metrics", get(metrics_handler).fallback(not_found))
}

/// Handler for the /metrics endpoint.
///
/// Returns the registry's current state in Prometheus text format.
async fn metrics_handler(State(state): State<AppState>) -> Result<impl IntoResponse, HTTPError> {
    let body = state.registry.render()?;
    Ok((StatusCode::OK, [(header::CONTENT_TYPE, CONTENT_TYPE)], body))
}
