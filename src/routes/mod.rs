//! HTTP route definitions and handlers.
//!
//! `/metrics` is always served; the `/example/*` demo routes only when
//! enabled in the configuration. Everything else answers 404.

mod examples;
mod metrics;

use axum::{middleware, Router};

use crate::hooks::request_hooks;
use crate::state::AppState;
use crate::utils::http_helpers::HTTPError;

/// Creates the application router with all configured routes.
///
/// The request hooks wrap every route, including the 404 fallback.
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new().merge(metrics::routes());
    if state.config.example_routes {
        router = router.merge(examples::routes());
    }

    router
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.hooks.clone(),
            request_hooks,
        ))
        .with_state(state)
}

async fn not_found() -> HTTPError {
    HTTPError::not_found()
}
