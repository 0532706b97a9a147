//! Lifecycle hook points the HTTP boundary invokes around the registry.

use std::fmt;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

/// A hook callback. Hooks run inline and must not block for long.
pub type Hook = Arc<dyn Fn() + Send + Sync>;

/// Optional callbacks run at server start and around every request.
#[derive(Clone, Default)]
pub struct Hooks {
    /// Runs once, after the listener is bound and before serving.
    pub on_start: Option<Hook>,
    /// Runs before each request is handled.
    pub on_request_start: Option<Hook>,
    /// Runs after each request is handled, before the response is sent.
    pub on_request_end: Option<Hook>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_start(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_start = Some(Arc::new(hook));
        self
    }

    pub fn on_request_start(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_request_start = Some(Arc::new(hook));
        self
    }

    pub fn on_request_end(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_request_end = Some(Arc::new(hook));
        self
    }

    pub(crate) fn started(&self) {
        if let Some(hook) = &self.on_start {
            hook();
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_start", &self.on_start.is_some())
            .field("on_request_start", &self.on_request_start.is_some())
            .field("on_request_end", &self.on_request_end.is_some())
            .finish()
    }
}

/// Middleware wrapping each request with the request hooks.
pub async fn request_hooks(State(hooks): State<Hooks>, request: Request, next: Next) -> Response {
    if let Some(hook) = &hooks.on_request_start {
        hook();
    }
    let response = next.run(request).await;
    if let Some(hook) = &hooks.on_request_end {
        hook();
    }
    response
}
