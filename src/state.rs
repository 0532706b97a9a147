//! Shared application state.
//!
//! Contains the state that is shared across all request handlers:
//! configuration, the metrics registry and the lifecycle hooks.

use crate::config::Config;
use crate::hooks::Hooks;
use crate::metrics::Registry;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// This state is cloned for each request handler; every clone points at the
/// same registry.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration loaded at startup.
    pub config: Arc<Config>,
    /// The process-wide metrics registry.
    pub registry: Arc<Registry>,
    /// Callbacks invoked around the server lifecycle.
    pub hooks: Hooks,
}
