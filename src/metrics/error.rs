use thiserror::Error;

use super::snapshot::MetricKind;
use crate::store::StoreError;

/// Errors returned by registry operations and the exposition renderer.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// The name is already registered under the other metric kind.
    #[error("metric '{name}' is registered as a {existing}, not a {requested}")]
    KindConflict {
        name: String,
        existing: MetricKind,
        requested: MetricKind,
    },

    /// The name is registered with a different label-name sequence.
    #[error("metric '{name}' is registered with labels {existing:?}, got {requested:?}")]
    LabelShapeConflict {
        name: String,
        existing: Vec<String>,
        requested: Vec<String>,
    },

    #[error("no {kind} named '{name}' is registered")]
    NotFound { name: String, kind: MetricKind },

    /// Counters only move up.
    #[error("invalid delta {delta} for '{name}': must be finite and non-negative")]
    InvalidDelta { name: String, delta: f64 },

    /// The sample would leave the finite range.
    #[error("adding {delta} to '{name}' would overflow its current value")]
    Overflow { name: String, delta: f64 },

    #[error("invalid value {value} for gauge '{name}': must be finite")]
    InvalidValue { name: String, value: f64 },

    #[error("invalid {what} name '{name}'")]
    InvalidName { what: &'static str, name: String },

    #[error("metric '{name}' expects {expected} label values, got {actual}")]
    LabelArityMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// The mutation could not be made durable and was discarded.
    #[error("failed to persist metrics: {0}")]
    PersistenceFailure(#[from] StoreError),

    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),
}
