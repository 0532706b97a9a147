//! Metric registry, sample store and Prometheus exposition.
//!
//! This module owns everything with real invariants: family identity, label
//! arity, counter monotonicity and the rendered text format.

mod error;
pub mod exposition;
mod registry;
mod snapshot;

pub use error::MetricsError;
pub use registry::Registry;
pub use snapshot::{MetricFamily, MetricIdentity, MetricKind, Snapshot};
