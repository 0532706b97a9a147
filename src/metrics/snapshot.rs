//! The sample store: metric families and their samples, as plain data.
//!
//! A [`Snapshot`] is an ordered collection of [`MetricFamily`] values keyed by
//! fully-qualified name. Families keep their samples in first-touch order,
//! keyed by the exact label-value tuple. Nothing here performs I/O; the
//! registry owns the current snapshot and the store persists copies of it.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::error::MetricsError;

/// The metric types this registry understands.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
}

impl MetricKind {
    /// The type keyword used on `# TYPE` lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unique key of a metric family.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MetricIdentity {
    pub namespace: String,
    pub name: String,
    pub kind: MetricKind,
}

impl MetricIdentity {
    /// The exposed metric name, `namespace_name`, or just `name` without a namespace.
    pub fn fully_qualified_name(&self) -> String {
        fully_qualified_name(&self.namespace, &self.name)
    }
}

pub(crate) fn fully_qualified_name(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}_{}", namespace, name)
    }
}

/// A registered metric with its samples.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MetricFamily {
    identity: MetricIdentity,
    description: String,
    label_names: Vec<String>,
    #[serde(with = "indexmap::map::serde_seq")]
    samples: IndexMap<Vec<String>, f64>,
}

impl MetricFamily {
    pub fn new(identity: MetricIdentity, description: String, label_names: Vec<String>) -> Self {
        MetricFamily {
            identity,
            description,
            label_names,
            samples: IndexMap::new(),
        }
    }

    pub fn identity(&self) -> &MetricIdentity {
        &self.identity
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }

    pub fn kind(&self) -> MetricKind {
        self.identity.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    /// Samples in first-touch order.
    pub fn samples(&self) -> impl Iterator<Item = (&[String], f64)> {
        self.samples.iter().map(|(k, v)| (k.as_slice(), *v))
    }

    /// Current value for an exact label-value tuple, if it has been touched.
    pub fn value<S: AsRef<str>>(&self, label_values: &[S]) -> Option<f64> {
        self.samples.get(&to_key(label_values)).copied()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub(crate) fn check_arity<S: AsRef<str>>(&self, label_values: &[S]) -> Result<(), MetricsError> {
        if label_values.len() != self.label_names.len() {
            return Err(MetricsError::LabelArityMismatch {
                name: self.identity.name.clone(),
                expected: self.label_names.len(),
                actual: label_values.len(),
            });
        }
        Ok(())
    }

    /// Adds `delta` to the sample, creating it at zero on first touch, and
    /// returns the new value.
    ///
    /// Returns `None` and leaves the sample untouched when the sum is not
    /// finite.
    pub(crate) fn add<S: AsRef<str>>(&mut self, label_values: &[S], delta: f64) -> Option<f64> {
        let key = to_key(label_values);
        let next = self.samples.get(&key).copied().unwrap_or(0.0) + delta;
        if !next.is_finite() {
            return None;
        }
        self.samples.insert(key, next);
        Some(next)
    }

    pub(crate) fn put<S: AsRef<str>>(&mut self, label_values: &[S], value: f64) {
        self.samples.insert(to_key(label_values), value);
    }
}

fn to_key<S: AsRef<str>>(label_values: &[S]) -> Vec<String> {
    label_values.iter().map(|v| v.as_ref().to_string()).collect()
}

/// An immutable, independently readable copy of registry state.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    families: IndexMap<String, MetricFamily>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Families in registration order.
    pub fn families(&self) -> impl Iterator<Item = &MetricFamily> {
        self.families.values()
    }

    /// Looks a family up by its fully-qualified name.
    pub fn family(&self, fully_qualified_name: &str) -> Option<&MetricFamily> {
        self.families.get(fully_qualified_name)
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    pub(crate) fn family_mut(&mut self, fully_qualified_name: &str) -> Option<&mut MetricFamily> {
        self.families.get_mut(fully_qualified_name)
    }

    pub(crate) fn insert(&mut self, family: MetricFamily) {
        self.families
            .insert(family.identity().fully_qualified_name(), family);
    }

    /// Drops every family registered under a namespace other than
    /// `namespace`. Returns how many were dropped.
    pub(crate) fn retain_namespace(&mut self, namespace: &str) -> usize {
        let before = self.families.len();
        self.families
            .retain(|_, family| family.identity().namespace == namespace);
        before - self.families.len()
    }
}
