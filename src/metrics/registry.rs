//! The metrics registry: the single authoritative view of all families.
//!
//! A [`Registry`] is created once per process with [`Registry::load`] and
//! shared behind an `Arc`. Mutations are applied to a copy of the current
//! snapshot, saved through the [`SnapshotStore`], and only then published.
//! Readers always see the last published snapshot in full.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::error::MetricsError;
use super::exposition::{self, is_valid_label_name, is_valid_metric_name};
use super::snapshot::{fully_qualified_name, MetricFamily, MetricIdentity, MetricKind, Snapshot};
use crate::store::SnapshotStore;

pub struct Registry {
    namespace: String,
    store: SnapshotStore,
    /// Serializes mutations, including their durable save.
    writer: Mutex<()>,
    published: RwLock<Arc<Snapshot>>,
}

impl Registry {
    /// Builds a registry for `namespace` from whatever `store` holds.
    ///
    /// The namespace is lowercased. A store with nothing saved yields an
    /// empty registry. Saved families from any other namespace are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::InvalidName`] for a namespace that is not a
    /// valid metric name prefix, and [`MetricsError::PersistenceFailure`] if
    /// the store cannot be read.
    pub async fn load(namespace: &str, store: SnapshotStore) -> Result<Self, MetricsError> {
        let namespace = namespace.to_lowercase();
        if !namespace.is_empty() && !is_valid_metric_name(&namespace) {
            return Err(MetricsError::InvalidName {
                what: "namespace",
                name: namespace,
            });
        }

        let snapshot = match store.load().await? {
            Some(mut snapshot) => {
                let dropped = snapshot.retain_namespace(&namespace);
                if dropped > 0 {
                    warn!(
                        "Dropped {} saved metric families from other namespaces than '{}'",
                        dropped, namespace
                    );
                }
                info!(
                    "Recovered {} metric families from '{}' store",
                    snapshot.len(),
                    store.backend_name()
                );
                snapshot
            }
            None => {
                info!("No saved metrics in '{}' store, starting empty", store.backend_name());
                Snapshot::new()
            }
        };

        Ok(Registry {
            namespace,
            store,
            writer: Mutex::new(()),
            published: RwLock::new(Arc::new(snapshot)),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The current state. Never blocks on persistence.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.published.read().clone()
    }

    /// Renders the current state in the Prometheus text format.
    pub fn render(&self) -> Result<String, MetricsError> {
        exposition::render(&self.snapshot())
    }

    pub async fn register_counter(
        &self,
        name: &str,
        description: &str,
        label_names: &[&str],
    ) -> Result<MetricFamily, MetricsError> {
        self.register(MetricKind::Counter, name, description, label_names)
            .await
    }

    pub async fn register_gauge(
        &self,
        name: &str,
        description: &str,
        label_names: &[&str],
    ) -> Result<MetricFamily, MetricsError> {
        self.register(MetricKind::Gauge, name, description, label_names)
            .await
    }

    /// Returns the counter named `name`, registering it first if absent.
    pub async fn get_or_register_counter(
        &self,
        name: &str,
        description: &str,
        label_names: &[&str],
    ) -> Result<MetricFamily, MetricsError> {
        self.register_counter(name, description, label_names).await
    }

    /// Returns the gauge named `name`, registering it first if absent.
    pub async fn get_or_register_gauge(
        &self,
        name: &str,
        description: &str,
        label_names: &[&str],
    ) -> Result<MetricFamily, MetricsError> {
        self.register_gauge(name, description, label_names).await
    }

    pub fn get_counter(&self, name: &str) -> Result<MetricFamily, MetricsError> {
        self.get(MetricKind::Counter, name)
    }

    pub fn get_gauge(&self, name: &str) -> Result<MetricFamily, MetricsError> {
        self.get(MetricKind::Gauge, name)
    }

    /// Adds `delta` to the sample of `family` identified by `label_values`.
    ///
    /// The sample starts at zero on first touch. Returns the new value.
    pub async fn increment<S: AsRef<str>>(
        &self,
        family: &MetricFamily,
        label_values: &[S],
        delta: f64,
    ) -> Result<f64, MetricsError> {
        self.add(family.kind(), family.name(), label_values, delta)
            .await
    }

    /// Overwrites the sample of a gauge family.
    pub async fn set<S: AsRef<str>>(
        &self,
        family: &MetricFamily,
        label_values: &[S],
        value: f64,
    ) -> Result<(), MetricsError> {
        self.put(family.kind(), family.name(), label_values, value)
            .await
    }

    /// Looks up the counter `name` and adds `delta` to one of its samples.
    pub async fn increment_counter<S: AsRef<str>>(
        &self,
        name: &str,
        label_values: &[S],
        delta: f64,
    ) -> Result<f64, MetricsError> {
        self.add(MetricKind::Counter, name, label_values, delta)
            .await
    }

    /// Looks up the gauge `name` and overwrites one of its samples.
    pub async fn set_gauge<S: AsRef<str>>(
        &self,
        name: &str,
        label_values: &[S],
        value: f64,
    ) -> Result<(), MetricsError> {
        self.put(MetricKind::Gauge, name, label_values, value).await
    }

    /// Drops every family and sample in one step.
    pub async fn flush(&self) -> Result<(), MetricsError> {
        self.mutate(|snapshot| {
            *snapshot = Snapshot::new();
            Ok(((), true))
        })
        .await?;
        info!("Flushed all metrics");
        Ok(())
    }

    async fn register(
        &self,
        kind: MetricKind,
        name: &str,
        description: &str,
        label_names: &[&str],
    ) -> Result<MetricFamily, MetricsError> {
        validate_names(name, label_names)?;
        let fqn = fully_qualified_name(&self.namespace, name);

        self.mutate(|snapshot| {
            if let Some(existing) = snapshot.family(&fqn) {
                if existing.kind() != kind {
                    return Err(MetricsError::KindConflict {
                        name: name.to_string(),
                        existing: existing.kind(),
                        requested: kind,
                    });
                }
                if existing.label_names().iter().map(String::as_str).ne(label_names.iter().copied()) {
                    return Err(MetricsError::LabelShapeConflict {
                        name: name.to_string(),
                        existing: existing.label_names().to_vec(),
                        requested: label_names.iter().map(|l| l.to_string()).collect(),
                    });
                }
                return Ok((existing.clone(), false));
            }

            let family = MetricFamily::new(
                MetricIdentity {
                    namespace: self.namespace.clone(),
                    name: name.to_string(),
                    kind,
                },
                description.to_string(),
                label_names.iter().map(|l| l.to_string()).collect(),
            );
            snapshot.insert(family.clone());
            debug!("Registered {} '{}'", kind, fqn);
            Ok((family, true))
        })
        .await
    }

    fn get(&self, kind: MetricKind, name: &str) -> Result<MetricFamily, MetricsError> {
        let snapshot = self.snapshot();
        let family = lookup(&snapshot, &self.namespace, kind, name)?;
        Ok(family.clone())
    }

    async fn add<S: AsRef<str>>(
        &self,
        kind: MetricKind,
        name: &str,
        label_values: &[S],
        delta: f64,
    ) -> Result<f64, MetricsError> {
        if !delta.is_finite() || delta < 0.0 {
            return Err(MetricsError::InvalidDelta {
                name: name.to_string(),
                delta,
            });
        }

        self.mutate(|snapshot| {
            let family = lookup_mut(snapshot, &self.namespace, kind, name)?;
            family.check_arity(label_values)?;
            let value = family
                .add(label_values, delta)
                .ok_or_else(|| MetricsError::Overflow {
                    name: name.to_string(),
                    delta,
                })?;
            Ok((value, true))
        })
        .await
    }

    async fn put<S: AsRef<str>>(
        &self,
        kind: MetricKind,
        name: &str,
        label_values: &[S],
        value: f64,
    ) -> Result<(), MetricsError> {
        if kind != MetricKind::Gauge {
            return Err(MetricsError::KindConflict {
                name: name.to_string(),
                existing: kind,
                requested: MetricKind::Gauge,
            });
        }
        if !value.is_finite() {
            return Err(MetricsError::InvalidValue {
                name: name.to_string(),
                value,
            });
        }

        self.mutate(|snapshot| {
            let family = lookup_mut(snapshot, &self.namespace, kind, name)?;
            family.check_arity(label_values)?;
            family.put(label_values, value);
            Ok(((), true))
        })
        .await
    }

    /// Applies `change` to a copy of the current snapshot. When `change`
    /// reports a modification, the copy is saved and then published; a failed
    /// save leaves the published state untouched.
    async fn mutate<T, F>(&self, change: F) -> Result<T, MetricsError>
    where
        F: FnOnce(&mut Snapshot) -> Result<(T, bool), MetricsError>,
    {
        let _writer = self.writer.lock().await;

        let mut next = Snapshot::clone(&self.snapshot());
        let (output, changed) = change(&mut next)?;
        if !changed {
            return Ok(output);
        }

        if let Err(e) = self.store.save(&next).await {
            warn!("Discarding metrics mutation, save failed: {}", e);
            return Err(e.into());
        }
        *self.published.write() = Arc::new(next);
        Ok(output)
    }
}

fn validate_names(name: &str, label_names: &[&str]) -> Result<(), MetricsError> {
    if !is_valid_metric_name(name) {
        return Err(MetricsError::InvalidName {
            what: "metric",
            name: name.to_string(),
        });
    }
    for (i, label) in label_names.iter().enumerate() {
        if !is_valid_label_name(label) || label_names[..i].contains(label) {
            return Err(MetricsError::InvalidName {
                what: "label",
                name: label.to_string(),
            });
        }
    }
    Ok(())
}

fn lookup<'a>(
    snapshot: &'a Snapshot,
    namespace: &str,
    kind: MetricKind,
    name: &str,
) -> Result<&'a MetricFamily, MetricsError> {
    match snapshot.family(&fully_qualified_name(namespace, name)) {
        Some(family) if family.kind() == kind => Ok(family),
        Some(family) => Err(MetricsError::KindConflict {
            name: name.to_string(),
            existing: family.kind(),
            requested: kind,
        }),
        None => Err(MetricsError::NotFound {
            name: name.to_string(),
            kind,
        }),
    }
}

fn lookup_mut<'a>(
    snapshot: &'a mut Snapshot,
    namespace: &str,
    kind: MetricKind,
    name: &str,
) -> Result<&'a mut MetricFamily, MetricsError> {
    lookup(snapshot, namespace, kind, name)?;
    snapshot
        .family_mut(&fully_qualified_name(namespace, name))
        .ok_or_else(|| MetricsError::NotFound {
            name: name.to_string(),
            kind,
        })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::store::memory_store::MemoryStore;
    use crate::store::{KeyValueStore, StoreError};

    /// A store whose writes can be made to fail on demand.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        failing: AtomicBool,
    }

    #[async_trait]
    impl KeyValueStore for FlakyStore {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::Io(std::io::Error::other("disk full")));
            }
            self.inner.set(key, value).await
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    async fn registry() -> Registry {
        Registry::load("app", SnapshotStore::new(Arc::new(MemoryStore::new())))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_counter_increments_accumulate_and_render() {
        let registry = registry().await;
        let family = registry
            .register_counter("http_requests_total", "Total requests", &["method", "status"])
            .await
            .unwrap();

        registry.increment(&family, &["GET", "200"], 1.0).await.unwrap();
        let value = registry.increment(&family, &["GET", "200"], 2.0).await.unwrap();
        assert_eq!(value, 3.0);

        let rendered = registry.render().unwrap();
        assert!(rendered.contains("app_http_requests_total{method=\"GET\",status=\"200\"} 3\n"));
    }

    #[tokio::test]
    async fn test_gauge_set_overwrites_and_renders_canonically() {
        let registry = registry().await;
        let family = registry.register_gauge("queue_depth", "", &[]).await.unwrap();
        let no_labels: [&str; 0] = [];

        registry.set(&family, &no_labels, 5.0).await.unwrap();
        registry.set(&family, &no_labels, 5.0).await.unwrap();

        assert!(registry.render().unwrap().contains("\napp_queue_depth 5\n"));

        registry.set(&family, &no_labels, -1.5).await.unwrap();
        assert!(registry.render().unwrap().contains("\napp_queue_depth -1.5\n"));
    }

    #[tokio::test]
    async fn test_register_identical_is_noop_and_conflicts_are_reported() {
        let registry = registry().await;
        let first = registry.register_counter("x", "first", &["a", "b"]).await.unwrap();
        let again = registry.register_counter("x", "ignored", &["a", "b"]).await.unwrap();
        assert_eq!(first, again);
        assert_eq!(registry.snapshot().len(), 1);

        assert!(matches!(
            registry.register_gauge("x", "", &["a", "b"]).await,
            Err(MetricsError::KindConflict {
                existing: MetricKind::Counter,
                requested: MetricKind::Gauge,
                ..
            })
        ));
        assert!(matches!(
            registry.register_counter("x", "", &["b", "a"]).await,
            Err(MetricsError::LabelShapeConflict { .. })
        ));
        assert!(matches!(
            registry.get_or_register_counter("x", "", &["a"]).await,
            Err(MetricsError::LabelShapeConflict { .. })
        ));
        assert!(registry.get_or_register_counter("x", "", &["a", "b"]).await.is_ok());
    }

    #[tokio::test]
    async fn test_get_reports_not_found_and_kind_conflict() {
        let registry = registry().await;
        assert!(matches!(
            registry.get_counter("missing"),
            Err(MetricsError::NotFound { .. })
        ));

        registry.register_counter("hits_total", "", &[]).await.unwrap();
        assert!(registry.get_counter("hits_total").is_ok());
        assert!(matches!(
            registry.get_gauge("hits_total"),
            Err(MetricsError::KindConflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_get_or_register_gauge_creates_once() {
        let registry = registry().await;
        let created = registry
            .get_or_register_gauge("temperature", "Room temperature", &["room"])
            .await
            .unwrap();
        let fetched = registry.get_gauge("temperature").unwrap();
        assert_eq!(created.identity(), fetched.identity());
        assert_eq!(fetched.description(), "Room temperature");
    }

    #[tokio::test]
    async fn test_arity_and_delta_are_validated() {
        let registry = registry().await;
        let family = registry.register_counter("c_total", "", &["a", "b"]).await.unwrap();

        assert!(matches!(
            registry.increment(&family, &["v1"], 1.0).await,
            Err(MetricsError::LabelArityMismatch {
                expected: 2,
                actual: 1,
                ..
            })
        ));
        assert!(matches!(
            registry.increment(&family, &["v1", "v2"], -1.0).await,
            Err(MetricsError::InvalidDelta { .. })
        ));
        assert!(matches!(
            registry.increment(&family, &["v1", "v2"], f64::NAN).await,
            Err(MetricsError::InvalidDelta { .. })
        ));
        assert_eq!(registry.snapshot().family("app_c_total").unwrap().sample_count(), 0);
    }

    #[tokio::test]
    async fn test_set_rejects_counters_and_non_finite_values() {
        let registry = registry().await;
        let counter = registry.register_counter("c_total", "", &[]).await.unwrap();
        let gauge = registry.register_gauge("g", "", &[]).await.unwrap();
        let no_labels: [&str; 0] = [];

        assert!(matches!(
            registry.set(&counter, &no_labels, 1.0).await,
            Err(MetricsError::KindConflict { .. })
        ));
        assert!(matches!(
            registry.set(&gauge, &no_labels, f64::INFINITY).await,
            Err(MetricsError::InvalidValue { .. })
        ));
    }

    #[tokio::test]
    async fn test_name_based_helpers() {
        let registry = registry().await;
        registry.register_counter("jobs_total", "", &["queue"]).await.unwrap();
        registry.register_gauge("workers", "", &["queue"]).await.unwrap();

        registry.increment_counter("jobs_total", &["default"], 1.0).await.unwrap();
        registry.increment_counter("jobs_total", &["default"], 1.0).await.unwrap();
        registry.set_gauge("workers", &["default"], 4.0).await.unwrap();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.family("app_jobs_total").unwrap().value(&["default"]), Some(2.0));
        assert_eq!(snapshot.family("app_workers").unwrap().value(&["default"]), Some(4.0));

        assert!(matches!(
            registry.set_gauge("jobs_total", &["default"], 1.0).await,
            Err(MetricsError::KindConflict { .. })
        ));
        assert!(matches!(
            registry.increment_counter("nope", &["default"], 1.0).await,
            Err(MetricsError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_names_are_rejected() {
        let registry = registry().await;
        assert!(matches!(
            registry.register_counter("bad-name", "", &[]).await,
            Err(MetricsError::InvalidName { what: "metric", .. })
        ));
        assert!(matches!(
            registry.register_counter("ok", "", &["a", "a"]).await,
            Err(MetricsError::InvalidName { what: "label", .. })
        ));
        assert!(matches!(
            Registry::load("bad ns", SnapshotStore::new(Arc::new(MemoryStore::new()))).await,
            Err(MetricsError::InvalidName { what: "namespace", .. })
        ));
    }

    #[tokio::test]
    async fn test_flush_clears_everything() {
        let registry = registry().await;
        let family = registry.register_counter("c_total", "", &[]).await.unwrap();
        let no_labels: [&str; 0] = [];
        registry.increment(&family, &no_labels, 1.0).await.unwrap();

        registry.flush().await.unwrap();

        assert!(registry.snapshot().is_empty());
        assert_eq!(registry.render().unwrap(), "");
        assert!(matches!(
            registry.increment(&family, &no_labels, 1.0).await,
            Err(MetricsError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_save_discards_mutation() {
        let backend = Arc::new(FlakyStore::default());
        let registry = Registry::load("app", SnapshotStore::new(backend.clone()))
            .await
            .unwrap();
        let family = registry.register_counter("c_total", "", &[]).await.unwrap();
        let no_labels: [&str; 0] = [];
        registry.increment(&family, &no_labels, 1.0).await.unwrap();

        backend.failing.store(true, Ordering::SeqCst);
        assert!(matches!(
            registry.increment(&family, &no_labels, 5.0).await,
            Err(MetricsError::PersistenceFailure(_))
        ));
        assert!(matches!(
            registry.register_gauge("g", "", &[]).await,
            Err(MetricsError::PersistenceFailure(_))
        ));
        assert!(matches!(
            registry.flush().await,
            Err(MetricsError::PersistenceFailure(_))
        ));

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.family("app_c_total").unwrap().value(&no_labels), Some(1.0));

        backend.failing.store(false, Ordering::SeqCst);
        assert_eq!(registry.increment(&family, &no_labels, 5.0).await.unwrap(), 6.0);
    }

    #[tokio::test]
    async fn test_state_survives_a_new_registry_over_the_same_store() {
        let backend: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let first = Registry::load("app", SnapshotStore::new(backend.clone()))
            .await
            .unwrap();
        first.register_counter("c_total", "help", &["k"]).await.unwrap();
        first.increment_counter("c_total", &["v"], 7.0).await.unwrap();

        let second = Registry::load("app", SnapshotStore::new(backend)).await.unwrap();
        assert_eq!(second.snapshot(), first.snapshot());
        assert_eq!(second.render().unwrap(), first.render().unwrap());
    }

    #[tokio::test]
    async fn test_overflowing_increment_is_rejected_and_store_stays_loadable() {
        let backend: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let registry = Registry::load("app", SnapshotStore::new(backend.clone()))
            .await
            .unwrap();
        let family = registry.register_counter("big_total", "", &[]).await.unwrap();
        let no_labels: [&str; 0] = [];

        assert_eq!(
            registry.increment(&family, &no_labels, f64::MAX).await.unwrap(),
            f64::MAX
        );
        assert!(matches!(
            registry.increment(&family, &no_labels, f64::MAX).await,
            Err(MetricsError::Overflow { .. })
        ));
        assert_eq!(
            registry.snapshot().family("app_big_total").unwrap().value(&no_labels),
            Some(f64::MAX)
        );
        assert!(!registry.render().unwrap().contains("+Inf"));

        let reloaded = Registry::load("app", SnapshotStore::new(backend)).await.unwrap();
        assert_eq!(reloaded.snapshot(), registry.snapshot());
    }

    #[tokio::test]
    async fn test_reload_under_another_namespace_drops_old_families() {
        let backend: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let first = Registry::load("a", SnapshotStore::new(backend.clone()))
            .await
            .unwrap();
        first.register_counter("x", "", &[]).await.unwrap();
        first.register_counter("b_c", "", &[]).await.unwrap();

        let second = Registry::load("b", SnapshotStore::new(backend.clone()))
            .await
            .unwrap();
        assert!(second.snapshot().is_empty());
        assert_eq!(second.render().unwrap(), "");
        assert!(matches!(
            second.get_counter("x"),
            Err(MetricsError::NotFound { .. })
        ));

        second.register_counter("x", "", &[]).await.unwrap();
        assert!(second.render().unwrap().contains("# TYPE b_x counter\n"));
        assert!(!second.render().unwrap().contains("a_x"));

        let third = Registry::load("a_b", SnapshotStore::new(backend)).await.unwrap();
        third.register_gauge("c", "", &[]).await.unwrap();
        assert_eq!(third.snapshot().len(), 1);
        assert!(third.get_gauge("c").is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_not_lost() {
        let registry = Arc::new(registry().await);
        registry.register_counter("hits_total", "", &[]).await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..32 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                let no_labels: [&str; 0] = [];
                for _ in 0..10 {
                    registry
                        .increment_counter("hits_total", &no_labels, 1.0)
                        .await
                        .unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let no_labels: [&str; 0] = [];
        assert_eq!(
            registry.snapshot().family("app_hits_total").unwrap().value(&no_labels),
            Some(320.0)
        );
    }
}
