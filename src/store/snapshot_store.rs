use std::sync::Arc;

use tracing::debug;

use super::{KeyValueStore, StoreError};
use crate::metrics::Snapshot;

/// Key the serialized snapshot lives under.
pub const SNAPSHOT_KEY: &str = "metrics";

/// Loads and saves registry snapshots through a [`KeyValueStore`].
#[derive(Clone)]
pub struct SnapshotStore {
    backend: Arc<dyn KeyValueStore>,
}

impl SnapshotStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Returns the persisted snapshot, or `None` if nothing was saved yet.
    pub async fn load(&self) -> Result<Option<Snapshot>, StoreError> {
        match self.backend.get(SNAPSHOT_KEY).await? {
            Some(bytes) => {
                let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
                debug!(
                    "Loaded {} metric families from '{}' store",
                    snapshot.len(),
                    self.backend.name()
                );
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    /// Replaces the persisted snapshot.
    pub async fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(snapshot)?;
        self.backend.set(SNAPSHOT_KEY, &bytes).await
    }
}
