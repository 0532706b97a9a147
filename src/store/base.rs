use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use super::{fs_store::FsStore, memory_store::MemoryStore};
use crate::config::StoreBackend;

/// Failures of the persistence medium.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The stored blob could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("invalid key '{0}'")]
    InvalidKey(String),
}

/// The KeyValueStore trait abstracts the cache medium metrics are persisted in.
///
/// Values are opaque bytes; callers own the encoding.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
    async fn has(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key).await?.is_some())
    }
    /// Backend name, for log messages.
    fn name(&self) -> &str;
}

/// Creates a concrete store implementation for the configured backend.
///
/// The filesystem backend creates `directory` if it does not exist yet.
pub async fn create_store(
    backend: &StoreBackend,
    directory: &Path,
) -> Result<Arc<dyn KeyValueStore>, StoreError> {
    match backend {
        StoreBackend::Filesystem => {
            let store = FsStore::new(directory).await?;
            info!("Filesystem backend selected at {}", directory.display());
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            info!("Memory backend selected; metrics will not survive a restart.");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
