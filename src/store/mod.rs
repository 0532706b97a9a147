pub mod base;
pub mod fs_store;
pub mod memory_store;
pub mod snapshot_store;

// Re-export the primary store items so code outside can do
// "use crate::store::{KeyValueStore, create_store};"
pub use base::{create_store, KeyValueStore, StoreError};
pub use snapshot_store::{SnapshotStore, SNAPSHOT_KEY};
