use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The cache backends metrics can be persisted in.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, JsonSchema)]
pub enum StoreBackend {
    /// One file per key in `cache_directory`.
    #[serde(rename = "fs")]
    Filesystem,
    /// Process memory; nothing survives a restart.
    #[serde(rename = "memory")]
    Memory,
}
