//! Shared persistent key-value store.
//!
//! Origin-scoped string storage that survives page reloads. There is no
//! transaction across keys; readers that need a consistent view use the
//! composite record (see [`snapshot`]).

pub mod file;
pub mod memory;
pub mod snapshot;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use snapshot::{read_composite, read_discrete, write_position, write_snapshot, DiscreteState};

use std::fmt;
use std::path::PathBuf;

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Malformed record under {key:?}: {source}")]
    Malformed {
        key: String,
        source: serde_json::Error,
    },
    #[error("Failed to encode record: {0}")]
    Encode(serde_json::Error),
    #[error("Storage quota exceeded writing {0:?}")]
    QuotaExceeded(String),
}

/// Minimal get/set contract over string keys and values.
pub trait StateStore: Send + Sync + fmt::Debug {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}
