//! Key/value record persistence.
//!
//! Records live in named collections and are addressed by key. The engine
//! only needs `read`, `update` and `list`; the concrete stores also expose
//! `create` and `delete` for the layers that own record lifecycles.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Record collections known to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Tokens,
    Checks,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Users, Collection::Tokens, Collection::Checks];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Tokens => "tokens",
            Collection::Checks => "checks",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record {collection}/{key} not found")]
    NotFound { collection: Collection, key: String },

    #[error("record {collection}/{key} already exists")]
    AlreadyExists { collection: Collection, key: String },

    #[error("invalid record key: {0:?}")]
    InvalidKey(String),

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("record is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Storage operations the monitoring engine depends on
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read one record
    async fn read(&self, collection: Collection, key: &str) -> Result<Value, StoreError>;

    /// Replace an existing record. Fails with `NotFound` if it does not exist.
    async fn update(&self, collection: Collection, key: &str, record: &Value)
        -> Result<(), StoreError>;

    /// Keys of every record in a collection
    async fn list(&self, collection: Collection) -> Result<Vec<String>, StoreError>;
}

/// Keys become file names, so anything that could escape the collection is refused
pub(crate) fn validate_key(key: &str) -> Result<(), StoreError> {
    let bad = key.is_empty()
        || key.starts_with('.')
        || key.contains(['/', '\\', '\0'])
        || key.contains("..");

    if bad { Err(StoreError::InvalidKey(key.to_string())) } else { Ok(()) }
}
