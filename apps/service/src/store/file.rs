//! File-backed record store: one directory per collection, one JSON file per record.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{Collection, RecordStore, StoreError, validate_key};

const RECORD_EXTENSION: &str = "json";

static STAGING_SEQUENCE: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    /// Create the directory of every collection
    pub async fn ensure_collections(&self) -> Result<(), StoreError> {
        for collection in Collection::ALL {
            fs::create_dir_all(self.collection_dir(collection)).await?;
        }
        Ok(())
    }

    /// Write a new record. Fails with `AlreadyExists` if the key is taken.
    pub async fn create(
        &self,
        collection: Collection,
        key: &str,
        record: &Value,
    ) -> Result<(), StoreError> {
        let path = self.record_path(collection, key)?;
        let contents = serde_json::to_vec(record)?;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => {
                    StoreError::AlreadyExists { collection, key: key.to_string() }
                }
                _ => StoreError::Io(e),
            })?;

        file.write_all(&contents).await?;
        file.flush().await?;
        Ok(())
    }

    pub async fn delete(&self, collection: Collection, key: &str) -> Result<(), StoreError> {
        let path = self.record_path(collection, key)?;
        fs::remove_file(&path).await.map_err(|e| not_found_or_io(e, collection, key))
    }

    fn collection_dir(&self, collection: Collection) -> PathBuf {
        self.base_dir.join(collection.as_str())
    }

    /// Hidden, write-unique sibling of the record file. Never listed as a record.
    fn staging_path(&self, collection: Collection, key: &str) -> PathBuf {
        let sequence = STAGING_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        self.collection_dir(collection)
            .join(format!(".{key}.{}.{sequence}.tmp", std::process::id()))
    }

    fn record_path(&self, collection: Collection, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.collection_dir(collection).join(format!("{key}.{RECORD_EXTENSION}")))
    }
}

async fn write_and_rename(staging: &Path, target: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(staging).await?;
    file.write_all(contents).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(staging, target).await
}

fn not_found_or_io(error: std::io::Error, collection: Collection, key: &str) -> StoreError {
    match error.kind() {
        ErrorKind::NotFound => StoreError::NotFound { collection, key: key.to_string() },
        _ => StoreError::Io(error),
    }
}

#[async_trait]
impl RecordStore for FileStore {
    async fn read(&self, collection: Collection, key: &str) -> Result<Value, StoreError> {
        let path = self.record_path(collection, key)?;
        let contents = fs::read(&path).await.map_err(|e| not_found_or_io(e, collection, key))?;
        Ok(serde_json::from_slice(&contents)?)
    }

    async fn update(
        &self,
        collection: Collection,
        key: &str,
        record: &Value,
    ) -> Result<(), StoreError> {
        let path = self.record_path(collection, key)?;
        let contents = serde_json::to_vec(record)?;

        // Update never resurrects a deleted record
        fs::metadata(&path).await.map_err(|e| not_found_or_io(e, collection, key))?;

        // Readers and concurrent writers only ever see a complete record
        let staging = self.staging_path(collection, key);
        if let Err(e) = write_and_rename(&staging, &path, &contents).await {
            let _ = fs::remove_file(&staging).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn list(&self, collection: Collection) -> Result<Vec<String>, StoreError> {
        let dir = self.collection_dir(collection);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(dir = %dir.display(), "Collection directory does not exist yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == RECORD_EXTENSION) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    keys.push(stem.to_string());
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}
