//! In-process record store, used when embedding the engine and in tests.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{Collection, RecordStore, StoreError};

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<Collection, HashMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a record
    pub async fn insert(&self, collection: Collection, key: impl Into<String>, record: Value) {
        self.records.write().await.entry(collection).or_default().insert(key.into(), record);
    }

    pub async fn remove(&self, collection: Collection, key: &str) -> Option<Value> {
        self.records.write().await.get_mut(&collection)?.remove(key)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn read(&self, collection: Collection, key: &str) -> Result<Value, StoreError> {
        self.records
            .read()
            .await
            .get(&collection)
            .and_then(|records| records.get(key))
            .cloned()
            .ok_or_else(|| StoreError::NotFound { collection, key: key.to_string() })
    }

    async fn update(
        &self,
        collection: Collection,
        key: &str,
        record: &Value,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        match records.get_mut(&collection).and_then(|records| records.get_mut(key)) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound { collection, key: key.to_string() }),
        }
    }

    async fn list(&self, collection: Collection) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<String> = self
            .records
            .read()
            .await
            .get(&collection)
            .map(|records| records.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_update_requires_existing_record() {
        let store = MemoryStore::new();
        let err = store.update(Collection::Checks, "x", &json!({})).await.unwrap_err();
        assert!(err.is_not_found());

        store.insert(Collection::Checks, "x", json!({ "state": "down" })).await;
        store.update(Collection::Checks, "x", &json!({ "state": "up" })).await.unwrap();
        assert_eq!(store.read(Collection::Checks, "x").await.unwrap(), json!({ "state": "up" }));
    }

    #[tokio::test]
    async fn test_collections_are_separate() {
        let store = MemoryStore::new();
        store.insert(Collection::Checks, "c1", json!({})).await;
        store.insert(Collection::Tokens, "t1", json!({})).await;

        assert_eq!(store.list(Collection::Checks).await.unwrap(), vec!["c1"]);
        assert!(store.read(Collection::Checks, "t1").await.unwrap_err().is_not_found());

        assert!(store.remove(Collection::Tokens, "t1").await.is_some());
        assert!(store.list(Collection::Tokens).await.unwrap().is_empty());
    }
}
