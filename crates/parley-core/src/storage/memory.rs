//! In-memory implementations of the storage ports.
//!
//! Used for ephemeral chat sessions (`parley chat --ephemeral`) and as test
//! doubles. Nothing survives the process.

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use parley_types::error::{RepositoryError, UploadError};
use uuid::Uuid;

use super::kv_store::KvStore;
use super::object_store::ObjectStore;

/// Process-local key-value store.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: DashMap<String, serde_json::Value>,
    writes: AtomicUsize,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `set` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Overwrite a key directly, bypassing the write counter.
    pub fn insert_raw(&self, key: &str, value: serde_json::Value) {
        self.entries.insert(key.to_string(), value);
    }
}

impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, RepositoryError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), RepositoryError> {
        self.entries.insert(key.to_string(), value.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Process-local object store. URLs use the `memory://` scheme.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: DashMap<String, Vec<u8>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes stored under `storage_key`, if any.
    pub fn object(&self, storage_key: &str) -> Option<Vec<u8>> {
        self.objects
            .get(storage_key)
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectStore for MemoryObjectStore {
    async fn upload(&self, name: &str, data: &[u8]) -> Result<String, UploadError> {
        let key = format!("{}-{}", Uuid::now_v7(), name);
        self.objects.insert(key.clone(), data.to_vec());
        Ok(key)
    }

    fn public_url(&self, storage_key: &str) -> String {
        format!("memory://{storage_key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn kv_absent_key_is_none() {
        let kv = MemoryKvStore::new();
        assert!(kv.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn kv_set_overwrites_and_counts() {
        let kv = MemoryKvStore::new();
        kv.set("k", &json!({"a": 1})).await.unwrap();
        kv.set("k", &json!({"a": 2})).await.unwrap();
        assert_eq!(kv.get("k").await.unwrap(), Some(json!({"a": 2})));
        assert_eq!(kv.write_count(), 2);
    }

    #[tokio::test]
    async fn objects_are_retrievable_by_key() {
        let store = MemoryObjectStore::new();
        let key = store.upload("logo.png", b"png-bytes").await.unwrap();
        assert!(key.ends_with("logo.png"));
        assert_eq!(store.object(&key).unwrap(), b"png-bytes");
        assert_eq!(store.public_url(&key), format!("memory://{key}"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_writers_all_land() {
        let kv = std::sync::Arc::new(MemoryKvStore::new());
        let mut tasks = Vec::new();
        for i in 0..16 {
            let kv = std::sync::Arc::clone(&kv);
            tasks.push(tokio::spawn(async move {
                kv.set(&format!("k{i}"), &json!(i)).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(kv.write_count(), 16);
        assert_eq!(kv.get("k7").await.unwrap(), Some(json!(7)));
    }
}
