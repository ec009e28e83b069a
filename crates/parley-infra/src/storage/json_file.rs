//! JSON-file key-value store.
//!
//! Implements `KvStore` from `parley-core` with one `{key}.json` file per key.
//! Writes go to a sibling temp file that is then renamed over the target, so a
//! reader never sees a half-written value.

use std::path::{Path, PathBuf};

use parley_core::storage::kv_store::KvStore;
use parley_types::error::RepositoryError;
use tokio::sync::Mutex;

/// Directory of JSON documents, one per key.
pub struct JsonFileKvStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileKvStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path on disk for `key`.
    fn path_for(&self, key: &str) -> Result<PathBuf, RepositoryError> {
        if key.is_empty()
            || key.contains("..")
            || key.contains('/')
            || key.contains('\\')
        {
            return Err(RepositoryError::Query(format!("invalid key: '{key}'")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KvStore for JsonFileKvStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, RepositoryError> {
        let path = self.path_for(key)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let value = serde_json::from_str(&content).map_err(|e| {
            RepositoryError::Serialization(format!("{}: {e}", path.display()))
        })?;
        Ok(Some(value))
    }

    async fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), RepositoryError> {
        let path = self.path_for(key)?;
        let body = serde_json::to_vec_pretty(value)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

        let _guard = self.write_lock.lock().await;
        tokio::fs::create_dir_all(&self.dir).await?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &body).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        tracing::debug!(key, bytes = body.len(), "Wrote {}", path.display());
        Ok(())
    }
}
