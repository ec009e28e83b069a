//! Local filesystem object store for attachments.
//!
//! Files land in `{data_dir}/uploads/` under a collision-free key and are
//! served back by `parley serve` at `/uploads/{key}`.

use std::path::{Path, PathBuf};

use parley_core::storage::object_store::ObjectStore;
use parley_types::error::UploadError;
use uuid::Uuid;

/// Attachment store rooted at a directory on disk.
pub struct LocalObjectStore {
    base_dir: PathBuf,
    base_url: String,
}

impl LocalObjectStore {
    /// `base_url` is the public prefix under which `base_dir` is served,
    /// e.g. `http://127.0.0.1:3000/uploads`.
    pub fn new(base_dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path on disk for a storage key.
    pub fn path_for(&self, storage_key: &str) -> PathBuf {
        self.base_dir.join(storage_key)
    }

    /// Reduce a user-supplied filename to a safe single path component.
    fn sanitize(name: &str) -> String {
        let file_name = Path::new(name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("");
        let cleaned: String = file_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let cleaned = cleaned.trim_start_matches('.');
        if cleaned.is_empty() {
            "attachment".to_string()
        } else {
            cleaned.to_string()
        }
    }
}

impl ObjectStore for LocalObjectStore {
    async fn upload(&self, name: &str, data: &[u8]) -> Result<String, UploadError> {
        if data.is_empty() {
            return Err(UploadError::EmptyPayload(name.to_string()));
        }

        tokio::fs::create_dir_all(&self.base_dir)
            .await
            .map_err(|e| UploadError::Storage(format!("failed to create uploads dir: {e}")))?;

        let key = format!("{}-{}", Uuid::now_v7().simple(), Self::sanitize(name));
        let path = self.path_for(&key);
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| UploadError::Storage(format!("failed to write {}: {e}", path.display())))?;

        tracing::debug!(key = %key, bytes = data.len(), "Stored attachment");
        Ok(key)
    }

    fn public_url(&self, storage_key: &str) -> String {
        format!("{}/{storage_key}", self.base_url)
    }
}
