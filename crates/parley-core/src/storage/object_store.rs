//! Object store trait for attachment uploads.
//!
//! Implementations live in parley-infra.

use std::future::Future;
use std::sync::Arc;

use parley_types::error::UploadError;

/// Largest attachment accepted by the turn engine (10 MiB).
pub const MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;

/// Blob storage for uploaded attachments.
pub trait ObjectStore: Send + Sync {
    /// Store `data` under a new key derived from `name`. Returns the storage key.
    fn upload(
        &self,
        name: &str,
        data: &[u8],
    ) -> impl Future<Output = Result<String, UploadError>> + Send;

    /// Public URL for a previously uploaded key.
    fn public_url(&self, storage_key: &str) -> String;
}

impl<O: ObjectStore + ?Sized> ObjectStore for Arc<O> {
    fn upload(
        &self,
        name: &str,
        data: &[u8],
    ) -> impl Future<Output = Result<String, UploadError>> + Send {
        (**self).upload(name, data)
    }

    fn public_url(&self, storage_key: &str) -> String {
        (**self).public_url(storage_key)
    }
}
