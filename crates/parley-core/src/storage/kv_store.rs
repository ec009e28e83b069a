//! Key-value store trait.
//!
//! Defines the persistence substrate for client-local state.
//! Implementations live in parley-infra.

use std::future::Future;
use std::sync::Arc;

use parley_types::error::RepositoryError;

/// Trait for durable key-value storage of JSON documents.
///
/// Absence of a key is `Ok(None)`, never an error. A `set` must replace the
/// previous value as one unit: readers observe either the old or the new
/// document, never a mix.
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait KvStore: Send + Sync {
    /// Get a value by key. Returns None if the key does not exist.
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<serde_json::Value>, RepositoryError>> + Send;

    /// Set a value for a key (upsert).
    fn set(
        &self,
        key: &str,
        value: &serde_json::Value,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

impl<K: KvStore + ?Sized> KvStore for Arc<K> {
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<serde_json::Value>, RepositoryError>> + Send {
        (**self).get(key)
    }

    fn set(
        &self,
        key: &str,
        value: &serde_json::Value,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send {
        (**self).set(key, value)
    }
}
