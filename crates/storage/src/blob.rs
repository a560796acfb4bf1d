use std::time::Duration;

use async_trait::async_trait;

use crate::error::StorageError;

/// Key/value blob storage addressed by relative artifact paths
/// (`{job_type}/{timestamp}_{name}`).
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Short backend name for logs (`local`, `s3`, `memory`).
    fn backend_name(&self) -> &'static str;

    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<(), StorageError>;

    /// Fails with [`StorageError::NotFound`] when nothing is stored at `path`.
    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Fails with [`StorageError::NotFound`] when nothing is stored at `path`.
    async fn delete(&self, path: &str) -> Result<(), StorageError>;

    /// A URL granting read access to `path` for `ttl`.
    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<String, StorageError>;
}
