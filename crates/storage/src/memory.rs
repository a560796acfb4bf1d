//! Process-local blob backend. Contents are lost on restart.

use std::collections::HashMap;
use std::time::Duration;

use analysis_core::artifact::validate_artifact_path;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::blob::BlobStore;
use crate::error::StorageError;
use crate::links::LinkSigner;

pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    signer: LinkSigner,
}

impl MemoryBlobStore {
    pub fn new(signer: LinkSigner) -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            signer,
        }
    }

    pub async fn contains(&self, path: &str) -> bool {
        self.blobs.read().await.contains_key(path)
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        validate_artifact_path(path)?;
        self.blobs.write().await.insert(path.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.blobs
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.blobs
            .write()
            .await
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<String, StorageError> {
        validate_artifact_path(path)?;
        Ok(self.signer.url(path, ttl))
    }
}
