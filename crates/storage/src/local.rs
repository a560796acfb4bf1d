//! Filesystem blob backend rooted at `STORAGE_LOCAL_ROOT`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use analysis_core::artifact::validate_artifact_path;
use async_trait::async_trait;

use crate::blob::BlobStore;
use crate::error::StorageError;
use crate::links::LinkSigner;

pub struct LocalBlobStore {
    root: PathBuf,
    signer: LinkSigner,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, signer: LinkSigner) -> Self {
        Self {
            root: root.into(),
            signer,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        validate_artifact_path(path)?;
        Ok(self.root.join(path))
    }
}

fn not_found_or_io(path: &str, err: std::io::Error) -> StorageError {
    if err.kind() == ErrorKind::NotFound {
        StorageError::NotFound(path.to_string())
    } else {
        StorageError::Io(err)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let target = self.resolve(path)?;
        tokio::fs::read(&target)
            .await
            .map_err(|e| not_found_or_io(path, e))
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let target = self.resolve(path)?;
        tokio::fs::remove_file(&target)
            .await
            .map_err(|e| not_found_or_io(path, e))
    }

    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<String, StorageError> {
        validate_artifact_path(path)?;
        Ok(self.signer.url(path, ttl))
    }
}
