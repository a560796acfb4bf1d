//! Blob backend selection from the environment.

use std::path::PathBuf;
use std::sync::Arc;

use analysis_core::error::CoreError;

use crate::blob::BlobStore;
use crate::links::LinkSigner;
use crate::local::LocalBlobStore;
use crate::memory::MemoryBlobStore;
use crate::s3::S3BlobStore;

pub const DEFAULT_BUCKET: &str = "analysis-uploads";
pub const DEFAULT_LOCAL_ROOT: &str = "storage/uploads";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackendType {
    Local,
    S3,
    Memory,
}

impl StorageBackendType {
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "local" => Ok(Self::Local),
            "s3" => Ok(Self::S3),
            "memory" => Ok(Self::Memory),
            other => Err(CoreError::Validation(format!(
                "Unknown storage backend '{other}'. Must be one of: local, s3, memory"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackendType,
    pub bucket: String,
    pub local_root: PathBuf,
    pub signing_secret: String,
    pub public_base_url: String,
}

impl StorageConfig {
    /// Load from environment variables with sensible defaults.
    ///
    /// `STORAGE_SIGNING_SECRET` falls back to `fallback_secret`.
    ///
    /// # Panics
    ///
    /// Panics on an unknown `STORAGE_BACKEND`.
    pub fn from_env(fallback_secret: &str, public_base_url: &str) -> Self {
        let backend = std::env::var("STORAGE_BACKEND").unwrap_or_else(|_| "local".into());
        let backend = StorageBackendType::from_name(&backend)
            .unwrap_or_else(|e| panic!("STORAGE_BACKEND: {e}"));

        Self {
            backend,
            bucket: std::env::var("STORAGE_BUCKET").unwrap_or_else(|_| DEFAULT_BUCKET.into()),
            local_root: std::env::var("STORAGE_LOCAL_ROOT")
                .unwrap_or_else(|_| DEFAULT_LOCAL_ROOT.into())
                .into(),
            signing_secret: std::env::var("STORAGE_SIGNING_SECRET")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| fallback_secret.to_string()),
            public_base_url: public_base_url.to_string(),
        }
    }

    pub fn link_signer(&self) -> LinkSigner {
        LinkSigner::new(&self.public_base_url, &self.signing_secret)
    }

    /// Construct the configured backend.
    pub async fn build(&self) -> Arc<dyn BlobStore> {
        match self.backend {
            StorageBackendType::Local => Arc::new(LocalBlobStore::new(
                self.local_root.clone(),
                self.link_signer(),
            )),
            StorageBackendType::S3 => Arc::new(S3BlobStore::from_env(&self.bucket).await),
            StorageBackendType::Memory => Arc::new(MemoryBlobStore::new(self.link_signer())),
        }
    }
}
