//! Artifact lifecycle: write, read, best-effort delete, download links.

use std::sync::Arc;
use std::time::Duration;

use analysis_core::artifact::new_artifact_path;
use analysis_core::job_type::JobType;
use analysis_core::signing::clamp_ttl;

use crate::blob::BlobStore;
use crate::error::StorageError;

#[derive(Clone)]
pub struct ArtifactManager {
    store: Arc<dyn BlobStore>,
}

impl ArtifactManager {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Store an upload under a fresh `{job_type}/{timestamp}_{name}` path.
    pub async fn write(
        &self,
        job_type: JobType,
        original_name: &str,
        bytes: Vec<u8>,
    ) -> Result<String, StorageError> {
        let path = new_artifact_path(job_type, original_name);
        let size = bytes.len();
        self.store.put(&path, bytes).await?;
        tracing::debug!(path = %path, size, backend = self.backend_name(), "Artifact written");
        Ok(path)
    }

    pub async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.store.get(path).await
    }

    /// Delete an artifact. Failures are logged and reported as `false`.
    pub async fn delete(&self, path: &str) -> bool {
        match self.store.delete(path).await {
            Ok(()) => {
                tracing::debug!(path = %path, "Artifact deleted");
                true
            }
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "Failed to delete artifact");
                false
            }
        }
    }

    /// Time-limited read URL. `ttl_secs` defaults to one hour, capped at seven days.
    pub async fn issue_download_url(
        &self,
        path: &str,
        ttl_secs: Option<u64>,
    ) -> Result<String, StorageError> {
        let ttl = Duration::from_secs(clamp_ttl(ttl_secs));
        self.store.signed_url(path, ttl).await
    }
}
