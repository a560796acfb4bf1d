//! AWS S3 blob backend.
//!
//! Credentials and region come from the standard AWS environment chain.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;

use crate::blob::BlobStore;
use crate::error::StorageError;

pub struct S3BlobStore {
    client: S3Client,
    bucket: String,
}

impl S3BlobStore {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from the ambient AWS configuration.
    pub async fn from_env(bucket: impl Into<String>) -> Self {
        let config = aws_config::load_from_env().await;
        Self::new(S3Client::new(&config), bucket)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn backend_error(context: &str, key: &str, err: impl std::error::Error) -> StorageError {
    StorageError::Backend(format!("{context} s3 object {key}: {}", DisplayErrorContext(err)))
}

#[async_trait]
impl BlobStore for S3BlobStore {
    fn backend_name(&self) -> &'static str {
        "s3"
    }

    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .body(ByteStream::from(bytes))
            .content_type("text/csv")
            .send()
            .await
            .map_err(|e| backend_error("Failed to write", path, e))?;
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| match e.into_service_error() {
                GetObjectError::NoSuchKey(_) => StorageError::NotFound(path.to_string()),
                other => backend_error("Failed to read", path, other),
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| backend_error("Failed to stream", path, e))?
            .into_bytes()
            .to_vec();
        Ok(data)
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| backend_error("Failed to delete", path, e))?;
        Ok(())
    }

    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<String, StorageError> {
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|e| StorageError::Backend(format!("Invalid presign duration: {e}")))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .presigned(presigning)
            .await
            .map_err(|e| backend_error("Failed to presign", path, e))?;
        Ok(request.uri().to_string())
    }
}
