use analysis_core::error::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Invalid artifact path: {0}")]
    InvalidPath(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure reported by a remote backend (S3).
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<CoreError> for StorageError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => StorageError::InvalidPath(msg),
            other => StorageError::Backend(other.to_string()),
        }
    }
}
