use crate::job_status::JobStatus;
use crate::types::JobId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: JobId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Upload of {size} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { size: u64, max: u64 },

    #[error("Daily job limit of {limit} reached")]
    RateLimited { limit: i64 },

    #[error("Cannot transition job from '{from}' to '{to}'")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Internal error: {0}")]
    Internal(String),
}
