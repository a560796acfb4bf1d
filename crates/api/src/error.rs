use analysis_core::error::CoreError;
use analysis_db::StoreError;
use analysis_storage::StorageError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps the domain, store and storage errors and adds HTTP-specific
/// variants. Implements [`IntoResponse`] to produce consistent
/// `{ "error", "code" }` JSON bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The artifact could not be written during intake.
    #[error("Upload failed: {0}")]
    Upload(StorageError),

    /// The request body exceeded the transport limit before it could be read.
    #[error("Request body too large: {0}")]
    BodyTooLarge(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

type ErrorParts = (StatusCode, &'static str, String);

fn internal(context: &str, error: &dyn std::fmt::Display) -> ErrorParts {
    tracing::error!(error = %error, "{context}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

fn classify_core(core: &CoreError) -> ErrorParts {
    match core {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
        CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
        CoreError::PayloadTooLarge { .. } => (
            StatusCode::PAYLOAD_TOO_LARGE,
            "PAYLOAD_TOO_LARGE",
            core.to_string(),
        ),
        CoreError::RateLimited { .. } => (
            StatusCode::TOO_MANY_REQUESTS,
            "RATE_LIMITED",
            core.to_string(),
        ),
        CoreError::InvalidTransition { .. } => (
            StatusCode::CONFLICT,
            "INVALID_TRANSITION",
            core.to_string(),
        ),
        CoreError::Internal(msg) => internal("Internal core error", msg),
    }
}

fn classify_store(err: &StoreError) -> ErrorParts {
    match err {
        StoreError::Core(core) => classify_core(core),
        StoreError::VersionConflict { .. } => {
            (StatusCode::CONFLICT, "VERSION_CONFLICT", err.to_string())
        }
        StoreError::Database(db) => internal("Database error", db),
        StoreError::Migrate(e) => internal("Migration error", e),
    }
}

fn classify_storage(err: &StorageError) -> ErrorParts {
    match err {
        StorageError::NotFound(_) => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Artifact not found".to_string(),
        ),
        StorageError::InvalidPath(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        StorageError::Io(_) | StorageError::Backend(_) => internal("Storage error", err),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core(core),
            AppError::Store(err) => classify_store(err),
            AppError::Storage(err) => classify_storage(err),
            AppError::Upload(err) => {
                tracing::error!(error = %err, "Artifact upload failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "UPLOAD_ERROR",
                    "Failed to store the uploaded file".to_string(),
                )
            }
            AppError::BodyTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg.clone())
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => internal("Internal error", msg),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
