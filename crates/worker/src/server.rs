//! HTTP surface of the standalone worker: `POST /trigger` and `GET /health`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::error::WorkerError;
use crate::processor::JobProcessor;

#[derive(Clone)]
pub struct WorkerState {
    pub processor: Arc<JobProcessor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRequest {
    pub job_id: Uuid,
    pub dispatch_token: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerResponse {
    pub status: String,
    pub job_id: Uuid,
}

impl IntoResponse for WorkerError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            WorkerError::JobNotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),
            WorkerError::TokenMismatch(_) => {
                (StatusCode::FORBIDDEN, "FORBIDDEN", self.to_string())
            }
            WorkerError::Compute(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "COMPUTE_ERROR", msg.clone())
            }
            WorkerError::Store(e) => {
                tracing::error!(error = %e, "Job store error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message, "code": code }))).into_response()
    }
}

/// Accept a trigger and process the job on a spawned task.
async fn trigger(
    State(state): State<WorkerState>,
    Json(input): Json<TriggerRequest>,
) -> Result<(StatusCode, Json<TriggerResponse>), WorkerError> {
    state
        .processor
        .verify_trigger(input.job_id, input.dispatch_token)
        .await?;

    let processor = Arc::clone(&state.processor);
    let job_id = input.job_id;
    tokio::spawn(async move {
        match processor.process(job_id).await {
            Ok(outcome) => tracing::debug!(job_id = %job_id, ?outcome, "Processing finished"),
            Err(e) => tracing::error!(job_id = %job_id, error = %e, "Processing failed"),
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerResponse {
            status: "triggered".into(),
            job_id,
        }),
    ))
}

async fn health(State(state): State<WorkerState>) -> Response {
    match state.processor.store().health_check().await {
        Ok(()) => Json(json!({ "status": "ok" })).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
                .into_response()
        }
    }
}

pub fn router(state: WorkerState) -> Router {
    Router::new()
        .route("/trigger", post(trigger))
        .route("/health", get(health))
        .with_state(state)
}
