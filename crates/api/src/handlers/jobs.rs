//! Handlers for job intake, status polling and artifact links.

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use analysis_core::error::CoreError;
use analysis_core::signing::clamp_ttl;
use analysis_core::types::JobId;
use analysis_db::models::job::JobStatusView;

use crate::error::{AppError, AppResult};
use crate::intake::{IntakeReceipt, IntakeRequest};
use crate::middleware::auth::IntakeCredential;
use crate::response::DataResponse;
use crate::state::AppState;

/// Filename used when the `file` part carries none.
const FALLBACK_FILE_NAME: &str = "upload.csv";

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::BodyTooLarge(e.body_text())
    } else {
        AppError::BadRequest(e.body_text())
    }
}

/// POST /api/v1/jobs
///
/// Multipart fields: `file` (required), `job_type` (required),
/// `column_config` (optional JSON). Responds 202 once the job is recorded.
pub async fn submit_job(
    State(state): State<AppState>,
    credential: IntakeCredential,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<IntakeReceipt>>)> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut job_type: Option<String> = None;
    let mut column_config: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or(FALLBACK_FILE_NAME).to_string();
                let data = field.bytes().await.map_err(multipart_error)?;
                file = Some((filename, data.to_vec()));
            }
            "job_type" => job_type = Some(field.text().await.map_err(multipart_error)?),
            "column_config" => column_config = Some(field.text().await.map_err(multipart_error)?),
            _ => {}
        }
    }

    // Credential failures take precedence over a malformed form.
    credential.verify(&state.config.intake.secret)?;

    let (original_name, bytes) =
        file.ok_or_else(|| AppError::BadRequest("Missing required 'file' field".into()))?;
    let job_type =
        job_type.ok_or_else(|| AppError::BadRequest("Missing required 'job_type' field".into()))?;
    let column_config = column_config
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(|e| AppError::BadRequest(format!("column_config is not valid JSON: {e}")))?;

    let receipt = state
        .gateway
        .submit(IntakeRequest {
            bytes,
            original_name,
            job_type: job_type.trim().to_string(),
            credential: credential.0,
            column_config,
        })
        .await?;

    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: receipt })))
}

/// GET /api/v1/jobs/{id}
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<Json<JobStatusView>> {
    let job = state
        .store
        .get(id)
        .await?
        .ok_or(CoreError::NotFound { entity: "Job", id })?;
    Ok(Json(job.status_view()?))
}

#[derive(Debug, Deserialize)]
pub struct ArtifactUrlParams {
    pub ttl_secs: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactUrl {
    pub url: String,
    pub expires_in_secs: u64,
}

/// GET /api/v1/jobs/{id}/artifact-url?ttl_secs=N
///
/// 404 once the job's artifact has been cleaned up.
pub async fn get_artifact_url(
    State(state): State<AppState>,
    credential: IntakeCredential,
    Path(id): Path<JobId>,
    Query(params): Query<ArtifactUrlParams>,
) -> AppResult<Json<DataResponse<ArtifactUrl>>> {
    credential.verify(&state.config.intake.secret)?;

    let job = state
        .store
        .get(id)
        .await?
        .ok_or(CoreError::NotFound { entity: "Job", id })?;
    let path = job
        .input_file_path
        .ok_or(CoreError::NotFound { entity: "Artifact", id })?;

    let expires_in_secs = clamp_ttl(params.ttl_secs);
    let url = state
        .artifacts
        .issue_download_url(&path, Some(expires_in_secs))
        .await?;

    Ok(Json(DataResponse {
        data: ArtifactUrl {
            url,
            expires_in_secs,
        },
    }))
}
