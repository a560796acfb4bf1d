use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/api/v1/jobs`.
pub fn router(upload_limit: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(jobs::submit_job).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/{id}", get(jobs::get_job_status))
        .route("/{id}/artifact-url", get(jobs::get_artifact_url))
}
