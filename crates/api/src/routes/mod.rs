pub mod files;
pub mod health;
pub mod jobs;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /jobs                        submit upload (POST, multipart)
/// /jobs/{id}                   poll status (GET)
/// /jobs/{id}/artifact-url      signed download link (GET, credential)
/// ```
///
/// `upload_limit` is the largest accepted request body in bytes.
pub fn api_routes(upload_limit: usize) -> Router<AppState> {
    Router::new().nest("/jobs", jobs::router(upload_limit))
}
