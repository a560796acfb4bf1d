//! Serves artifacts through signed, expiring links.

use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::error::AppResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SignedLinkParams {
    pub expires: i64,
    pub signature: String,
}

/// GET /files/{*path}?expires=..&signature=..
///
/// 403 when the link is expired or its signature does not match.
pub async fn download(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(params): Query<SignedLinkParams>,
) -> AppResult<impl IntoResponse> {
    state
        .link_signer
        .verify(&path, params.expires, &params.signature)?;

    let bytes = state.artifacts.read(&path).await?;
    let file_name = path.rsplit('/').next().unwrap_or("download.csv").to_string();

    Ok((
        [
            (CONTENT_TYPE, "text/csv".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        bytes,
    ))
}
