use axum::routing::get;
use axum::Router;

use crate::handlers::files;
use crate::state::AppState;

/// Signed artifact downloads (root level, not under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/files/{*path}", get(files::download))
}
