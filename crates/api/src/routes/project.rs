//! Route definitions for the `/projects` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::project;
use crate::state::AppState;

/// Routes mounted at `/projects`.
///
/// ```text
/// GET    /               -> list
/// POST   /               -> create
/// GET    /{id}           -> get_by_id
/// DELETE /{id}           -> delete
/// POST   /{id}/run       -> run
/// POST   /{id}/run-all   -> run_all
/// POST   /{id}/approve   -> approve
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(project::list).post(project::create))
        .route("/{id}", get(project::get_by_id).delete(project::delete))
        .route("/{id}/run", post(project::run))
        .route("/{id}/run-all", post(project::run_all))
        .route("/{id}/approve", post(project::approve))
}
