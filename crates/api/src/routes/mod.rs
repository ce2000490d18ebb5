pub mod health;
pub mod project;
pub mod system;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /projects                    list, create
/// /projects/{id}               get, delete
/// /projects/{id}/run           run the current stage (POST)
/// /projects/{id}/run-all       run in the background until blocked (POST)
/// /projects/{id}/approve       approve the stage awaiting review (POST)
///
/// /system/info                 host, ffmpeg and credential status
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/projects", project::router())
        .nest("/system", system::router())
}
