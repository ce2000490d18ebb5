//! Handlers for the `/projects` resource.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use shortreel_core::types::ProjectId;
use shortreel_db::{CreateProject, Project};
use shortreel_pipeline::RunOutcome;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct RunResponse {
    #[serde(flatten)]
    pub outcome: RunOutcome,
    pub project: Project,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAccepted {
    pub project_id: ProjectId,
}

/// POST /api/v1/projects
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<CreateProject>, JsonRejection>,
) -> AppResult<(StatusCode, Json<DataResponse<Project>>)> {
    let Json(input) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let project = state.engine.create_project(input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: project })))
}

/// GET /api/v1/projects
pub async fn list(State(state): State<AppState>) -> AppResult<Json<DataResponse<Vec<Project>>>> {
    let projects = state.engine.list().await?;
    Ok(Json(DataResponse { data: projects }))
}

/// GET /api/v1/projects/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
) -> AppResult<Json<DataResponse<Project>>> {
    let project = state.engine.get(id).await?;
    Ok(Json(DataResponse { data: project }))
}

/// DELETE /api/v1/projects/{id}
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
) -> AppResult<StatusCode> {
    state.engine.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/projects/{id}/run
///
/// Runs the current stage and responds once it has finished.
///
/// The stage runs on its own task, so a timed-out or disconnected request
/// leaves it to finish and release the project's lease.
pub async fn run(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
) -> AppResult<Json<DataResponse<RunResponse>>> {
    let engine = state.engine.clone();
    let outcome = state
        .runs
        .spawn(async move { engine.run(id).await })
        .await
        .map_err(|e| AppError::InternalError(format!("run task for {id} failed: {e}")))??;
    let project = state.engine.get(id).await?;
    Ok(Json(DataResponse {
        data: RunResponse { outcome, project },
    }))
}

/// POST /api/v1/projects/{id}/run-all
///
/// Starts a background run that continues until the project reaches REVIEW,
/// ERROR or DONE.
pub async fn run_all(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
) -> AppResult<(StatusCode, Json<DataResponse<RunAccepted>>)> {
    state.engine.get(id).await?;

    let engine = state.engine.clone();
    state.runs.spawn(async move {
        match engine.run_until_blocked(id).await {
            Ok(outcomes) => {
                tracing::info!(project_id = %id, last = ?outcomes.last(), "Background run finished");
            }
            Err(e) => {
                tracing::warn!(project_id = %id, error = %e, "Background run stopped");
            }
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: RunAccepted { project_id: id },
        }),
    ))
}

/// POST /api/v1/projects/{id}/approve
pub async fn approve(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
) -> AppResult<Json<DataResponse<Project>>> {
    let project = state.engine.approve(id).await?;
    Ok(Json(DataResponse { data: project }))
}
