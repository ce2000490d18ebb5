use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use shortreel_pipeline::PipelineError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`PipelineError`] for engine failures and adds HTTP-specific
/// variants. Renders as `{ "error": ..., "code": ... }`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Pipeline(err) => classify_pipeline_error(err),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Map an engine error to an HTTP status, error code and message.
///
/// Store failures are logged and reported without detail.
fn classify_pipeline_error(err: &PipelineError) -> (StatusCode, &'static str, String) {
    match err {
        PipelineError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string()),
        PipelineError::Busy(_) => (StatusCode::CONFLICT, "BUSY", err.to_string()),
        PipelineError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        PipelineError::InvalidInput(msg) => {
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
        }
        PipelineError::Validation { .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "VALIDATION_ERROR",
            err.to_string(),
        ),
        PipelineError::Configuration(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "CONFIGURATION_ERROR",
            err.to_string(),
        ),
        PipelineError::Collaborator { .. } => {
            (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", err.to_string())
        }
        PipelineError::Store(store) => {
            tracing::error!(error = %store, "Store error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_map_to_statuses() {
        let id = uuid::Uuid::nil();
        let cases = [
            (PipelineError::NotFound(id), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (PipelineError::Busy(id), StatusCode::CONFLICT, "BUSY"),
            (
                PipelineError::Conflict("not in review".to_string()),
                StatusCode::CONFLICT,
                "CONFLICT",
            ),
            (
                PipelineError::InvalidInput("theme".to_string()),
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
            ),
        ];
        for (err, status, code) in cases {
            let (got_status, got_code, _) = classify_pipeline_error(&err);
            assert_eq!((got_status, got_code), (status, code));
        }
    }

    #[test]
    fn internal_errors_hide_detail() {
        let response = AppError::InternalError("task panicked".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = AppError::BadRequest("expected value".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
