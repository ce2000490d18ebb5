//! Error taxonomy of the pipeline engine and its collaborators.

use shortreel_core::error::CoreError;
use shortreel_core::ffmpeg::FfmpegError;
use shortreel_core::stage::Stage;
use shortreel_core::types::ProjectId;
use shortreel_db::StoreError;

/// Failure returned by an external collaborator call.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    /// The HTTP request itself failed (network, DNS, TLS, decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote service returned a non-2xx status code.
    #[error("remote API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("media processing failed: {0}")]
    Media(#[from] FfmpegError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid blob key '{0}'")]
    InvalidKey(String),

    /// A polled job never reached a terminal state.
    #[error("job {job_id} did not finish after {attempts} polls")]
    PollTimeout { job_id: String, attempts: u32 },

    #[error("job {job_id} failed: {reason}")]
    JobFailed { job_id: String, reason: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Failure of an engine operation.
///
/// Stage-attributed variants are persisted on the project as
/// `"{STAGE} failed: {error}"`; the rest are returned to the caller.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Required credential, profile or handler is missing. Raised before any
    /// external call is made.
    #[error("missing configuration: {0}")]
    Configuration(String),

    #[error("{source}")]
    Collaborator {
        stage: Stage,
        #[source]
        source: CollaboratorError,
    },

    #[error("invalid data: {message}")]
    Validation { stage: Stage, message: String },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("Project {0} not found")]
    NotFound(ProjectId),

    /// Another run holds the project's lease.
    #[error("Project {0} is being processed by another run")]
    Busy(ProjectId),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Malformed caller input, such as a blank theme.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Attach stage context to lower-level results.
pub trait AtStage<T> {
    fn at_stage(self, stage: Stage) -> Result<T, PipelineError>;
}

impl<T> AtStage<T> for Result<T, CollaboratorError> {
    fn at_stage(self, stage: Stage) -> Result<T, PipelineError> {
        self.map_err(|source| PipelineError::Collaborator { stage, source })
    }
}

impl<T> AtStage<T> for Result<T, CoreError> {
    fn at_stage(self, stage: Stage) -> Result<T, PipelineError> {
        self.map_err(|e| PipelineError::Validation {
            stage,
            message: match e {
                CoreError::Validation(message) => message,
                other => other.to_string(),
            },
        })
    }
}
