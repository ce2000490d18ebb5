//! Bounded polling of asynchronous transcript-extraction jobs.
//!
//! An extraction is three calls against an [`ExtractionApi`]: submit a job,
//! poll its state at a fixed interval, then fetch the result once it has
//! succeeded. The poll budget is the only timeout; the engine adds none.

use std::sync::Arc;

use async_trait::async_trait;

use crate::collaborators::{Transcript, TranscriptExtractor};
use crate::config::PollingConfig;
use crate::error::CollaboratorError;

/// Remote state of an extraction job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed(String),
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_))
    }

    /// Interpret a wire state name. Unknown names count as still running.
    pub fn from_wire(state: &str, error: Option<String>) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "pending" | "queued" => Self::Pending,
            "succeeded" | "completed" | "done" => Self::Succeeded,
            "failed" | "error" => {
                Self::Failed(error.unwrap_or_else(|| "no reason given".to_string()))
            }
            _ => Self::Running,
        }
    }
}

/// Low-level job API of a transcript service.
#[async_trait]
pub trait ExtractionApi: Send + Sync {
    /// Start a job and return its id.
    async fn submit(&self, source: &str, token: &str) -> Result<String, CollaboratorError>;

    async fn status(&self, job_id: &str, token: &str) -> Result<JobState, CollaboratorError>;

    async fn fetch(&self, job_id: &str, token: &str) -> Result<Transcript, CollaboratorError>;
}

/// [`TranscriptExtractor`] that polls an [`ExtractionApi`] until the job ends.
pub struct PollingTranscriptExtractor {
    api: Arc<dyn ExtractionApi>,
    polling: PollingConfig,
}

impl PollingTranscriptExtractor {
    pub fn new(api: Arc<dyn ExtractionApi>, polling: PollingConfig) -> Self {
        Self { api, polling }
    }

    async fn wait_for(&self, job_id: &str, token: &str) -> Result<(), CollaboratorError> {
        for attempt in 1..=self.polling.max_polls {
            match self.api.status(job_id, token).await? {
                JobState::Succeeded => {
                    tracing::debug!(job_id, attempt, "Transcript job succeeded");
                    return Ok(());
                }
                JobState::Failed(reason) => {
                    return Err(CollaboratorError::JobFailed {
                        job_id: job_id.to_string(),
                        reason,
                    });
                }
                state => {
                    tracing::trace!(job_id, attempt, ?state, "Transcript job not finished");
                    if attempt < self.polling.max_polls {
                        tokio::time::sleep(self.polling.interval).await;
                    }
                }
            }
        }
        Err(CollaboratorError::PollTimeout {
            job_id: job_id.to_string(),
            attempts: self.polling.max_polls,
        })
    }
}

#[async_trait]
impl TranscriptExtractor for PollingTranscriptExtractor {
    async fn extract(&self, source: &str, token: &str) -> Result<Transcript, CollaboratorError> {
        let job_id = self.api.submit(source, token).await?;
        tracing::info!(source, job_id = %job_id, "Transcript job submitted");
        self.wait_for(&job_id, token).await?;
        self.api.fetch(&job_id, token).await
    }
}
