//! The stage state machine.
//!
//! [`PipelineEngine::run`] executes exactly one stage of one project:
//!
//! 1. Take the project's lease by compare-and-swap. A live lease held by
//!    another run makes this run fail fast with [`PipelineError::Busy`].
//! 2. Resolve the handler, channel profile and required credentials. Any
//!    of these missing is a configuration failure and no collaborator is
//!    called.
//! 3. Execute the handler, then merge its payload into `stageData` and either
//!    advance to the next stage or stop at REVIEW.
//! 4. Any stage failure is persisted as ERROR with a `"{STAGE} failed: ..."`
//!    message. The stage is retried from scratch by the next run.
//!
//! The final write of every run releases the lease and only lands while the
//! lease is still held.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use shortreel_core::stage::{ProjectStatus, Stage};
use shortreel_core::types::ProjectId;
use shortreel_db::{CreateProject, Lease, Project, ProjectStore, StoreError};
use shortreel_events::{event_types, EventBus, PipelineEvent};

use crate::collaborators::Collaborators;
use crate::config::EngineConfig;
use crate::error::{AtStage, PipelineError};
use crate::handlers::{HandlerRegistry, StageContext, StageOutput};

/// Longest persisted error message, in characters.
pub const MAX_ERROR_MESSAGE_CHARS: usize = 500;

/// What a single [`PipelineEngine::run`] did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The stage succeeded and the project moved on.
    Advanced { from: Stage, to: Stage },
    /// An optional stage's precondition was absent.
    Skipped { from: Stage, to: Stage },
    /// The stage's output waits for approval.
    AwaitingReview { stage: Stage },
    /// The project is at DONE.
    Completed,
    /// The stage failed; the project is now in ERROR.
    Failed { stage: Stage, message: String },
}

impl RunOutcome {
    /// Whether another `run` would make progress without outside action.
    pub fn can_continue(&self) -> bool {
        matches!(self, Self::Advanced { .. } | Self::Skipped { .. })
    }
}

enum Step {
    Skipped,
    Executed(StageOutput),
}

pub struct PipelineEngine {
    store: Arc<dyn ProjectStore>,
    registry: HandlerRegistry,
    services: Collaborators,
    config: Arc<EngineConfig>,
    events: Arc<EventBus>,
}

impl PipelineEngine {
    pub fn new(
        store: Arc<dyn ProjectStore>,
        registry: HandlerRegistry,
        services: Collaborators,
        config: Arc<EngineConfig>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            registry,
            services,
            config,
            events,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Create a project at the first stage, ready to run.
    pub async fn create_project(&self, input: CreateProject) -> Result<Project, PipelineError> {
        if input.channel_id.trim().is_empty() {
            return Err(PipelineError::InvalidInput("channelId must not be empty".to_string()));
        }
        if input.theme.trim().is_empty() {
            return Err(PipelineError::InvalidInput("theme must not be empty".to_string()));
        }

        let project = Project::new(input, Utc::now());
        self.store.put(&project).await?;

        tracing::info!(project_id = %project.id, channel_id = %project.channel_id, "Project created");
        self.events.publish(
            PipelineEvent::new(event_types::PROJECT_CREATED)
                .with_project(project.id)
                .with_payload(json!({ "channelId": project.channel_id })),
        );
        Ok(project)
    }

    pub async fn get(&self, id: ProjectId) -> Result<Project, PipelineError> {
        self.store.get(id).await?.ok_or(PipelineError::NotFound(id))
    }

    pub async fn list(&self) -> Result<Vec<Project>, PipelineError> {
        Ok(self.store.list().await?)
    }

    /// Remove a project and every blob it produced.
    pub async fn delete(&self, id: ProjectId) -> Result<(), PipelineError> {
        if !self.store.delete(id).await? {
            return Err(PipelineError::NotFound(id));
        }
        match self.services.blobs.delete_prefix(&format!("{id}/")).await {
            Ok(removed) => tracing::debug!(project_id = %id, removed, "Project blobs removed"),
            Err(e) => tracing::warn!(project_id = %id, error = %e, "Failed to remove project blobs"),
        }

        tracing::info!(project_id = %id, "Project deleted");
        self.events
            .publish(PipelineEvent::new(event_types::PROJECT_DELETED).with_project(id));
        Ok(())
    }

    /// Execute the project's current stage once.
    pub async fn run(&self, id: ProjectId) -> Result<RunOutcome, PipelineError> {
        let project = self.get(id).await?;
        if let Some(outcome) = idle_outcome(&project) {
            return Ok(outcome);
        }

        let lease = Lease::new(Utc::now());
        let acquired = self
            .store
            .try_acquire_lease(id, lease, self.config.lease_ttl)
            .await
            .map_err(|e| store_error(id, e))?;
        let Some(mut project) = acquired else {
            // Lost the race, or the project moved on since it was read.
            let project = self.get(id).await?;
            return idle_outcome(&project).ok_or(PipelineError::Busy(id));
        };

        let stage = project.current_stage;
        tracing::info!(project_id = %id, stage = %stage, "Stage started");
        self.events.publish(
            PipelineEvent::new(event_types::STAGE_STARTED)
                .with_project(id)
                .with_stage(stage),
        );

        let result = self.execute_stage(&project).await;

        project.lease = None;
        project.updated_at = Utc::now();
        let (outcome, event) = match result {
            Ok(Step::Skipped) => {
                let to = stage.next();
                project.current_stage = to;
                project.status = ProjectStatus::Ready;
                project.error_message = None;
                (RunOutcome::Skipped { from: stage, to }, event_types::STAGE_SKIPPED)
            }
            Ok(Step::Executed(output)) => {
                project.stage_data.insert_raw(stage, output.data);
                if let Some(title) = output.title {
                    project.title = title;
                }
                project.error_message = None;
                if output.review {
                    project.status = ProjectStatus::Review;
                    (RunOutcome::AwaitingReview { stage }, event_types::STAGE_REVIEW)
                } else {
                    let to = stage.next();
                    project.current_stage = to;
                    project.status = ProjectStatus::Ready;
                    (RunOutcome::Advanced { from: stage, to }, event_types::STAGE_COMPLETED)
                }
            }
            Err(e) => {
                let message = truncate_message(&format!("{stage} failed: {e}"));
                tracing::warn!(project_id = %id, stage = %stage, error = %e, "Stage failed");
                project.status = ProjectStatus::Error;
                project.error_message = Some(message.clone());
                (RunOutcome::Failed { stage, message }, event_types::STAGE_FAILED)
            }
        };

        self.store
            .put_leased(&project, lease.token)
            .await
            .map_err(|e| store_error(id, e))?;

        tracing::info!(
            project_id = %id,
            stage = %stage,
            status = project.status.name(),
            next_stage = %project.current_stage,
            "Stage finished"
        );
        self.events.publish(
            PipelineEvent::new(event)
                .with_project(id)
                .with_stage(stage)
                .with_payload(outcome_payload(&outcome)),
        );
        Ok(outcome)
    }

    /// Run stages until the project reaches REVIEW, ERROR or DONE.
    pub async fn run_until_blocked(&self, id: ProjectId) -> Result<Vec<RunOutcome>, PipelineError> {
        let mut outcomes = Vec::new();
        loop {
            let outcome = self.run(id).await?;
            let more = outcome.can_continue();
            outcomes.push(outcome);
            if !more {
                return Ok(outcomes);
            }
        }
    }

    /// Accept the output of a stage waiting at REVIEW and advance past it.
    pub async fn approve(&self, id: ProjectId) -> Result<Project, PipelineError> {
        let mut project = self.get(id).await?;
        if project.status != ProjectStatus::Review {
            return Err(PipelineError::Conflict(format!(
                "project {id} is {} and has nothing awaiting review",
                project.status.name()
            )));
        }

        let stage = project.current_stage;
        project.current_stage = stage.next();
        project.status = ProjectStatus::Ready;
        project.error_message = None;
        project.updated_at = Utc::now();
        self.store.put(&project).await?;

        tracing::info!(project_id = %id, stage = %stage, "Stage approved");
        self.events.publish(
            PipelineEvent::new(event_types::STAGE_APPROVED)
                .with_project(id)
                .with_stage(stage),
        );
        Ok(project)
    }

    async fn execute_stage(&self, project: &Project) -> Result<Step, PipelineError> {
        let stage = project.current_stage;
        let handler = self
            .registry
            .get(stage)
            .ok_or_else(|| PipelineError::Configuration(format!("no handler for stage {stage}")))?;
        if !handler.is_applicable(project) {
            tracing::info!(project_id = %project.id, stage = %stage, "Stage not applicable, skipping");
            return Ok(Step::Skipped);
        }

        let profile = self
            .services
            .profiles
            .profile(&project.channel_id)
            .await
            .at_stage(stage)?
            .ok_or_else(|| {
                PipelineError::Configuration(format!("channel profile '{}'", project.channel_id))
            })?;
        for credential in handler.required_credentials() {
            self.config.credentials.require(*credential)?;
        }

        let ctx = StageContext {
            project,
            profile: &profile,
            config: &self.config,
            services: &self.services,
        };
        let output = handler.execute(&ctx).await?;
        if output.stage != stage {
            return Err(PipelineError::Validation {
                stage,
                message: format!("handler produced {} output", output.stage),
            });
        }
        Ok(Step::Executed(output))
    }
}

/// The outcome of a project that cannot be leased because it is finished or
/// waiting for approval.
fn idle_outcome(project: &Project) -> Option<RunOutcome> {
    if project.current_stage.is_terminal() {
        Some(RunOutcome::Completed)
    } else if project.status == ProjectStatus::Review {
        Some(RunOutcome::AwaitingReview {
            stage: project.current_stage,
        })
    } else {
        None
    }
}

fn store_error(id: ProjectId, error: StoreError) -> PipelineError {
    match error {
        StoreError::NotFound(_) => PipelineError::NotFound(id),
        StoreError::LeaseLost(_) => PipelineError::Busy(id),
        other => PipelineError::Store(other),
    }
}

fn outcome_payload(outcome: &RunOutcome) -> serde_json::Value {
    match outcome {
        RunOutcome::Advanced { to, .. } | RunOutcome::Skipped { to, .. } => {
            json!({ "nextStage": to })
        }
        RunOutcome::Failed { message, .. } => json!({ "error": message }),
        RunOutcome::AwaitingReview { .. } | RunOutcome::Completed => json!({}),
    }
}

/// Cap `message` at [`MAX_ERROR_MESSAGE_CHARS`] characters, marking a cut
/// with a trailing ellipsis.
pub fn truncate_message(message: &str) -> String {
    if message.chars().count() <= MAX_ERROR_MESSAGE_CHARS {
        return message.to_string();
    }
    let mut truncated: String = message.chars().take(MAX_ERROR_MESSAGE_CHARS - 1).collect();
    truncated.push('…');
    truncated
}
