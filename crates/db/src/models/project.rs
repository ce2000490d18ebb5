//! Project record and DTOs.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use shortreel_core::stage::{ProjectStatus, Stage};
use shortreel_core::stage_data::StageData;
use shortreel_core::types::{new_project_id, ChannelId, ProjectId, Timestamp};
use uuid::Uuid;

/// Exclusive right of one run to mutate a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lease {
    pub token: Uuid,
    pub acquired_at: Timestamp,
}

impl Lease {
    pub fn new(acquired_at: Timestamp) -> Self {
        Self {
            token: Uuid::new_v4(),
            acquired_at,
        }
    }

    /// A lease older than `ttl` no longer protects the project.
    pub fn is_stale(&self, now: Timestamp, ttl: Duration) -> bool {
        now.signed_duration_since(self.acquired_at)
            .to_std()
            .map(|age| age >= ttl)
            .unwrap_or(false)
    }
}

/// A pipeline project as persisted by every store backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub channel_id: ChannelId,
    pub title: String,
    pub theme: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_source: Option<String>,
    pub current_stage: Stage,
    pub status: ProjectStatus,
    #[serde(default)]
    pub stage_data: StageData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease: Option<Lease>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a new project.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProject {
    pub channel_id: ChannelId,
    pub theme: String,
    /// Identifier of optional reference material (e.g. a video id).
    #[serde(default)]
    pub reference_source: Option<String>,
}

impl Project {
    /// A fresh project at the first stage, ready to run.
    pub fn new(input: CreateProject, now: Timestamp) -> Self {
        Self {
            id: new_project_id(),
            channel_id: input.channel_id,
            title: String::new(),
            theme: input.theme,
            reference_source: input
                .reference_source
                .filter(|source| !source.trim().is_empty()),
            current_stage: Stage::FIRST,
            status: ProjectStatus::Ready,
            stage_data: StageData::new(),
            error_message: None,
            lease: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a new lease may be taken at `now`.
    ///
    /// An unleased project must be runnable; a leased one only yields once
    /// its lease has gone stale.
    pub fn can_acquire_lease(&self, now: Timestamp, ttl: Duration) -> bool {
        match &self.lease {
            None => self.status.is_runnable() && !self.current_stage.is_terminal(),
            Some(lease) => lease.is_stale(now, ttl),
        }
    }

    /// Take the lease and mark the project as processing.
    pub fn apply_lease(&mut self, lease: Lease) {
        self.status = ProjectStatus::Processing;
        self.updated_at = lease.acquired_at;
        self.lease = Some(lease);
    }

    pub fn holds_lease(&self, token: Uuid) -> bool {
        self.lease.is_some_and(|lease| lease.token == token)
    }
}
