//! The repository contract shared by every persistence backend.

use std::time::Duration;

use async_trait::async_trait;
use shortreel_core::types::ProjectId;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::project::{Lease, Project};

#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    async fn get(&self, id: ProjectId) -> Result<Option<Project>, StoreError>;

    /// All projects, newest first.
    async fn list(&self) -> Result<Vec<Project>, StoreError>;

    /// Insert or fully replace a project record.
    async fn put(&self, project: &Project) -> Result<(), StoreError>;

    /// Returns `true` if a record was removed.
    async fn delete(&self, id: ProjectId) -> Result<bool, StoreError>;

    /// Compare-and-swap the lease onto a project.
    ///
    /// Succeeds when [`Project::can_acquire_lease`] holds for the stored
    /// record; the stored project is then marked `PROCESSING` and returned.
    /// Returns `Ok(None)` when another run holds a live lease or the project
    /// is not in a runnable state.
    async fn try_acquire_lease(
        &self,
        id: ProjectId,
        lease: Lease,
        ttl: Duration,
    ) -> Result<Option<Project>, StoreError>;

    /// Write `project` only while the stored record still carries `token`.
    ///
    /// This is the final write of a run; `project.lease` should already be
    /// cleared. Fails with [`StoreError::LeaseLost`] when the lease was
    /// taken over.
    async fn put_leased(&self, project: &Project, token: Uuid) -> Result<(), StoreError>;
}

/// The newer of two copies of the same record by `updated_at`, preferring
/// `primary` on ties.
pub fn newest<'a>(primary: &'a Project, secondary: &'a Project) -> &'a Project {
    if secondary.updated_at > primary.updated_at {
        secondary
    } else {
        primary
    }
}
