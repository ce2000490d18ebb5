//! In-process store used by tests and database-less runs.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use shortreel_core::types::ProjectId;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::project::{Lease, Project};
use crate::store::ProjectStore;

/// Thread-safe via interior `RwLock`; share it behind an `Arc`.
#[derive(Default)]
pub struct MemoryProjectStore {
    projects: RwLock<HashMap<ProjectId, Project>>,
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectStore for MemoryProjectStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, id: ProjectId) -> Result<Option<Project>, StoreError> {
        Ok(self.projects.read().await.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Project>, StoreError> {
        let mut projects: Vec<Project> = self.projects.read().await.values().cloned().collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(projects)
    }

    async fn put(&self, project: &Project) -> Result<(), StoreError> {
        self.projects
            .write()
            .await
            .insert(project.id, project.clone());
        Ok(())
    }

    async fn delete(&self, id: ProjectId) -> Result<bool, StoreError> {
        Ok(self.projects.write().await.remove(&id).is_some())
    }

    async fn try_acquire_lease(
        &self,
        id: ProjectId,
        lease: Lease,
        ttl: Duration,
    ) -> Result<Option<Project>, StoreError> {
        let mut projects = self.projects.write().await;
        let project = projects.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if !project.can_acquire_lease(lease.acquired_at, ttl) {
            return Ok(None);
        }
        project.apply_lease(lease);
        Ok(Some(project.clone()))
    }

    async fn put_leased(&self, project: &Project, token: Uuid) -> Result<(), StoreError> {
        let mut projects = self.projects.write().await;
        let stored = projects
            .get_mut(&project.id)
            .ok_or(StoreError::NotFound(project.id))?;
        if !stored.holds_lease(token) {
            return Err(StoreError::LeaseLost(project.id));
        }
        *stored = project.clone();
        Ok(())
    }
}
