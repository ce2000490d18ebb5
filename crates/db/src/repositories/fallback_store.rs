//! Dual-backend store: a durable primary mirrored to a local cache.
//!
//! Every write attempts the durable backend and then unconditionally mirrors
//! to the cache. Reads fall back to the cache when the durable backend fails.
//! When both backends return a copy of the same project, the one with the
//! newest `updated_at` wins and is re-mirrored to the other backend.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use shortreel_core::types::ProjectId;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::project::{Lease, Project};
use crate::store::{newest, ProjectStore};

pub struct FallbackStore {
    durable: Arc<dyn ProjectStore>,
    cache: Arc<dyn ProjectStore>,
}

impl FallbackStore {
    pub fn new(durable: Arc<dyn ProjectStore>, cache: Arc<dyn ProjectStore>) -> Self {
        Self { durable, cache }
    }

    async fn mirror(&self, project: &Project) {
        if let Err(e) = self.cache.put(project).await {
            tracing::warn!(
                project_id = %project.id,
                backend = self.cache.name(),
                error = %e,
                "Cache mirror write failed"
            );
        }
    }

    async fn repair_durable(&self, project: &Project) {
        if let Err(e) = self.durable.put(project).await {
            tracing::warn!(
                project_id = %project.id,
                backend = self.durable.name(),
                error = %e,
                "Durable re-mirror failed"
            );
        }
    }

    /// Pick the winning copy and push it to whichever backend is behind.
    async fn reconcile(&self, durable: Option<Project>, cached: Option<Project>) -> Option<Project> {
        match (durable, cached) {
            (Some(d), Some(c)) => {
                let winner = newest(&d, &c).clone();
                if winner.updated_at > c.updated_at {
                    self.mirror(&winner).await;
                } else if winner.updated_at > d.updated_at {
                    tracing::info!(project_id = %winner.id, "Cache copy is newer, re-mirroring to durable store");
                    self.repair_durable(&winner).await;
                }
                Some(winner)
            }
            (Some(d), None) => {
                self.mirror(&d).await;
                Some(d)
            }
            (None, Some(c)) => {
                tracing::info!(project_id = %c.id, "Project only present in cache, re-mirroring to durable store");
                self.repair_durable(&c).await;
                Some(c)
            }
            (None, None) => None,
        }
    }
}

#[async_trait]
impl ProjectStore for FallbackStore {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn get(&self, id: ProjectId) -> Result<Option<Project>, StoreError> {
        let cached = self.cache.get(id).await;
        match self.durable.get(id).await {
            Ok(durable) => {
                let cached = cached.unwrap_or_else(|e| {
                    tracing::warn!(project_id = %id, error = %e, "Cache read failed");
                    None
                });
                Ok(self.reconcile(durable, cached).await)
            }
            Err(e) => {
                tracing::warn!(project_id = %id, error = %e, "Durable read failed, serving from cache");
                cached
            }
        }
    }

    async fn list(&self) -> Result<Vec<Project>, StoreError> {
        let cached = self.cache.list().await;
        let durable = match self.durable.list().await {
            Ok(durable) => durable,
            Err(e) => {
                tracing::warn!(error = %e, "Durable list failed, serving from cache");
                return cached;
            }
        };
        let cached = cached.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Cache list failed");
            Vec::new()
        });

        let mut merged: HashMap<ProjectId, Project> =
            durable.into_iter().map(|p| (p.id, p)).collect();
        for copy in cached {
            match merged.get(&copy.id) {
                Some(existing) if existing.updated_at >= copy.updated_at => {}
                _ => {
                    merged.insert(copy.id, copy);
                }
            }
        }

        let mut projects: Vec<Project> = merged.into_values().collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(projects)
    }

    async fn put(&self, project: &Project) -> Result<(), StoreError> {
        let durable = self.durable.put(project).await;
        let cache = self.cache.put(project).await;
        match (durable, cache) {
            (Ok(()), cache) => {
                if let Err(e) = cache {
                    tracing::warn!(project_id = %project.id, error = %e, "Cache mirror write failed");
                }
                Ok(())
            }
            (Err(e), Ok(())) => {
                tracing::warn!(project_id = %project.id, error = %e, "Durable write failed, kept in cache only");
                Ok(())
            }
            (Err(e), Err(_)) => Err(e),
        }
    }

    async fn delete(&self, id: ProjectId) -> Result<bool, StoreError> {
        let durable = self.durable.delete(id).await;
        let cache = self.cache.delete(id).await;
        match (durable, cache) {
            (Ok(d), Ok(c)) => Ok(d || c),
            (Ok(d), Err(e)) => {
                tracing::warn!(project_id = %id, error = %e, "Cache delete failed");
                Ok(d)
            }
            (Err(e), Ok(c)) => {
                tracing::warn!(project_id = %id, error = %e, "Durable delete failed");
                Ok(c)
            }
            (Err(e), Err(_)) => Err(e),
        }
    }

    async fn try_acquire_lease(
        &self,
        id: ProjectId,
        lease: Lease,
        ttl: Duration,
    ) -> Result<Option<Project>, StoreError> {
        match self.durable.try_acquire_lease(id, lease, ttl).await {
            Ok(Some(project)) => {
                self.mirror(&project).await;
                Ok(Some(project))
            }
            Ok(None) => Ok(None),
            Err(StoreError::NotFound(_)) => {
                // Known only to the cache after an earlier durable outage.
                self.cache.try_acquire_lease(id, lease, ttl).await
            }
            Err(e) => {
                tracing::warn!(project_id = %id, error = %e, "Durable lease failed, leasing in cache");
                self.cache.try_acquire_lease(id, lease, ttl).await
            }
        }
    }

    async fn put_leased(&self, project: &Project, token: Uuid) -> Result<(), StoreError> {
        match self.durable.put_leased(project, token).await {
            Ok(()) => {
                self.mirror(project).await;
                Ok(())
            }
            Err(StoreError::LeaseLost(_) | StoreError::NotFound(_)) => {
                // Leased in the cache during a durable outage. Durable
                // takeovers are mirrored, so the cache token is authoritative.
                self.cache.put_leased(project, token).await?;
                self.repair_durable(project).await;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(project_id = %project.id, error = %e, "Durable final write failed, writing to cache");
                self.cache.put_leased(project, token).await
            }
        }
    }
}
