//! Local JSON cache: one `{id}.json` file per project under a directory.
//!
//! Writes go through a temporary file and a rename so a crash never leaves a
//! half-written record behind.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use shortreel_core::types::ProjectId;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::project::{Lease, Project};
use crate::store::ProjectStore;

pub struct LocalCacheStore {
    dir: PathBuf,
    /// Serializes read-modify-write sequences within this process.
    write_lock: Mutex<()>,
}

impl LocalCacheStore {
    /// Open (creating if needed) a cache rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: ProjectId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    async fn read(&self, id: ProjectId) -> Result<Option<Project>, StoreError> {
        match tokio::fs::read(self.path_for(id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, project: &Project) -> Result<(), StoreError> {
        let path = self.path_for(project.id);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(project)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl ProjectStore for LocalCacheStore {
    fn name(&self) -> &'static str {
        "cache"
    }

    async fn get(&self, id: ProjectId) -> Result<Option<Project>, StoreError> {
        self.read(id).await
    }

    async fn list(&self) -> Result<Vec<Project>, StoreError> {
        let mut projects = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<Project>(&bytes) {
                Ok(project) => projects.push(project),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable cache entry");
                }
            }
        }
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(projects)
    }

    async fn put(&self, project: &Project) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.write(project).await
    }

    async fn delete(&self, id: ProjectId) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn try_acquire_lease(
        &self,
        id: ProjectId,
        lease: Lease,
        ttl: Duration,
    ) -> Result<Option<Project>, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut project = self.read(id).await?.ok_or(StoreError::NotFound(id))?;
        if !project.can_acquire_lease(lease.acquired_at, ttl) {
            return Ok(None);
        }
        project.apply_lease(lease);
        self.write(&project).await?;
        Ok(Some(project))
    }

    async fn put_leased(&self, project: &Project, token: Uuid) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let stored = self
            .read(project.id)
            .await?
            .ok_or(StoreError::NotFound(project.id))?;
        if !stored.holds_lease(token) {
            return Err(StoreError::LeaseLost(project.id));
        }
        self.write(project).await
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;
    use shortreel_core::stage::{ProjectStatus, Stage};

    use super::*;
    use crate::models::project::CreateProject;

    const TTL: Duration = Duration::from_secs(1800);

    fn project() -> Project {
        Project::new(
            CreateProject {
                channel_id: "travel".to_string(),
                theme: "Hidden beaches".to_string(),
                reference_source: Some("vid-123".to_string()),
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn round_trips_records_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalCacheStore::open(dir.path()).await.unwrap();
        let mut p = project();
        p.current_stage = Stage::Audio;
        p.error_message = Some("AUDIO failed: timeout".to_string());
        store.put(&p).await.unwrap();

        assert!(dir.path().join(format!("{}.json", p.id)).exists());
        assert_eq!(store.get(p.id).await.unwrap(), Some(p));
    }

    #[tokio::test]
    async fn missing_record_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalCacheStore::open(dir.path()).await.unwrap();
        assert_eq!(store.get(Uuid::new_v4()).await.unwrap(), None);
        assert!(!store.delete(Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn list_skips_foreign_and_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalCacheStore::open(dir.path()).await.unwrap();
        let p = project();
        store.put(&p).await.unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, p.id);
    }

    #[tokio::test]
    async fn lease_cas_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalCacheStore::open(dir.path()).await.unwrap();
        let p = project();
        store.put(&p).await.unwrap();

        let lease = Lease::new(Utc::now());
        assert!(store.try_acquire_lease(p.id, lease, TTL).await.unwrap().is_some());
        assert!(store
            .try_acquire_lease(p.id, Lease::new(Utc::now()), TTL)
            .await
            .unwrap()
            .is_none());

        let reopened = LocalCacheStore::open(dir.path()).await.unwrap();
        let stored = reopened.get(p.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ProjectStatus::Processing);
        assert_eq!(stored.lease, Some(lease));

        let mut done = stored.clone();
        done.lease = None;
        done.status = ProjectStatus::Ready;
        assert_matches!(
            reopened.put_leased(&done, Uuid::new_v4()).await,
            Err(StoreError::LeaseLost(_))
        );
        reopened.put_leased(&done, lease.token).await.unwrap();
    }

    #[tokio::test]
    async fn stale_lease_is_taken_over_and_old_holder_loses() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalCacheStore::open(dir.path()).await.unwrap();
        let p = project();
        store.put(&p).await.unwrap();

        let first = Lease::new(Utc::now() - chrono::Duration::minutes(31));
        let mut abandoned = store.try_acquire_lease(p.id, first, TTL).await.unwrap().unwrap();

        let second = Lease::new(Utc::now());
        let taken = store.try_acquire_lease(p.id, second, TTL).await.unwrap().unwrap();
        assert_eq!(taken.lease, Some(second));

        abandoned.lease = None;
        abandoned.status = ProjectStatus::Error;
        assert_matches!(
            store.put_leased(&abandoned, first.token).await,
            Err(StoreError::LeaseLost(_))
        );

        let mut finished = taken;
        finished.lease = None;
        finished.status = ProjectStatus::Ready;
        store.put_leased(&finished, second.token).await.unwrap();
        assert_eq!(store.get(p.id).await.unwrap(), Some(finished));
    }
}
