//! Durable store backed by the `projects` table.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shortreel_core::stage::{ProjectStatus, Stage};
use shortreel_core::stage_data::StageData;
use shortreel_core::types::{ProjectId, Timestamp};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::project::{Lease, Project};
use crate::store::ProjectStore;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, channel_id, title, theme, reference_source, current_stage, status, \
     stage_data, error_message, lease_token, lease_acquired_at, created_at, updated_at";

/// Raw `projects` row; enum columns are stored as their canonical names.
#[derive(Debug, FromRow)]
struct ProjectRow {
    id: Uuid,
    channel_id: String,
    title: String,
    theme: String,
    reference_source: Option<String>,
    current_stage: String,
    status: String,
    stage_data: Json<StageData>,
    error_message: Option<String>,
    lease_token: Option<Uuid>,
    lease_acquired_at: Option<Timestamp>,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl TryFrom<ProjectRow> for Project {
    type Error = StoreError;

    fn try_from(row: ProjectRow) -> Result<Self, Self::Error> {
        let current_stage =
            Stage::from_name(&row.current_stage).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let status =
            ProjectStatus::from_name(&row.status).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let lease = match (row.lease_token, row.lease_acquired_at) {
            (Some(token), Some(acquired_at)) => Some(Lease { token, acquired_at }),
            _ => None,
        };

        Ok(Project {
            id: row.id,
            channel_id: row.channel_id,
            title: row.title,
            theme: row.theme,
            reference_source: row.reference_source,
            current_stage,
            status,
            stage_data: row.stage_data.0,
            error_message: row.error_message,
            lease,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Provides the durable [`ProjectStore`] over Postgres.
#[derive(Clone)]
pub struct PgProjectStore {
    pool: PgPool,
}

impl PgProjectStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn exists(&self, id: ProjectId) -> Result<bool, StoreError> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM projects WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }
}

/// Leases acquired at or before the returned instant are stale.
fn stale_cutoff(acquired_at: Timestamp, ttl: Duration) -> Timestamp {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| acquired_at.checked_sub_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[async_trait]
impl ProjectStore for PgProjectStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn get(&self, id: ProjectId) -> Result<Option<Project>, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM projects WHERE id = $1");
        sqlx::query_as::<_, ProjectRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Project::try_from)
            .transpose()
    }

    async fn list(&self) -> Result<Vec<Project>, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM projects ORDER BY created_at DESC, id DESC");
        sqlx::query_as::<_, ProjectRow>(&query)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Project::try_from)
            .collect()
    }

    async fn put(&self, project: &Project) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO projects (id, channel_id, title, theme, reference_source, current_stage,
                status, stage_data, error_message, lease_token, lease_acquired_at, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             ON CONFLICT (id) DO UPDATE SET
                channel_id = EXCLUDED.channel_id,
                title = EXCLUDED.title,
                theme = EXCLUDED.theme,
                reference_source = EXCLUDED.reference_source,
                current_stage = EXCLUDED.current_stage,
                status = EXCLUDED.status,
                stage_data = EXCLUDED.stage_data,
                error_message = EXCLUDED.error_message,
                lease_token = EXCLUDED.lease_token,
                lease_acquired_at = EXCLUDED.lease_acquired_at,
                updated_at = EXCLUDED.updated_at",
        )
        .bind(project.id)
        .bind(&project.channel_id)
        .bind(&project.title)
        .bind(&project.theme)
        .bind(&project.reference_source)
        .bind(project.current_stage.name())
        .bind(project.status.name())
        .bind(Json(&project.stage_data))
        .bind(&project.error_message)
        .bind(project.lease.map(|l| l.token))
        .bind(project.lease.map(|l| l.acquired_at))
        .bind(project.created_at)
        .bind(project.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, id: ProjectId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn try_acquire_lease(
        &self,
        id: ProjectId,
        lease: Lease,
        ttl: Duration,
    ) -> Result<Option<Project>, StoreError> {
        let query = format!(
            "UPDATE projects SET
                lease_token = $2,
                lease_acquired_at = $3,
                status = 'PROCESSING',
                updated_at = $3
             WHERE id = $1 AND (
                (lease_token IS NULL AND status IN ('READY', 'ERROR') AND current_stage <> 'DONE')
                OR (lease_token IS NOT NULL AND lease_acquired_at <= $4)
             )
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, ProjectRow>(&query)
            .bind(id)
            .bind(lease.token)
            .bind(lease.acquired_at)
            .bind(stale_cutoff(lease.acquired_at, ttl))
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Project::try_from(row)?)),
            None if self.exists(id).await? => Ok(None),
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn put_leased(&self, project: &Project, token: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE projects SET
                title = $2,
                current_stage = $3,
                status = $4,
                stage_data = $5,
                error_message = $6,
                lease_token = $7,
                lease_acquired_at = $8,
                updated_at = $9
             WHERE id = $1 AND lease_token = $10",
        )
        .bind(project.id)
        .bind(&project.title)
        .bind(project.current_stage.name())
        .bind(project.status.name())
        .bind(Json(&project.stage_data))
        .bind(&project.error_message)
        .bind(project.lease.map(|l| l.token))
        .bind(project.lease.map(|l| l.acquired_at))
        .bind(project.updated_at)
        .bind(token)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            Ok(())
        } else if self.exists(project.id).await? {
            Err(StoreError::LeaseLost(project.id))
        } else {
            Err(StoreError::NotFound(project.id))
        }
    }
}
