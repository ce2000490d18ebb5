use shortreel_core::types::ProjectId;

/// Failure of a [`crate::ProjectStore`] backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Project {0} not found")]
    NotFound(ProjectId),

    /// The caller's lease was taken over or cleared before its final write.
    #[error("Lease on project {0} is no longer held")]
    LeaseLost(ProjectId),

    #[error("Stored record is corrupt: {0}")]
    Corrupt(String),
}
