/// Project primary keys are time-ordered UUIDs (v7).
pub type ProjectId = uuid::Uuid;

/// Channel identifiers are opaque strings owned by the profile provider.
pub type ChannelId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Generate a fresh, time-ordered project id.
pub fn new_project_id() -> ProjectId {
    uuid::Uuid::now_v7()
}
