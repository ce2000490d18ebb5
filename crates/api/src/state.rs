use std::sync::Arc;

use shortreel_pipeline::PipelineEngine;
use tokio_util::task::TaskTracker;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<PipelineEngine>,
    /// Present when a durable database is configured.
    pub pool: Option<shortreel_db::DbPool>,
    pub config: Arc<ServerConfig>,
    /// Background pipeline runs, awaited on shutdown.
    pub runs: TaskTracker,
}
