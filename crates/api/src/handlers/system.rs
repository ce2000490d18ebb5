//! Host and toolchain status for operators.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use shortreel_core::ffmpeg::{check_ffmpeg, FfmpegInfo};

use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub os: &'static str,
    pub arch: &'static str,
    pub cpus: usize,
    pub ffmpeg: FfmpegInfo,
    pub gateway_url: String,
    /// Which credentials are configured, keyed by environment variable.
    pub credentials: BTreeMap<&'static str, bool>,
    pub durable_store: bool,
}

/// GET /api/v1/system/info
pub async fn info(State(state): State<AppState>) -> Json<DataResponse<SystemInfo>> {
    let config = state.engine.config();
    let credentials = config
        .credentials
        .presence()
        .into_iter()
        .map(|(credential, present)| (credential.env_var(), present))
        .collect();

    Json(DataResponse {
        data: SystemInfo {
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            cpus: std::thread::available_parallelism().map_or(1, |n| n.get()),
            ffmpeg: check_ffmpeg().await,
            gateway_url: config.gateway_url.clone(),
            credentials,
            durable_store: state.pool.is_some(),
        },
    })
}
