#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use shortreel_db::MemoryProjectStore;
use shortreel_events::EventBus;
use shortreel_core::profile::{AspectRatio, ChannelProfile, SubtitleStyle};
use shortreel_pipeline::{Collaborators, Credentials, EngineConfig, HandlerRegistry, PipelineEngine};
use tempfile::TempDir;
use tokio_util::task::TaskTracker;
use tower::ServiceExt;

use shortreel_api::config::ServerConfig;
use shortreel_api::router::build_app_router;
use shortreel_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
    }
}

/// The full application over an in-memory store and a scratch data
/// directory. Keep the returned [`TempDir`] alive for the test's duration.
pub async fn build_test_app() -> (Router, TempDir) {
    build_test_app_with(test_config(), Credentials::new(), |_| {}).await
}

/// Like [`build_test_app`], with server settings, credentials and
/// collaborator overrides supplied by the test.
pub async fn build_test_app_with(
    config: ServerConfig,
    credentials: Credentials,
    customize: impl FnOnce(&mut Collaborators),
) -> (Router, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let engine_config = EngineConfig {
        data_dir: dir.path().to_path_buf(),
        profiles_path: dir.path().join("profiles.json"),
        gateway_url: "http://127.0.0.1:9".to_string(),
        credentials,
        ..EngineConfig::default()
    };
    let mut services = Collaborators::from_config(&engine_config).await.unwrap();
    customize(&mut services);
    let engine = PipelineEngine::new(
        Arc::new(MemoryProjectStore::new()),
        HandlerRegistry::standard(),
        services,
        Arc::new(engine_config),
        Arc::new(EventBus::default()),
    );

    let state = AppState {
        engine: Arc::new(engine),
        pool: None,
        config: Arc::new(config.clone()),
        runs: TaskTracker::new(),
    };
    (build_app_router(state, &config), dir)
}

/// Profile for the `space` channel used across the API tests.
pub fn space_profile() -> ChannelProfile {
    ChannelProfile {
        channel_id: "space".to_string(),
        persona: "An astronomer".to_string(),
        visual_style: "cinematic".to_string(),
        voice_id: "v1".to_string(),
        subtitle_style: SubtitleStyle::default(),
        format: AspectRatio::Vertical,
    }
}

pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> Response<Body> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None).await
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn post(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::POST, uri, None).await
}

pub async fn send_raw(app: &Router, uri: &str, body: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
