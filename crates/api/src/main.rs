use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use shortreel_db::{DbPool, FallbackStore, LocalCacheStore, PgProjectStore, ProjectStore};
use shortreel_pipeline::{Collaborators, EngineConfig, HandlerRegistry, PipelineEngine};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shortreel_api::config::ServerConfig;
use shortreel_api::router::build_app_router;
use shortreel_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shortreel_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let engine_config = EngineConfig::from_env().expect("Invalid engine configuration");
    tracing::info!(
        gateway = %engine_config.gateway_url,
        data_dir = %engine_config.data_dir.display(),
        credentials = ?engine_config.credentials,
        "Loaded engine configuration"
    );

    // --- Persistence ---
    let (store, pool) = open_store(&engine_config).await;

    // --- Collaborators ---
    let services = Collaborators::from_config(&engine_config)
        .await
        .expect("Failed to initialise collaborators");

    // --- Event bus ---
    let event_bus = Arc::new(shortreel_events::EventBus::default());
    let cancel = CancellationToken::new();
    let logger_handle = tokio::spawn(shortreel_events::EventLogger::run(
        event_bus.subscribe(),
        cancel.clone(),
    ));
    tracing::info!("Event logger started");

    // --- Engine ---
    let engine = Arc::new(PipelineEngine::new(
        store,
        HandlerRegistry::standard(),
        services,
        Arc::new(engine_config),
        Arc::clone(&event_bus),
    ));

    let runs = TaskTracker::new();
    let state = AppState {
        engine,
        pool,
        config: Arc::new(config.clone()),
        runs: runs.clone(),
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!(in_flight = runs.len(), "Server stopped accepting connections, waiting for runs");
    runs.close();
    if tokio::time::timeout(
        Duration::from_secs(config.shutdown_timeout_secs),
        runs.wait(),
    )
    .await
    .is_err()
    {
        tracing::warn!("Background runs still in flight at shutdown; their leases will go stale");
    }

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), logger_handle).await;
    tracing::info!("Graceful shutdown complete");
}

/// Durable Postgres mirrored to the local cache when `DATABASE_URL` is set,
/// otherwise the cache alone.
async fn open_store(config: &EngineConfig) -> (Arc<dyn ProjectStore>, Option<DbPool>) {
    let cache: Arc<dyn ProjectStore> = Arc::new(
        LocalCacheStore::open(config.cache_dir())
            .await
            .expect("Failed to open local project cache"),
    );

    let Some(database_url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set, using the local cache only");
        return (cache, None);
    };

    let pool = shortreel_db::create_pool(database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    shortreel_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    shortreel_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    let durable: Arc<dyn ProjectStore> = Arc::new(PgProjectStore::new(pool.clone()));
    let store: Arc<dyn ProjectStore> = Arc::new(FallbackStore::new(durable, cache));
    (store, Some(pool))
}

/// Wait for SIGINT or SIGTERM to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
