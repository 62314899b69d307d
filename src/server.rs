/// Server setup and initialization
///
/// Wires together all components: SQLite store, workflow collection, facade,
/// and HTTP routes.

use crate::{
    api::{create_workflow_routes, AppState},
    config::Config,
    workflow::{SqliteStore, WorkflowCollection, WorkflowFacade},
};
use anyhow::Result;
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Open the store and build an initialized facade from configuration
///
/// The collection is loaded from durable storage before it is returned.
pub async fn create_facade(config: &Config) -> Result<WorkflowFacade> {
    tracing::info!("📁 Ensuring data directory exists: {}", config.storage.data_dir);
    std::fs::create_dir_all(&config.storage.data_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create data directory: {}", e))?;

    let db_path = config.database_path();
    tracing::info!("🗄️ Opening workflow store: {}", db_path.display());
    let store = SqliteStore::open(
        &db_path,
        config.storage.busy_timeout(),
        config.storage.acquire_timeout(),
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to open workflow store: {}", e))?;

    let collection = WorkflowCollection::new(config.workflows.namespace.clone(), Arc::new(store))
        .serialize_writes(config.workflows.serialize_writes);
    let facade = WorkflowFacade::new(collection);

    tracing::info!("📥 Loading existing workflows from storage");
    facade
        .init()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load workflows from storage: {}", e))?;

    Ok(facade)
}

/// Build the HTTP router around an existing facade
///
/// Mounts `/healthz` next to the workflow API. Tests drive this directly.
pub fn router(workflows: WorkflowFacade) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .merge(create_workflow_routes().with_state(AppState { workflows }))
}

/// Create the main Axum application with all routes
///
/// Opens and loads the workflow store from `config` before building the router.
pub async fn create_app(config: Config) -> Result<Router> {
    let facade = create_facade(&config).await?;

    tracing::info!("✅ Application initialized successfully");

    Ok(router(facade))
}

/// Start the HTTP server with the given configuration
///
/// Installs the log subscriber, builds the application and serves it on the
/// configured host and port until the listener fails.
pub async fn start_server(config: Config) -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting Steward workflow server...");

    let app = create_app(config.clone()).await?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Health check endpoint handler
///
/// Answers "ok" without touching storage.
async fn health_check() -> &'static str {
    "ok"
}
