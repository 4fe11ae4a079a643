//! Foundry HTTP API Server
//!
//! REST endpoints for publishing plugin versions and downloading their
//! artifacts, backed by SQLite metadata and a pluggable blob store.

use axum::{Router, extract::DefaultBodyLimit, response::Json, routing::get};
use foundry_registry::{Database, Registry, storage};
use serde_json::{Value, json};
use std::{net::SocketAddr, sync::Arc};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

mod config;
mod error;
mod models;
mod routes;

use config::ServerConfig;
use error::Result;

/// Main application state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub config: ServerConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "foundry_server=debug,tower_http=debug".to_string()),
        )
        .init();

    // Load configuration
    let config = ServerConfig::from_env()?;
    info!(
        "Starting Foundry Server on {}:{}",
        config.host, config.port
    );

    // The backend is decided once here; a misconfigured backend aborts
    // startup instead of degrading at request time.
    let blob_storage = storage::connect(&config.storage).await?;
    info!(driver = ?config.storage.driver, "connected blob storage");

    let db = Database::new(&config.database_url).await?;

    let registry = Arc::new(Registry::new(db, blob_storage, config.registry_config()));

    let state = AppState {
        registry,
        config: config.clone(),
    };

    let max_upload_bytes = config.max_upload_bytes;
    let app = create_router(state, max_upload_bytes);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| error::ApiError::Config(format!("invalid bind address: {}", e)))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the main application router
fn create_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // API routes
        .nest("/api/v1", api_routes())
        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .with_state(state)
}

/// API routes
fn api_routes() -> Router<AppState> {
    Router::new().nest("/plugins", routes::plugins::router())
}

/// Health check endpoint
async fn health_check() -> Result<Json<Value>> {
    Ok(Json(json!({
        "status": "healthy",
        "service": "foundry-server",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": time::OffsetDateTime::now_utc()
    })))
}
