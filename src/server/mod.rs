//! HTTP server
//!
//! Serves the canvas frontend and the JSON API:
//! - `GET /health`
//! - `POST /generate` validate, build and execute a schema document
//! - `POST /lint` advisory warnings for a schema document
//! - `GET /apps` apps already present in the output directory

pub mod routes;

use std::sync::Arc;

use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;

use crate::config::RailyardConfig;
use crate::executor::{ScriptExecutor, ScriptRunner};

/// State shared by every handler
pub struct AppState {
    pub config: RailyardConfig,
    pub runner: Arc<dyn ScriptRunner>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// State backed by a real [`ScriptExecutor`]
    pub fn new(config: RailyardConfig) -> Self {
        let runner = Arc::new(ScriptExecutor::new(&config.executor));
        Self { config, runner }
    }

    pub fn with_runner(config: RailyardConfig, runner: Arc<dyn ScriptRunner>) -> Self {
        Self { config, runner }
    }
}

/// Create the application router
pub fn create_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let static_dir = state.config.server.static_dir.clone();

    let mut router = Router::new()
        .route("/health", get(routes::health))
        .route("/generate", post(routes::generate))
        .route("/lint", post(routes::lint_schema))
        .route("/apps", get(routes::apps));

    if static_dir.is_dir() {
        router = router.fallback_service(ServeDir::new(static_dir));
    }

    router.layer(cors).with_state(state)
}

/// Bind and serve until the process is stopped
pub async fn serve(config: RailyardConfig) -> anyhow::Result<()> {
    let address = config.server.bind_address();
    let output_dir = config.executor.output_path();
    let state = Arc::new(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("RailYard server running at http://{}", address);
    info!("Generated apps go to {}", output_dir.display());

    axum::serve(listener, create_router(state)).await?;
    Ok(())
}
