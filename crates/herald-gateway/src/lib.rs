//! # Herald Gateway
//!
//! HTTP control surface for the report pipeline. Exposes a health
//! probe, the run status with its step log, config read/update, and a
//! manual run trigger. CORS is left open so a local dashboard can call
//! the API directly.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use herald_core::{ConfigStore, Result, ScheduleConfig};
use herald_scheduler::{PipelineRunner, TriggerTable};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod routes;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    /// Live schedule config, shared with the runner and scheduler loop.
    pub config: Arc<tokio::sync::RwLock<ScheduleConfig>>,
    /// Write-through persistence for config updates.
    pub config_store: ConfigStore,
    /// Trigger table, rebuilt whenever the schedule changes.
    pub triggers: Arc<tokio::sync::Mutex<TriggerTable>>,
    pub runner: Arc<PipelineRunner>,
    pub start_time: std::time::Instant,
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let shared = Arc::new(state);

    Router::new()
        .route("/health", get(routes::health_check))
        .route("/api/v1/status", get(routes::get_status))
        .route(
            "/api/v1/config",
            get(routes::get_config).post(routes::update_config),
        )
        .route("/api/v1/run", post(routes::trigger_run))
        .layer(
            CorsLayer::new()
                .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
                .allow_headers(Any)
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

/// Start the HTTP server and serve until shutdown.
pub async fn start(state: AppState, host: &str, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🌐 Gateway listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
