//! HTTP front door: translates requests into engine calls and engine results into JSON.

use axum::{extract::State, http::Method, routing::get, Json, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::engine::{MonitorEngine, ScheduleSummary};

pub mod error;
pub mod models;
pub mod routes;

pub use error::AppError;
use routes::*;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<MonitorEngine>,
}

async fn health_check_handler() -> &'static str {
    "OK"
}

/// Runs one scheduler tick on demand.
async fn trigger_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<ScheduleSummary>, AppError> {
    Ok(Json(app_state.engine.run_due_schedule().await?))
}

pub fn create_axum_router(engine: Arc<MonitorEngine>) -> Router {
    let app_state = Arc::new(AppState { engine });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_check_handler))
        .route("/trigger", get(trigger_handler))
        .nest("/api/monitors", monitor_routes::create_monitor_router())
        .nest(
            "/api/passive-webhook",
            passive_routes::create_passive_webhook_router(),
        )
        .nest("/api/telegram", telegram_routes::create_telegram_router())
        .nest(
            "/api",
            history_routes::create_history_router()
                .merge(notification_routes::create_notification_router()),
        )
        .layer(cors)
        .with_state(app_state)
}
