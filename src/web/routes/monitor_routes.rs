use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use std::sync::Arc;

use crate::engine::{TargetInput, TargetView};
use crate::models::Target;
use crate::probes::ServerState;
use crate::web::models::{ReorderRequest, SuccessResponse};
use crate::web::{AppError, AppState};

pub fn create_monitor_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_monitors).post(create_monitor))
        .route("/reorder", put(reorder_monitors))
        .route(
            "/{id}",
            get(get_monitor).put(update_monitor).delete(delete_monitor),
        )
        .route("/{id}/servers", get(get_status_api_servers))
}

async fn list_monitors(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<TargetView>>, AppError> {
    Ok(Json(app_state.engine.list_targets().await?))
}

async fn create_monitor(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<TargetInput>,
) -> Result<(StatusCode, Json<Target>), AppError> {
    let created = app_state.engine.create_target(payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_monitor(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Target>, AppError> {
    Ok(Json(app_state.engine.get_target(&id).await?))
}

async fn update_monitor(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<TargetInput>,
) -> Result<Json<Target>, AppError> {
    Ok(Json(app_state.engine.update_target(&id, payload).await?))
}

async fn delete_monitor(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    app_state.engine.delete_target(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reorder_monitors(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<ReorderRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    app_state.engine.reorder_targets(&payload.ids).await?;
    Ok(Json(SuccessResponse::ok()))
}

async fn get_status_api_servers(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ServerState>>, AppError> {
    Ok(Json(app_state.engine.status_api_servers(&id).await?))
}
