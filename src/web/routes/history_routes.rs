use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use crate::models::{Incident, Observation, ObservationStats};
use crate::web::models::MonitorQuery;
use crate::web::{AppError, AppState};

/// Read-only history endpoints, all keyed by `?monitor_id=`.
pub fn create_history_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/checks", get(list_checks))
        .route("/stats", get(get_stats))
        .route("/incidents", get(list_incidents))
}

async fn list_checks(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<MonitorQuery>,
) -> Result<Json<Vec<Observation>>, AppError> {
    let monitor_id = query.require()?;
    Ok(Json(app_state.engine.list_checks(&monitor_id).await?))
}

async fn get_stats(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<MonitorQuery>,
) -> Result<Json<ObservationStats>, AppError> {
    let monitor_id = query.require()?;
    Ok(Json(app_state.engine.target_stats(&monitor_id).await?))
}

async fn list_incidents(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<MonitorQuery>,
) -> Result<Json<Vec<Incident>>, AppError> {
    let monitor_id = query.require()?;
    Ok(Json(app_state.engine.list_incidents(&monitor_id).await?))
}
