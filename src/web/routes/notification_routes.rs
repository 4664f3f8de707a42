use axum::{extract::State, routing::post, Json, Router};
use std::sync::Arc;

use crate::web::models::{CheckNowResponse, MonitorIdRequest, SuccessResponse};
use crate::web::{AppError, AppState};

pub fn create_notification_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/test-webhook", post(test_webhook))
        .route("/check-now", post(check_now))
}

async fn test_webhook(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<MonitorIdRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    app_state
        .engine
        .send_test_notification(&payload.monitor_id)
        .await?;
    Ok(Json(SuccessResponse::with_message("Test webhook sent")))
}

async fn check_now(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<MonitorIdRequest>,
) -> Result<Json<CheckNowResponse>, AppError> {
    let check = app_state.engine.probe_now(&payload.monitor_id).await?;
    Ok(Json(CheckNowResponse {
        success: true,
        check,
    }))
}
