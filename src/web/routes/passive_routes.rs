use axum::{extract::State, routing::get, routing::post, Json, Router};
use std::sync::Arc;

use crate::engine::PassiveWebhookSettings;
use crate::ingestion::{IngestOutcome, PassiveWebhookPayload};
use crate::web::{AppError, AppState};

pub fn create_passive_webhook_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(ingest_alert))
        .route("/settings", get(get_settings).put(update_settings))
}

async fn ingest_alert(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<PassiveWebhookPayload>,
) -> Result<Json<IngestOutcome>, AppError> {
    Ok(Json(app_state.engine.ingest_passive_webhook(&payload).await?))
}

async fn get_settings(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<PassiveWebhookSettings>, AppError> {
    Ok(Json(app_state.engine.passive_webhook_settings().await?))
}

async fn update_settings(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<PassiveWebhookSettings>,
) -> Result<Json<PassiveWebhookSettings>, AppError> {
    Ok(Json(
        app_state.engine.set_passive_webhook_settings(payload).await?,
    ))
}
