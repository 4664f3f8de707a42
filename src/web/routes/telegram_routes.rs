use axum::{
    extract::State,
    routing::{get, post, put},
    Json, Router,
};
use std::sync::Arc;

use crate::engine::BotStatus;
use crate::web::models::{BotTokenRequest, SuccessResponse, TestChatRequest};
use crate::web::{AppError, AppState};

pub fn create_telegram_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", get(get_status))
        .route("/token", put(set_token))
        .route("/test", post(send_test_message))
}

async fn get_status(State(app_state): State<Arc<AppState>>) -> Json<BotStatus> {
    Json(app_state.engine.bot_status().await)
}

async fn set_token(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<BotTokenRequest>,
) -> Result<Json<BotStatus>, AppError> {
    Ok(Json(app_state.engine.set_bot_token(&payload.token).await?))
}

async fn send_test_message(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<TestChatRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    app_state.engine.test_chat(&payload.chat_id).await?;
    Ok(Json(SuccessResponse::with_message("Test message sent")))
}
