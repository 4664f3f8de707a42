use serde::{Deserialize, Serialize};

use crate::models::Observation;

#[derive(Debug, Deserialize)]
pub struct MonitorIdRequest {
    pub monitor_id: String,
}

/// `?monitor_id=` on the history endpoints.
#[derive(Debug, Deserialize)]
pub struct MonitorQuery {
    pub monitor_id: Option<String>,
}

impl MonitorQuery {
    pub fn require(self) -> Result<String, crate::web::AppError> {
        self.monitor_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| crate::web::AppError::InvalidInput("monitor_id required".to_string()))
    }
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct BotTokenRequest {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct TestChatRequest {
    pub chat_id: String,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn with_message(message: &str) -> Self {
        Self {
            success: true,
            message: Some(message.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CheckNowResponse {
    pub success: bool,
    pub check: Observation,
}
