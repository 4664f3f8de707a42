use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::engine::EngineError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Upstream error: {0}")]
    BadGateway(String),
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::InternalServerError(msg) => {
                error!(error = %msg, "Request failed.");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };
        (status, Json(serde_json::json!({ "error": error_message }))).into_response()
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::UnknownTarget(id) => AppError::NotFound(format!("Monitor not found: {id}")),
            EngineError::InvalidInput(msg) => AppError::InvalidInput(msg),
            EngineError::NotConfigured(msg) => AppError::Conflict(msg),
            EngineError::Probe(failure) => AppError::BadGateway(failure.to_string()),
            EngineError::Notification(e) => AppError::BadGateway(e.to_string()),
            EngineError::Store(e) => AppError::InternalServerError(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::ProbeFailure;

    #[test]
    fn test_engine_errors_map_to_status_codes() {
        let cases = [
            (EngineError::UnknownTarget("x".into()), StatusCode::NOT_FOUND),
            (EngineError::InvalidInput("bad".into()), StatusCode::BAD_REQUEST),
            (EngineError::NotConfigured("no webhook".into()), StatusCode::CONFLICT),
            (EngineError::Probe(ProbeFailure::StatusApiHttp(500)), StatusCode::BAD_GATEWAY),
        ];
        for (err, expected) in cases {
            assert_eq!(AppError::from(err).into_response().status(), expected);
        }
    }
}
