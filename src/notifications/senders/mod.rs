use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::sync::Arc;
use thiserror::Error;

pub mod telegram;
pub mod webhook;

#[derive(Error, Debug)]
pub enum SenderError {
    #[error("Failed to send notification: {0}")]
    SendFailed(String),
    #[error("Invalid configuration for sender: {0}")]
    InvalidConfiguration(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Malformed body template: {0}")]
    MalformedTemplate(String),
    #[error("Chat transport is not available")]
    TransportUnavailable,
}

/// A fully rendered outbound webhook call.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub url: String,
    pub headers: HeaderMap,
    pub body: String,
    /// Basic-auth username; sent with an empty password.
    pub basic_auth_user: Option<String>,
}

/// Delivers rendered webhook requests.
#[async_trait]
pub trait WebhookSender: Send + Sync {
    async fn send(&self, request: &WebhookRequest) -> Result<(), SenderError>;
}

/// Outbound half of a chat bot.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), SenderError>;
}

/// A validated bot connection. Dropping it stops the inbound listener it started.
pub struct ChatSession {
    pub transport: Arc<dyn ChatTransport>,
    pub bot_username: String,
    pub listener: Option<tokio::sync::watch::Sender<bool>>,
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        if let Some(shutdown) = self.listener.take() {
            let _ = shutdown.send(true);
        }
    }
}

/// Validates a bot token and brings up the bot.
#[async_trait]
pub trait ChatConnector: Send + Sync {
    async fn connect(&self, token: &str) -> Result<ChatSession, SenderError>;
}
