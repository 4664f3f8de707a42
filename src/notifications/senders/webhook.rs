use async_trait::async_trait;
use reqwest::{header, Client};
use std::time::Duration;

use super::{SenderError, WebhookRequest, WebhookSender};

pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// A sender for pushing notifications via a custom webhook.
pub struct HttpWebhookSender {
    client: Client,
}

impl HttpWebhookSender {
    pub fn new() -> Result<Self, SenderError> {
        let client = Client::builder().timeout(WEBHOOK_TIMEOUT).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookSender for HttpWebhookSender {
    async fn send(&self, request: &WebhookRequest) -> Result<(), SenderError> {
        let mut headers = request.headers.clone();
        if request.basic_auth_user.is_some() {
            headers.remove(header::AUTHORIZATION);
        }

        let mut request_builder = self
            .client
            .post(&request.url)
            .headers(headers)
            .body(request.body.clone());
        if let Some(username) = &request.basic_auth_user {
            request_builder = request_builder.basic_auth(username, Some(""));
        }

        let response = request_builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(SenderError::SendFailed(format!(
                "Webhook returned non-success status: {status}. Body: {error_body}"
            )));
        }

        Ok(())
    }
}
