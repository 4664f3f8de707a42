//! Renders and delivers transition notifications.
//!
//! Delivery is best effort: one attempt, bounded, and failures end up in the log
//! rather than in the caller's control flow. Only [`NotificationDispatcher::try_send_webhook`]
//! surfaces the error, for the manual test button.

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::models::{TemplateVariables, TransitionKind};
use super::senders::webhook::WEBHOOK_TIMEOUT;
use super::senders::{ChatTransport, SenderError, WebhookRequest, WebhookSender};
use super::template::render_template;
use crate::models::{Observation, Target, WebhookConfig, DEFAULT_WEBHOOK_CONTENT_TYPE};

/// The payload sent when a target has no body template.
pub fn default_payload(vars: &TemplateVariables, kind: TransitionKind) -> Value {
    let message = match kind {
        TransitionKind::Recovered => format!("✅ {} is back UP!", vars.monitor_name),
        TransitionKind::Down | TransitionKind::Test => {
            format!("🚨 {} is DOWN! {}", vars.monitor_name, vars.error)
        }
    };
    json!({
        "monitor": vars.monitor_name,
        "url": vars.monitor_url,
        "status": vars.status,
        "timestamp": vars.timestamp,
        "response_time": vars.response_time,
        "status_code": vars.status_code,
        "error": vars.error,
        "message": message,
    })
}

/// Short text for the chat side channel.
pub fn chat_summary(target: &Target, observation: &Observation, kind: TransitionKind) -> String {
    match kind {
        TransitionKind::Recovered => format!("✅ {} is back UP", target.name),
        TransitionKind::Down | TransitionKind::Test if observation.error_message.is_empty() => {
            format!("🚨 {} is DOWN", target.name)
        }
        TransitionKind::Down | TransitionKind::Test => {
            format!("🚨 {} is DOWN\n{}", target.name, observation.error_message)
        }
    }
}

fn build_headers(config: &WebhookConfig) -> Result<HeaderMap, SenderError> {
    let content_type = if config.content_type.trim().is_empty() {
        DEFAULT_WEBHOOK_CONTENT_TYPE
    } else {
        config.content_type.trim()
    };
    let mut header_map = HeaderMap::new();
    header_map.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .map_err(|e| SenderError::InvalidConfiguration(format!("Invalid content type: {e}")))?,
    );
    for (key, value) in &config.headers {
        let header_name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| SenderError::InvalidConfiguration(format!("Invalid header name: {e}")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|e| SenderError::InvalidConfiguration(format!("Invalid header value: {e}")))?;
        header_map.insert(header_name, header_value);
    }
    Ok(header_map)
}

/// Renders the outbound request. A template that doesn't parse falls back to the default payload.
pub fn build_request(
    config: &WebhookConfig,
    vars: &TemplateVariables,
    kind: TransitionKind,
) -> Result<WebhookRequest, SenderError> {
    let payload = match config.body_template.as_deref().filter(|t| !t.trim().is_empty()) {
        Some(raw) => match render_template(raw, &vars.as_map()) {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!(monitor = %vars.monitor_name, error = %e, "Body template is not valid JSON; sending the default payload.");
                default_payload(vars, kind)
            }
        },
        None => default_payload(vars, kind),
    };

    Ok(WebhookRequest {
        url: config.url.clone(),
        headers: build_headers(config)?,
        body: payload.to_string(),
        basic_auth_user: config
            .username
            .as_deref()
            .filter(|u| !u.is_empty())
            .map(str::to_string),
    })
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    webhook: Arc<dyn WebhookSender>,
}

impl NotificationDispatcher {
    pub fn new(webhook: Arc<dyn WebhookSender>) -> Self {
        Self { webhook }
    }

    /// Sends the webhook and reports the result.
    pub async fn try_send_webhook(
        &self,
        target: &Target,
        observation: &Observation,
        kind: TransitionKind,
    ) -> Result<(), SenderError> {
        let Some(config) = &target.webhook else {
            return Err(SenderError::InvalidConfiguration(format!(
                "monitor {} has no webhook configured",
                target.id
            )));
        };
        let vars = TemplateVariables::new(target, observation, kind);
        let request = build_request(config, &vars, kind)?;
        match tokio::time::timeout(WEBHOOK_TIMEOUT, self.webhook.send(&request)).await {
            Ok(result) => result,
            Err(_) => Err(SenderError::SendFailed(format!(
                "webhook did not answer within {}s",
                WEBHOOK_TIMEOUT.as_secs()
            ))),
        }
    }

    /// Sends the webhook if one is configured; failures are logged.
    pub async fn send_webhook(&self, target: &Target, observation: &Observation, kind: TransitionKind) {
        if target.webhook.is_none() {
            return;
        }
        match self.try_send_webhook(target, observation, kind).await {
            Ok(()) => info!(monitor_id = %target.id, kind = kind.status_label(), "Webhook notification delivered."),
            Err(e) => error!(monitor_id = %target.id, error = %e, "Failed to deliver webhook notification."),
        }
    }

    /// Sends `text` over the chat transport; failures are logged.
    pub async fn send_chat(&self, chat: Option<&Arc<dyn ChatTransport>>, chat_id: &str, text: &str) {
        let Some(chat) = chat else {
            warn!(chat_id = %chat_id, "Chat message dropped: no bot is connected.");
            return;
        };
        match tokio::time::timeout(WEBHOOK_TIMEOUT, chat.send_message(chat_id, text)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(chat_id = %chat_id, error = %e, "Failed to send chat message."),
            Err(_) => error!(chat_id = %chat_id, "Chat message timed out."),
        }
    }

    /// Webhook plus the target's chat side channel, for a state transition.
    pub async fn announce(
        &self,
        target: &Target,
        observation: &Observation,
        kind: TransitionKind,
        chat: Option<&Arc<dyn ChatTransport>>,
    ) {
        self.send_webhook(target, observation, kind).await;
        if let Some(chat_id) = target.notify_chat() {
            let text = chat_summary(target, observation, kind);
            self.send_chat(chat, chat_id, &text).await;
        }
    }
}
