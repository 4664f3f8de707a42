//! Passive ingestion: target state pushed to us as free-form alert text.

use serde::{Deserialize, Serialize};

use crate::models::CheckStatus;

pub mod dedup;
pub mod matcher;
pub mod telegram_listener;

/// A text message received by the chat bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: String,
    pub message_id: i64,
    pub text: String,
    /// Unix seconds from the message itself.
    pub date: i64,
}

impl InboundMessage {
    /// Stable identity across redeliveries.
    pub fn dedup_key(&self) -> String {
        format!("{}_{}", self.chat_id, self.message_id)
    }
}

/// Body accepted by the inbound third-party alert webhook.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PassiveWebhookPayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    /// Unix seconds; receipt time is used when absent.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl PassiveWebhookPayload {
    /// All text fields joined, so keywords in either the title or the body are seen.
    pub fn combined_text(&self) -> String {
        [&self.title, &self.message, &self.text]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IngestOutcome {
    /// Passive webhook ingestion is switched off.
    Disabled,
    Duplicate,
    NoMatch,
    /// Matched a target but carried no state keyword.
    NoState { monitor_id: String },
    CoolingDown { monitor_id: String, status: CheckStatus },
    Unchanged { monitor_id: String, status: CheckStatus },
    Accepted {
        monitor_id: String,
        status: CheckStatus,
        incident_opened: bool,
        incident_resolved: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_text_skips_blanks() {
        let payload = PassiveWebhookPayload {
            title: Some("Node offline".to_string()),
            message: Some("  ".to_string()),
            text: Some("hk-1 went dark".to_string()),
            ..Default::default()
        };
        assert_eq!(payload.combined_text(), "Node offline\nhk-1 went dark");
    }

    #[test]
    fn test_dedup_key_includes_chat() {
        let msg = InboundMessage {
            chat_id: "-100".to_string(),
            message_id: 9,
            text: String::new(),
            date: 0,
        };
        assert_eq!(msg.dedup_key(), "-100_9");
    }
}
