//! Passive ingestion paths: chat messages and the inbound third-party alert webhook.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{EngineError, MonitorEngine};
use crate::alerting::incident_tracker::{IncidentEvent, ObservationSource, RecordOutcome};
use crate::db::StoreError;
use crate::ingestion::dedup::{Cooldowns, SeenMessages};
use crate::ingestion::matcher::{match_chat_message, match_webhook_alert};
use crate::ingestion::{InboundMessage, IngestOutcome, PassiveWebhookPayload};
use crate::models::{CheckStatus, Observation, Target};
use crate::notifications::dispatcher::chat_summary;
use crate::notifications::models::TransitionKind;

pub const PASSIVE_WEBHOOK_SETTINGS_KEY: &str = "passive_webhook_settings";

#[derive(Default)]
pub(super) struct PassiveState {
    pub(super) seen: SeenMessages,
    pub(super) cooldowns: Cooldowns,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassiveWebhookSettings {
    #[serde(default)]
    pub enabled: bool,
    /// Chat address that receives a summary of every accepted alert.
    #[serde(default)]
    pub notify_chat_id: Option<String>,
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn acknowledgement(monitor: &str, server: &str, status: CheckStatus) -> String {
    let (emoji, label) = match status {
        CheckStatus::Down => ("🔴", "DOWN"),
        CheckStatus::Up => ("🟢", "UP"),
    };
    format!("{emoji} Alert received\nMonitor: {monitor}\nServer: {server}\nStatus: {label}, monitor updated")
}

impl MonitorEngine {
    pub async fn passive_webhook_settings(&self) -> Result<PassiveWebhookSettings, EngineError> {
        match self.store.get_setting(PASSIVE_WEBHOOK_SETTINGS_KEY).await? {
            Some(raw) if !raw.trim().is_empty() => {
                Ok(serde_json::from_str(&raw).map_err(StoreError::from)?)
            }
            _ => Ok(PassiveWebhookSettings::default()),
        }
    }

    pub async fn set_passive_webhook_settings(
        &self,
        mut settings: PassiveWebhookSettings,
    ) -> Result<PassiveWebhookSettings, EngineError> {
        settings.notify_chat_id = settings
            .notify_chat_id
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        let raw = serde_json::to_string(&settings).map_err(StoreError::from)?;
        self.store
            .put_setting(PASSIVE_WEBHOOK_SETTINGS_KEY, &raw)
            .await?;
        info!(enabled = settings.enabled, "Passive webhook settings saved.");
        Ok(settings)
    }

    /// Handles one message from a chat the bot is in.
    ///
    /// Recoveries received this way close the incident without calling the webhook.
    /// A message that fails on the store is not remembered, so a redelivery is retried.
    pub async fn ingest_chat_message(
        &self,
        message: &InboundMessage,
    ) -> Result<IngestOutcome, EngineError> {
        let dedup_key = message.dedup_key();
        if !self.passive.lock().await.seen.insert(&dedup_key) {
            return Ok(IngestOutcome::Duplicate);
        }
        let result = self.apply_chat_message(message).await;
        if result.is_err() {
            self.passive.lock().await.seen.remove(&dedup_key);
        }
        result
    }

    async fn apply_chat_message(&self, message: &InboundMessage) -> Result<IngestOutcome, EngineError> {
        let targets = self.store.list_targets().await?;
        let Some(found) = match_chat_message(&targets, &message.text, &message.chat_id) else {
            return Ok(IngestOutcome::NoMatch);
        };
        let target = found.target;
        let Some(status) = found.state else {
            return Ok(IngestOutcome::NoState {
                monitor_id: target.id.clone(),
            });
        };
        if self.in_cooldown(&target.id, status, message.date).await {
            return Ok(IngestOutcome::CoolingDown {
                monitor_id: target.id.clone(),
                status,
            });
        }

        let error_message = match status {
            CheckStatus::Down => format!("TG notification: {}", truncate_chars(&message.text, 100)),
            CheckStatus::Up => String::new(),
        };
        let observation = Observation::passive(&target.id, status, error_message);
        let event = match self
            .tracker
            .record_transition(target, &observation, ObservationSource::PassiveChat)
            .await?
        {
            RecordOutcome::Unchanged => {
                return Ok(IngestOutcome::Unchanged {
                    monitor_id: target.id.clone(),
                    status,
                })
            }
            RecordOutcome::Recorded(event) => event,
        };
        self.passive
            .lock()
            .await
            .cooldowns
            .record(&target.id, status, message.date);

        info!(monitor_id = %target.id, server = found.matched_name, status = %status, chat_id = %message.chat_id, "Chat message changed monitor state.");

        let alert = matches!(event, Some(IncidentEvent::Opened(_))).then(|| {
            let mut alert = observation.clone();
            alert.error_message = truncate_chars(&message.text, 200);
            (alert, TransitionKind::Down)
        });
        let ack = (
            message.chat_id.clone(),
            acknowledgement(&target.name, found.matched_name, status),
        );
        self.queue_passive_delivery(target, alert, Some(ack)).await;

        Ok(accepted(&target.id, status, event.as_ref()))
    }

    /// Handles one payload posted to the inbound alert webhook.
    ///
    /// Recoveries received this way do call the target's webhook.
    pub async fn ingest_passive_webhook(
        &self,
        payload: &PassiveWebhookPayload,
    ) -> Result<IngestOutcome, EngineError> {
        let settings = self.passive_webhook_settings().await?;
        if !settings.enabled {
            return Ok(IngestOutcome::Disabled);
        }

        let dedup_key = payload
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| format!("webhook_{id}"));
        if let Some(key) = &dedup_key {
            if !self.passive.lock().await.seen.insert(key) {
                return Ok(IngestOutcome::Duplicate);
            }
        }
        let result = self.apply_passive_webhook(payload, &settings).await;
        if let (Err(_), Some(key)) = (&result, &dedup_key) {
            self.passive.lock().await.seen.remove(key);
        }
        result
    }

    async fn apply_passive_webhook(
        &self,
        payload: &PassiveWebhookPayload,
        settings: &PassiveWebhookSettings,
    ) -> Result<IngestOutcome, EngineError> {
        let text = payload.combined_text();
        let targets = self.store.list_targets().await?;
        let Some(found) = match_webhook_alert(&targets, &text) else {
            return Ok(IngestOutcome::NoMatch);
        };
        let target = found.target;
        let Some(status) = found.state else {
            return Ok(IngestOutcome::NoState {
                monitor_id: target.id.clone(),
            });
        };
        let sent_at = payload.timestamp.unwrap_or_else(|| Utc::now().timestamp());
        if self.in_cooldown(&target.id, status, sent_at).await {
            return Ok(IngestOutcome::CoolingDown {
                monitor_id: target.id.clone(),
                status,
            });
        }

        let error_message = match status {
            CheckStatus::Down => format!("Passive alert: {}", truncate_chars(&text, 100)),
            CheckStatus::Up => String::new(),
        };
        let observation = Observation::passive(&target.id, status, error_message);
        let event = match self
            .tracker
            .record_transition(target, &observation, ObservationSource::PassiveWebhook)
            .await?
        {
            RecordOutcome::Unchanged => {
                return Ok(IngestOutcome::Unchanged {
                    monitor_id: target.id.clone(),
                    status,
                })
            }
            RecordOutcome::Recorded(event) => event,
        };
        self.passive
            .lock()
            .await
            .cooldowns
            .record(&target.id, status, sent_at);

        info!(monitor_id = %target.id, server = found.matched_name, status = %status, "Inbound alert changed monitor state.");

        let kind = match status {
            CheckStatus::Down => TransitionKind::Down,
            CheckStatus::Up => TransitionKind::Recovered,
        };
        let alert = match &event {
            Some(IncidentEvent::Opened(_)) => {
                let mut alert = observation.clone();
                alert.error_message = truncate_chars(&text, 200);
                Some((alert, kind))
            }
            Some(IncidentEvent::Resolved(_)) if ObservationSource::PassiveWebhook.announces_recovery() => {
                Some((observation.clone(), kind))
            }
            _ => None,
        };
        let summary = settings
            .notify_chat_id
            .as_deref()
            .or_else(|| target.notify_chat())
            .map(|chat_id| {
                let summary = chat_summary(target, &observation, kind);
                (chat_id.to_string(), format!("{summary}\nServer: {}", found.matched_name))
            });
        self.queue_passive_delivery(target, alert, summary).await;

        Ok(accepted(&target.id, status, event.as_ref()))
    }

    async fn in_cooldown(&self, target_id: &str, status: CheckStatus, sent_at: i64) -> bool {
        self.passive
            .lock()
            .await
            .cooldowns
            .is_suppressed(target_id, status, sent_at)
    }

    /// Queues the webhook alert and the chat text, in that order, behind the target's earlier notifications.
    async fn queue_passive_delivery(
        &self,
        target: &Target,
        alert: Option<(Observation, TransitionKind)>,
        chat_text: Option<(String, String)>,
    ) {
        let chat = match chat_text {
            Some(_) => self.chat_transport().await,
            None => None,
        };
        let dispatcher = self.dispatcher.clone();
        let owned = target.clone();
        self.deliveries
            .enqueue(&target.id, async move {
                if let Some((alert, kind)) = alert {
                    dispatcher.send_webhook(&owned, &alert, kind).await;
                }
                if let Some((chat_id, text)) = chat_text {
                    dispatcher.send_chat(chat.as_ref(), &chat_id, &text).await;
                }
            })
            .await;
    }
}

fn accepted(monitor_id: &str, status: CheckStatus, event: Option<&IncidentEvent>) -> IngestOutcome {
    IngestOutcome::Accepted {
        monitor_id: monitor_id.to_string(),
        status,
        incident_opened: matches!(event, Some(IncidentEvent::Opened(_))),
        incident_resolved: matches!(event, Some(IncidentEvent::Resolved(_))),
    }
}
