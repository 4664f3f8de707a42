//! The monitoring engine.
//!
//! [`MonitorEngine`] owns every collaborator (store, prober, dispatcher, chat bot)
//! and the process-local caches. The HTTP front door, the scheduler tick and the
//! chat consumer all call into it, and every operation returns a structured
//! [`EngineError`] that the front door maps to a response code.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::alerting::incident_tracker::{IncidentEvent, IncidentTracker, ObservationSource};
use crate::db::{MonitorStore, StoreError};
use crate::models::{CheckStatus, Incident, Observation, ObservationStats, Target};
use crate::notifications::dispatcher::NotificationDispatcher;
use crate::notifications::models::TransitionKind;
use crate::notifications::senders::{ChatConnector, SenderError, WebhookSender};
use crate::probes::{ProbeFailure, Prober, ServerState};
use crate::scheduler::Scheduler;

pub mod bot;
pub mod delivery;
pub mod passive;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

pub use bot::BotStatus;
pub use passive::PassiveWebhookSettings;
pub use validation::TargetInput;

/// Observations returned by [`MonitorEngine::list_checks`].
pub const CHECK_HISTORY_LIMIT: u64 = 100;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Monitor not found: {0}")]
    UnknownTarget(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not configured: {0}")]
    NotConfigured(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Notification(#[from] SenderError),
    #[error("Probe failed: {0}")]
    Probe(ProbeFailure),
}

/// A target together with its most recent observation, which decides its displayed status.
#[derive(Debug, Clone, Serialize)]
pub struct TargetView {
    #[serde(flatten)]
    pub target: Target,
    pub latest_check: Option<Observation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScheduleSummary {
    /// True when another tick was still running and this one did nothing.
    pub skipped: bool,
    pub due: usize,
    pub probed: usize,
    pub down: usize,
}

pub struct MonitorEngine {
    store: Arc<dyn MonitorStore>,
    prober: Arc<dyn Prober>,
    dispatcher: NotificationDispatcher,
    tracker: IncidentTracker,
    scheduler: Scheduler,
    chat_connector: Arc<dyn ChatConnector>,
    bot: Mutex<bot::BotState>,
    passive: Mutex<passive::PassiveState>,
    deliveries: delivery::DeliveryQueue,
    tick_guard: Mutex<()>,
    max_concurrent_probes: usize,
}

impl MonitorEngine {
    pub fn new(
        store: Arc<dyn MonitorStore>,
        prober: Arc<dyn Prober>,
        webhook_sender: Arc<dyn WebhookSender>,
        chat_connector: Arc<dyn ChatConnector>,
        max_concurrent_probes: usize,
    ) -> Self {
        Self {
            tracker: IncidentTracker::new(store.clone()),
            store,
            prober,
            dispatcher: NotificationDispatcher::new(webhook_sender),
            scheduler: Scheduler::new(),
            chat_connector,
            bot: Mutex::new(bot::BotState::default()),
            passive: Mutex::new(passive::PassiveState::default()),
            deliveries: delivery::DeliveryQueue::default(),
            tick_guard: Mutex::new(()),
            max_concurrent_probes: max_concurrent_probes.max(1),
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub async fn list_targets(&self) -> Result<Vec<TargetView>, EngineError> {
        let targets = self.store.list_targets().await?;
        let mut views = Vec::with_capacity(targets.len());
        for target in targets {
            let latest_check = self.store.latest_observation(&target.id).await?;
            views.push(TargetView {
                target,
                latest_check,
            });
        }
        Ok(views)
    }

    pub async fn get_target(&self, id: &str) -> Result<Target, EngineError> {
        self.store
            .get_target(id)
            .await?
            .ok_or_else(|| EngineError::UnknownTarget(id.to_string()))
    }

    /// Stores a new target and, for actively probed kinds, probes it once right away.
    pub async fn create_target(&self, input: TargetInput) -> Result<Target, EngineError> {
        let target = input
            .normalize()?
            .into_target(Uuid::new_v4().to_string(), 0, Utc::now());
        self.store.upsert_target(&target).await?;
        info!(monitor_id = %target.id, kind = target.probe.name(), "Monitor created.");

        if target.is_active && target.probe.is_actively_probed() {
            if let Err(e) = self.run_probe(&target).await {
                error!(monitor_id = %target.id, error = %e, "Initial probe of new monitor failed.");
            }
        }
        Ok(target)
    }

    pub async fn update_target(&self, id: &str, input: TargetInput) -> Result<Target, EngineError> {
        let existing = self.get_target(id).await?;
        let target = input
            .normalize()?
            .into_target(existing.id, existing.sort_order, existing.created_at);
        self.store.upsert_target(&target).await?;
        // interval bounds may have changed
        self.scheduler.intervals().invalidate(id);
        info!(monitor_id = %id, "Monitor updated.");
        Ok(target)
    }

    /// Deletes the target, its history, and every in-memory entry keyed by it.
    pub async fn delete_target(&self, id: &str) -> Result<(), EngineError> {
        if !self.store.delete_target(id).await? {
            return Err(EngineError::UnknownTarget(id.to_string()));
        }
        self.scheduler.intervals().invalidate(id);
        self.tracker.forget(id);
        self.passive.lock().await.cooldowns.forget_target(id);
        info!(monitor_id = %id, "Monitor deleted.");
        Ok(())
    }

    /// Assigns `sort_order` by position in `ids`. Unknown ids reject the whole request.
    pub async fn reorder_targets(&self, ids: &[String]) -> Result<(), EngineError> {
        let known: HashSet<String> = self
            .store
            .list_targets()
            .await?
            .into_iter()
            .map(|t| t.id)
            .collect();
        if let Some(unknown) = ids.iter().find(|id| !known.contains(id.as_str())) {
            return Err(EngineError::UnknownTarget(unknown.clone()));
        }
        for (position, id) in ids.iter().enumerate() {
            let sort_order = i32::try_from(position).unwrap_or(i32::MAX);
            self.store.set_sort_order(id, sort_order).await?;
        }
        Ok(())
    }

    /// Probes one target immediately, outside the schedule.
    pub async fn probe_now(&self, id: &str) -> Result<Observation, EngineError> {
        let target = self.get_target(id).await?;
        if !target.probe.is_actively_probed() {
            return Err(EngineError::InvalidInput(format!(
                "{} monitors are not actively probed",
                target.probe.name()
            )));
        }
        Ok(self.run_probe(&target).await?)
    }

    /// Runs one probe and feeds its observation to the incident tracker.
    async fn run_probe(&self, target: &Target) -> Result<Observation, StoreError> {
        let outcome = self.prober.probe(target).await;
        if let Some(failure) = &outcome.failure {
            warn!(monitor_id = %target.id, error = %failure, "Probe reported down.");
        }
        let observation = outcome.into_observation(&target.id, Utc::now());
        let event = self
            .tracker
            .record(target, &observation, ObservationSource::ActiveProbe)
            .await?;
        self.announce_event(target, &observation, event.as_ref(), ObservationSource::ActiveProbe)
            .await;
        Ok(observation)
    }

    async fn announce_event(
        &self,
        target: &Target,
        observation: &Observation,
        event: Option<&IncidentEvent>,
        source: ObservationSource,
    ) {
        let (kind, observation) = match event {
            Some(IncidentEvent::Opened(_)) => (TransitionKind::Down, observation.clone()),
            Some(IncidentEvent::Resolved(_)) if source.announces_recovery() => {
                (TransitionKind::Recovered, recovery_observation(observation))
            }
            _ => return,
        };
        let chat = self.chat_transport().await;
        let dispatcher = self.dispatcher.clone();
        let target = target.clone();
        let target_id = target.id.clone();
        self.deliveries
            .enqueue(&target_id, async move {
                dispatcher
                    .announce(&target, &observation, kind, chat.as_ref())
                    .await;
            })
            .await;
    }

    /// Waits until every queued notification has been sent or has timed out.
    pub async fn flush_notifications(&self) {
        self.deliveries.flush().await;
    }

    /// Sends a fixed sample alert through the target's webhook and reports delivery errors.
    pub async fn send_test_notification(&self, id: &str) -> Result<(), EngineError> {
        let target = self.get_target(id).await?;
        if target.webhook.is_none() {
            return Err(EngineError::NotConfigured(format!(
                "monitor {id} has no webhook URL"
            )));
        }
        let mut sample =
            Observation::passive(&target.id, CheckStatus::Down, "Test notification".to_string());
        sample.response_time_ms = 123;
        sample.status_code = 200;
        self.dispatcher
            .try_send_webhook(&target, &sample, TransitionKind::Test)
            .await?;
        info!(monitor_id = %id, "Test webhook delivered.");
        Ok(())
    }

    /// One scheduler tick: probes every due target with bounded concurrency.
    ///
    /// Ticks never overlap; a tick that finds the previous one still running returns
    /// a skipped summary. Per-target failures are logged and don't abort the tick.
    pub async fn run_due_schedule(&self) -> Result<ScheduleSummary, EngineError> {
        let Ok(_tick) = self.tick_guard.try_lock() else {
            debug!("Previous tick still running; skipping.");
            return Ok(ScheduleSummary {
                skipped: true,
                ..Default::default()
            });
        };

        let due = self
            .scheduler
            .select_due(self.store.as_ref(), Utc::now())
            .await?;
        let mut summary = ScheduleSummary {
            due: due.len(),
            ..Default::default()
        };

        let results: Vec<_> = stream::iter(due)
            .map(|target| async move {
                let result = self.run_probe(&target).await;
                (target, result)
            })
            .buffer_unordered(self.max_concurrent_probes)
            .collect()
            .await;

        for (target, result) in results {
            match result {
                Ok(observation) => {
                    summary.probed += 1;
                    if observation.status == CheckStatus::Down {
                        summary.down += 1;
                    }
                }
                Err(e) => {
                    error!(monitor_id = %target.id, error = %e, "Failed to record probe result.")
                }
            }
        }
        if summary.due > 0 {
            info!(due = summary.due, probed = summary.probed, down = summary.down, "Scheduled probes finished.");
        }
        Ok(summary)
    }

    /// The latest observations, most recent first.
    pub async fn list_checks(&self, id: &str) -> Result<Vec<Observation>, EngineError> {
        Ok(self
            .store
            .recent_observations(id, CHECK_HISTORY_LIMIT)
            .await?)
    }

    pub async fn target_stats(&self, id: &str) -> Result<ObservationStats, EngineError> {
        Ok(self.store.observation_stats(id).await?)
    }

    pub async fn list_incidents(&self, id: &str) -> Result<Vec<Incident>, EngineError> {
        Ok(self.store.list_incidents(id).await?)
    }

    /// Per-server breakdown of a status-API target.
    pub async fn status_api_servers(&self, id: &str) -> Result<Vec<ServerState>, EngineError> {
        let target = self.get_target(id).await?;
        self.prober
            .status_api_servers(&target)
            .await
            .map_err(|failure| match failure {
                ProbeFailure::Unsupported(kind) => {
                    EngineError::InvalidInput(format!("{kind} monitors have no server breakdown"))
                }
                other => EngineError::Probe(other),
            })
    }
}

/// Recovery announcements report a clean response rather than the probe's numbers.
fn recovery_observation(observation: &Observation) -> Observation {
    Observation {
        response_time_ms: 0,
        status_code: 200,
        error_message: String::new(),
        ..observation.clone()
    }
}
