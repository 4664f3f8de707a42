//! Maps each target's stream of observations to open/close events on its incident.
//!
//! Writes for one target are serialized through a per-target async mutex, so the
//! active and passive paths can't both open (or both close) the same incident.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::db::{MonitorStore, StoreError};
use crate::models::{CheckStatus, Incident, Observation, ProbeKind, Target};

/// Where an observation came from. Decides the open threshold and whether recovery is announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationSource {
    ActiveProbe,
    PassiveChat,
    PassiveWebhook,
}

impl ObservationSource {
    /// Chat-sourced recoveries close silently to avoid loops with downstream automation.
    pub fn announces_recovery(&self) -> bool {
        !matches!(self, ObservationSource::PassiveChat)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IncidentEvent {
    Opened(Incident),
    Resolved(Incident),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// The observation matched the latest recorded status and was dropped.
    Unchanged,
    Recorded(Option<IncidentEvent>),
}

pub struct IncidentTracker {
    store: Arc<dyn MonitorStore>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl IncidentTracker {
    pub fn new(store: Arc<dyn MonitorStore>) -> Self {
        Self {
            store,
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, target_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(target_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drops the per-target lock of a deleted target.
    pub fn forget(&self, target_id: &str) {
        self.locks.remove(target_id);
    }

    /// Appends the observation and advances the incident state.
    pub async fn record(
        &self,
        target: &Target,
        observation: &Observation,
        source: ObservationSource,
    ) -> Result<Option<IncidentEvent>, StoreError> {
        let lock = self.lock_for(&target.id);
        let _guard = lock.lock().await;
        self.record_locked(target, observation, source).await
    }

    /// Like [`record`](Self::record), but drops the observation when its status equals
    /// the latest recorded one.
    pub async fn record_transition(
        &self,
        target: &Target,
        observation: &Observation,
        source: ObservationSource,
    ) -> Result<RecordOutcome, StoreError> {
        let lock = self.lock_for(&target.id);
        let _guard = lock.lock().await;
        if let Some(latest) = self.store.latest_observation(&target.id).await? {
            if latest.status == observation.status {
                return Ok(RecordOutcome::Unchanged);
            }
        }
        Ok(RecordOutcome::Recorded(
            self.record_locked(target, observation, source).await?,
        ))
    }

    async fn record_locked(
        &self,
        target: &Target,
        observation: &Observation,
        source: ObservationSource,
    ) -> Result<Option<IncidentEvent>, StoreError> {
        self.store.insert_observation(observation).await?;
        let open = self.store.open_incident(&target.id).await?;

        match (observation.status, open) {
            (CheckStatus::Down, None) => {
                if source == ObservationSource::ActiveProbe
                    && matches!(target.probe, ProbeKind::StatusApi(_))
                {
                    let recent = self.store.recent_observations(&target.id, 2).await?;
                    let consecutive = recent
                        .iter()
                        .filter(|o| o.status == CheckStatus::Down)
                        .count();
                    if consecutive < 2 {
                        info!(monitor_id = %target.id, consecutive, "Waiting for a second consecutive failure before opening an incident.");
                        return Ok(None);
                    }
                }
                let notified = target.webhook.is_some() || target.notify_chat().is_some();
                let incident = self
                    .store
                    .insert_incident(&target.id, observation.checked_at, notified)
                    .await?;
                info!(monitor_id = %target.id, incident_id = incident.id, "Incident opened.");
                Ok(Some(IncidentEvent::Opened(incident)))
            }
            (CheckStatus::Up, Some(mut incident)) => {
                let resolved_at = Utc::now();
                let duration = (resolved_at - incident.started_at).num_seconds().max(0);
                self.store
                    .resolve_incident(incident.id, resolved_at, duration)
                    .await?;
                incident.resolved_at = Some(resolved_at);
                incident.duration_seconds = Some(duration);
                info!(monitor_id = %target.id, incident_id = incident.id, duration_seconds = duration, "Incident resolved.");
                Ok(Some(IncidentEvent::Resolved(incident)))
            }
            _ => Ok(None),
        }
    }
}
