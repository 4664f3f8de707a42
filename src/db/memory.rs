//! Process-local store used by tests and by `database_url = "memory"`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{MonitorStore, StoreError};
use crate::models::{CheckStatus, Incident, Observation, ObservationStats, Target};

#[derive(Default)]
struct Tables {
    targets: Vec<Target>,
    // (insertion sequence, observation)
    observations: Vec<(u64, Observation)>,
    incidents: Vec<Incident>,
    settings: HashMap<String, String>,
    next_seq: u64,
    next_incident_id: i64,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MonitorStore for InMemoryStore {
    async fn list_targets(&self) -> Result<Vec<Target>, StoreError> {
        let tables = self.tables.read().await;
        let mut targets = tables.targets.clone();
        targets.sort_by(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(targets)
    }

    async fn get_target(&self, id: &str) -> Result<Option<Target>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.targets.iter().find(|t| t.id == id).cloned())
    }

    async fn upsert_target(&self, target: &Target) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        match tables.targets.iter_mut().find(|t| t.id == target.id) {
            Some(existing) => *existing = target.clone(),
            None => tables.targets.push(target.clone()),
        }
        Ok(())
    }

    async fn delete_target(&self, id: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.targets.len();
        tables.targets.retain(|t| t.id != id);
        if tables.targets.len() == before {
            return Ok(false);
        }
        tables.observations.retain(|(_, o)| o.monitor_id != id);
        tables.incidents.retain(|i| i.monitor_id != id);
        Ok(true)
    }

    async fn set_sort_order(&self, id: &str, sort_order: i32) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(target) = tables.targets.iter_mut().find(|t| t.id == id) {
            target.sort_order = sort_order;
        }
        Ok(())
    }

    async fn insert_observation(&self, observation: &Observation) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let seq = tables.next_seq;
        tables.next_seq += 1;
        tables.observations.push((seq, observation.clone()));
        Ok(())
    }

    async fn recent_observations(
        &self,
        monitor_id: &str,
        limit: u64,
    ) -> Result<Vec<Observation>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<&(u64, Observation)> = tables
            .observations
            .iter()
            .filter(|(_, o)| o.monitor_id == monitor_id)
            .collect();
        rows.sort_by(|(sa, a), (sb, b)| b.checked_at.cmp(&a.checked_at).then(sb.cmp(sa)));
        Ok(rows
            .into_iter()
            .take(limit as usize)
            .map(|(_, o)| o.clone())
            .collect())
    }

    async fn observation_stats(&self, monitor_id: &str) -> Result<ObservationStats, StoreError> {
        let tables = self.tables.read().await;
        let (mut total, mut up, mut latency) = (0u64, 0u64, 0u64);
        for (_, o) in tables.observations.iter().filter(|(_, o)| o.monitor_id == monitor_id) {
            total += 1;
            latency += o.response_time_ms;
            if o.status == CheckStatus::Up {
                up += 1;
            }
        }
        Ok(ObservationStats::from_counts(total, up, latency))
    }

    async fn open_incident(&self, monitor_id: &str) -> Result<Option<Incident>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .incidents
            .iter()
            .find(|i| i.monitor_id == monitor_id && i.is_open())
            .cloned())
    }

    async fn insert_incident(
        &self,
        monitor_id: &str,
        started_at: DateTime<Utc>,
        notified: bool,
    ) -> Result<Incident, StoreError> {
        let mut tables = self.tables.write().await;
        tables.next_incident_id += 1;
        let incident = Incident {
            id: tables.next_incident_id,
            monitor_id: monitor_id.to_string(),
            started_at,
            resolved_at: None,
            duration_seconds: None,
            notified,
        };
        tables.incidents.push(incident.clone());
        Ok(incident)
    }

    async fn resolve_incident(
        &self,
        incident_id: i64,
        resolved_at: DateTime<Utc>,
        duration_seconds: i64,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(incident) = tables.incidents.iter_mut().find(|i| i.id == incident_id) {
            incident.resolved_at = Some(resolved_at);
            incident.duration_seconds = Some(duration_seconds);
        }
        Ok(())
    }

    async fn list_incidents(&self, monitor_id: &str) -> Result<Vec<Incident>, StoreError> {
        let tables = self.tables.read().await;
        let mut incidents: Vec<Incident> = tables
            .incidents
            .iter()
            .filter(|i| i.monitor_id == monitor_id)
            .cloned()
            .collect();
        incidents.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
        Ok(incidents)
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.tables.read().await.settings.get(key).cloned())
    }

    async fn put_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .settings
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
