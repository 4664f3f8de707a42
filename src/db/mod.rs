//! Persistence collaborator.
//!
//! The engine only talks to [`MonitorStore`]; `services::SeaOrmStore` backs it
//! with a relational database and `memory::InMemoryStore` keeps everything in
//! process memory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{Incident, Observation, ObservationStats, Target};

pub mod entities;
pub mod memory;
pub mod services;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait MonitorStore: Send + Sync {
    /// All targets ordered by `sort_order` ascending, newest first on ties.
    async fn list_targets(&self) -> Result<Vec<Target>, StoreError>;

    async fn get_target(&self, id: &str) -> Result<Option<Target>, StoreError>;

    /// Inserts the target or replaces the row with the same id.
    async fn upsert_target(&self, target: &Target) -> Result<(), StoreError>;

    /// Deletes the target with its observations and incidents. Returns false if it didn't exist.
    async fn delete_target(&self, id: &str) -> Result<bool, StoreError>;

    async fn set_sort_order(&self, id: &str, sort_order: i32) -> Result<(), StoreError>;

    async fn insert_observation(&self, observation: &Observation) -> Result<(), StoreError>;

    /// Most recent observations first.
    async fn recent_observations(
        &self,
        monitor_id: &str,
        limit: u64,
    ) -> Result<Vec<Observation>, StoreError>;

    async fn observation_stats(&self, monitor_id: &str) -> Result<ObservationStats, StoreError>;

    async fn open_incident(&self, monitor_id: &str) -> Result<Option<Incident>, StoreError>;

    async fn insert_incident(
        &self,
        monitor_id: &str,
        started_at: DateTime<Utc>,
        notified: bool,
    ) -> Result<Incident, StoreError>;

    async fn resolve_incident(
        &self,
        incident_id: i64,
        resolved_at: DateTime<Utc>,
        duration_seconds: i64,
    ) -> Result<(), StoreError>;

    /// Most recent incidents first.
    async fn list_incidents(&self, monitor_id: &str) -> Result<Vec<Incident>, StoreError>;

    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn put_setting(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn latest_observation(&self, monitor_id: &str) -> Result<Option<Observation>, StoreError> {
        Ok(self.recent_observations(monitor_id, 1).await?.into_iter().next())
    }
}
