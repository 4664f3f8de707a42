//! Relational [`MonitorStore`] backed by sea-orm.
//!
//! Each sub-module owns the queries for one table; [`SeaOrmStore`] stitches them
//! together behind the store trait.

pub mod check_service;
pub mod incident_service;
pub mod monitor_service;
pub mod settings_service;

pub use check_service::*;
pub use incident_service::*;
pub use monitor_service::*;
pub use settings_service::*;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
};
use tracing::info;

use super::entities::{incident, monitor, monitor_check, setting};
use super::{MonitorStore, StoreError};
use crate::models::{Incident, Observation, ObservationStats, Target};

#[derive(Clone)]
pub struct SeaOrmStore {
    db: DatabaseConnection,
}

impl SeaOrmStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Connects to `database_url` and creates any missing tables.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let mut opt = ConnectOptions::new(database_url.to_owned());
        opt.max_connections(10).sqlx_logging(false);
        Self::connect_with(opt).await
    }

    pub async fn connect_with(opt: ConnectOptions) -> Result<Self, StoreError> {
        let db = Database::connect(opt).await?;
        ensure_schema(&db).await?;
        info!("Database connection established and schema verified.");
        Ok(Self { db })
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<(), DbErr> {
    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();
    db.execute(db.get_database_backend().build(&stmt)).await?;
    Ok(())
}

pub async fn ensure_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let schema = Schema::new(db.get_database_backend());
    create_table(db, &schema, monitor::Entity).await?;
    create_table(db, &schema, monitor_check::Entity).await?;
    create_table(db, &schema, incident::Entity).await?;
    create_table(db, &schema, setting::Entity).await?;
    Ok(())
}

#[async_trait]
impl MonitorStore for SeaOrmStore {
    async fn list_targets(&self) -> Result<Vec<Target>, StoreError> {
        list_monitors(&self.db).await
    }

    async fn get_target(&self, id: &str) -> Result<Option<Target>, StoreError> {
        get_monitor(&self.db, id).await
    }

    async fn upsert_target(&self, target: &Target) -> Result<(), StoreError> {
        upsert_monitor(&self.db, target).await
    }

    async fn delete_target(&self, id: &str) -> Result<bool, StoreError> {
        Ok(delete_monitor(&self.db, id).await?)
    }

    async fn set_sort_order(&self, id: &str, sort_order: i32) -> Result<(), StoreError> {
        Ok(update_sort_order(&self.db, id, sort_order).await?)
    }

    async fn insert_observation(&self, observation: &Observation) -> Result<(), StoreError> {
        insert_check(&self.db, observation).await
    }

    async fn recent_observations(
        &self,
        monitor_id: &str,
        limit: u64,
    ) -> Result<Vec<Observation>, StoreError> {
        recent_checks(&self.db, monitor_id, limit).await
    }

    async fn observation_stats(&self, monitor_id: &str) -> Result<ObservationStats, StoreError> {
        check_stats(&self.db, monitor_id).await
    }

    async fn open_incident(&self, monitor_id: &str) -> Result<Option<Incident>, StoreError> {
        Ok(find_open_incident(&self.db, monitor_id).await?)
    }

    async fn insert_incident(
        &self,
        monitor_id: &str,
        started_at: DateTime<Utc>,
        notified: bool,
    ) -> Result<Incident, StoreError> {
        Ok(incident_service::insert_incident(&self.db, monitor_id, started_at, notified).await?)
    }

    async fn resolve_incident(
        &self,
        incident_id: i64,
        resolved_at: DateTime<Utc>,
        duration_seconds: i64,
    ) -> Result<(), StoreError> {
        Ok(incident_service::resolve_incident(&self.db, incident_id, resolved_at, duration_seconds).await?)
    }

    async fn list_incidents(&self, monitor_id: &str) -> Result<Vec<Incident>, StoreError> {
        Ok(incident_service::list_incidents(&self.db, monitor_id).await?)
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(settings_service::get_setting(&self.db, key).await?)
    }

    async fn put_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        Ok(upsert_setting(&self.db, key, value).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CheckStatus, ProbeKind};

    async fn sqlite_store() -> SeaOrmStore {
        // A single connection, otherwise each pooled connection sees its own empty database.
        let mut opt = ConnectOptions::new("sqlite::memory:".to_owned());
        opt.max_connections(1).min_connections(1).sqlx_logging(false);
        SeaOrmStore::connect_with(opt).await.unwrap()
    }

    fn tcp_target(id: &str, sort_order: i32) -> Target {
        Target {
            id: id.to_string(),
            name: format!("db-{id}"),
            url: "db.internal:5432".to_string(),
            probe: ProbeKind::Tcp,
            check_interval: 1,
            check_interval_max: None,
            check_timeout: 5,
            webhook: None,
            notify_chat_id: None,
            is_active: true,
            sort_order,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_delete_cascades_to_history() {
        let store = sqlite_store().await;
        let target = tcp_target("a", 0);
        store.upsert_target(&target).await.unwrap();
        store
            .insert_observation(&Observation::passive("a", CheckStatus::Down, "x".into()))
            .await
            .unwrap();
        store.insert_incident("a", Utc::now(), true).await.unwrap();

        assert!(store.delete_target("a").await.unwrap());
        assert!(store.recent_observations("a", 10).await.unwrap().is_empty());
        assert!(store.list_incidents("a").await.unwrap().is_empty());
        assert!(!store.delete_target("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_overwrites_and_orders() {
        let store = sqlite_store().await;
        store.upsert_target(&tcp_target("a", 2)).await.unwrap();
        store.upsert_target(&tcp_target("b", 1)).await.unwrap();
        let mut renamed = tcp_target("a", 2);
        renamed.name = "primary".to_string();
        store.upsert_target(&renamed).await.unwrap();

        let targets = store.list_targets().await.unwrap();
        assert_eq!(targets.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(), ["b", "a"]);
        assert_eq!(targets[1].name, "primary");

        store.set_sort_order("a", 0).await.unwrap();
        assert_eq!(store.list_targets().await.unwrap()[0].id, "a");
    }

    #[tokio::test]
    async fn test_stats_aggregate_in_the_database() {
        let store = sqlite_store().await;
        store.upsert_target(&tcp_target("a", 0)).await.unwrap();
        store.upsert_target(&tcp_target("b", 1)).await.unwrap();
        assert_eq!(store.observation_stats("a").await.unwrap().total_checks, 0);

        for (status, ms) in [(CheckStatus::Up, 100), (CheckStatus::Up, 300), (CheckStatus::Down, 200), (CheckStatus::Up, 200)] {
            let mut observation = Observation::passive("a", status, String::new());
            observation.response_time_ms = ms;
            store.insert_observation(&observation).await.unwrap();
        }
        store
            .insert_observation(&Observation::passive("b", CheckStatus::Down, String::new()))
            .await
            .unwrap();

        let stats = store.observation_stats("a").await.unwrap();
        assert_eq!(stats.total_checks, 4);
        assert_eq!(stats.uptime_percentage, 75.0);
        assert_eq!(stats.average_response_time, 200.0);
    }

    #[tokio::test]
    async fn test_incident_lifecycle_and_settings() {
        let store = sqlite_store().await;
        store.upsert_target(&tcp_target("a", 0)).await.unwrap();
        let incident = store.insert_incident("a", Utc::now(), false).await.unwrap();
        assert_eq!(store.open_incident("a").await.unwrap().map(|i| i.id), Some(incident.id));

        store.resolve_incident(incident.id, Utc::now(), 42).await.unwrap();
        assert!(store.open_incident("a").await.unwrap().is_none());
        assert_eq!(store.list_incidents("a").await.unwrap()[0].duration_seconds, Some(42));

        store.put_setting("k", "v1").await.unwrap();
        store.put_setting("k", "v2").await.unwrap();
        assert_eq!(store.get_setting("k").await.unwrap().as_deref(), Some("v2"));
    }
}
