use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    NotSet, QueryFilter, QueryOrder, Set,
};

use crate::db::entities::incident;
use crate::models::Incident;

fn row_to_incident(row: incident::Model) -> Incident {
    Incident {
        id: row.id,
        monitor_id: row.monitor_id,
        started_at: row.started_at,
        resolved_at: row.resolved_at,
        duration_seconds: row.duration_seconds,
        notified: row.notified,
    }
}

pub async fn find_open_incident(
    db: &DatabaseConnection,
    monitor_id: &str,
) -> Result<Option<Incident>, DbErr> {
    Ok(incident::Entity::find()
        .filter(incident::Column::MonitorId.eq(monitor_id))
        .filter(incident::Column::ResolvedAt.is_null())
        .order_by_desc(incident::Column::StartedAt)
        .one(db)
        .await?
        .map(row_to_incident))
}

pub async fn insert_incident(
    db: &DatabaseConnection,
    monitor_id: &str,
    started_at: DateTime<Utc>,
    notified: bool,
) -> Result<Incident, DbErr> {
    let row = incident::ActiveModel {
        id: NotSet,
        monitor_id: Set(monitor_id.to_string()),
        started_at: Set(started_at),
        resolved_at: Set(None),
        duration_seconds: Set(None),
        notified: Set(notified),
    };
    Ok(row_to_incident(row.insert(db).await?))
}

pub async fn resolve_incident(
    db: &DatabaseConnection,
    incident_id: i64,
    resolved_at: DateTime<Utc>,
    duration_seconds: i64,
) -> Result<(), DbErr> {
    let Some(row) = incident::Entity::find_by_id(incident_id).one(db).await? else {
        return Ok(());
    };
    let mut active = row.into_active_model();
    active.resolved_at = Set(Some(resolved_at));
    active.duration_seconds = Set(Some(duration_seconds));
    active.update(db).await?;
    Ok(())
}

pub async fn list_incidents(db: &DatabaseConnection, monitor_id: &str) -> Result<Vec<Incident>, DbErr> {
    Ok(incident::Entity::find()
        .filter(incident::Column::MonitorId.eq(monitor_id))
        .order_by_desc(incident::Column::StartedAt)
        .order_by_desc(incident::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(row_to_incident)
        .collect())
}
