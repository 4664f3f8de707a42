//! Observation rows. Append-only: nothing in here updates an existing check.

use sea_orm::sea_query::{Alias, Expr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, NotSet,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};

use crate::db::entities::monitor_check;
use crate::db::StoreError;
use crate::models::{CheckStatus, Observation, ObservationStats};

fn row_to_observation(row: monitor_check::Model) -> Result<Observation, StoreError> {
    Ok(Observation {
        status: row.status.parse().map_err(StoreError::Corrupt)?,
        monitor_id: row.monitor_id,
        response_time_ms: u64::try_from(row.response_time).unwrap_or(0),
        status_code: u16::try_from(row.status_code).unwrap_or(0),
        error_message: row.error_message,
        checked_at: row.checked_at,
    })
}

pub async fn insert_check(db: &DatabaseConnection, observation: &Observation) -> Result<(), StoreError> {
    let row = monitor_check::ActiveModel {
        id: NotSet,
        monitor_id: Set(observation.monitor_id.clone()),
        status: Set(observation.status.as_str().to_string()),
        response_time: Set(i64::try_from(observation.response_time_ms).unwrap_or(i64::MAX)),
        status_code: Set(i32::from(observation.status_code)),
        error_message: Set(observation.error_message.clone()),
        checked_at: Set(observation.checked_at),
    };
    row.insert(db).await?;
    Ok(())
}

pub async fn recent_checks(
    db: &DatabaseConnection,
    monitor_id: &str,
    limit: u64,
) -> Result<Vec<Observation>, StoreError> {
    monitor_check::Entity::find()
        .filter(monitor_check::Column::MonitorId.eq(monitor_id))
        .order_by_desc(monitor_check::Column::CheckedAt)
        .order_by_desc(monitor_check::Column::Id)
        .limit(limit)
        .all(db)
        .await?
        .into_iter()
        .map(row_to_observation)
        .collect()
}

#[derive(FromQueryResult)]
struct CheckTotals {
    total: i64,
    latency_sum: Option<i64>,
}

pub async fn check_stats(db: &DatabaseConnection, monitor_id: &str) -> Result<ObservationStats, StoreError> {
    // SUM(bigint) is numeric on postgres
    let totals = monitor_check::Entity::find()
        .select_only()
        .column_as(Expr::col(monitor_check::Column::Id).count(), "total")
        .column_as(
            Expr::col(monitor_check::Column::ResponseTime)
                .sum()
                .cast_as(Alias::new("BIGINT")),
            "latency_sum",
        )
        .filter(monitor_check::Column::MonitorId.eq(monitor_id))
        .into_model::<CheckTotals>()
        .one(db)
        .await?;
    let Some(totals) = totals.filter(|t| t.total > 0) else {
        return Ok(ObservationStats::from_counts(0, 0, 0));
    };

    let up = monitor_check::Entity::find()
        .filter(monitor_check::Column::MonitorId.eq(monitor_id))
        .filter(monitor_check::Column::Status.eq(CheckStatus::Up.as_str()))
        .count(db)
        .await?;
    Ok(ObservationStats::from_counts(
        u64::try_from(totals.total).unwrap_or(0),
        up,
        totals
            .latency_sum
            .and_then(|sum| u64::try_from(sum).ok())
            .unwrap_or(0),
    ))
}
