//! Monitor rows and their mapping to [`Target`].
//!
//! List-valued parameters are stored comma-joined; webhook headers are stored as a JSON object.

use sea_orm::{
    sea_query::{Expr, OnConflict}, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::collections::HashMap;

use crate::db::entities::{incident, monitor, monitor_check};
use crate::db::StoreError;
use crate::models::{
    HttpMethod, HttpProbe, PassiveListen, ProbeKind, StatusApiProbe, Target, WebhookConfig,
    DEFAULT_EXPECTED_STATUS_CODES, DEFAULT_WEBHOOK_CONTENT_TYPE,
};

fn join_list(items: &[String]) -> Option<String> {
    if items.is_empty() {
        None
    } else {
        Some(items.join(","))
    }
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_status_codes(value: &str) -> Vec<u16> {
    let codes: Vec<u16> = value
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();
    if codes.is_empty() {
        DEFAULT_EXPECTED_STATUS_CODES.to_vec()
    } else {
        codes
    }
}

fn non_negative(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

pub(crate) fn model_to_target(row: monitor::Model) -> Result<Target, StoreError> {
    let probe = match row.check_type.as_str() {
        "http" => ProbeKind::Http(HttpProbe {
            method: row
                .check_method
                .parse::<HttpMethod>()
                .map_err(StoreError::Corrupt)?,
            expected_status_codes: parse_status_codes(&row.expected_status_codes),
            expected_keyword: row.expected_keyword,
            forbidden_keyword: row.forbidden_keyword,
        }),
        "tcp" => ProbeKind::Tcp,
        "status_api" => ProbeKind::StatusApi(StatusApiProbe {
            server_filter: split_list(row.server_filter.as_deref()),
            offline_threshold_minutes: non_negative(row.offline_threshold_minutes),
        }),
        "passive_listen" => ProbeKind::PassiveListen(PassiveListen {
            chat_id: row.listen_chat_id.unwrap_or_default(),
            server_names: split_list(row.listen_server_names.as_deref()),
            offline_keywords: split_list(row.listen_offline_keywords.as_deref()),
            online_keywords: split_list(row.listen_online_keywords.as_deref()),
        }),
        other => {
            return Err(StoreError::Corrupt(format!(
                "monitor {} has unknown check type '{other}'",
                row.id
            )))
        }
    };

    let webhook = match row.webhook_url.filter(|u| !u.trim().is_empty()) {
        Some(url) => {
            let headers: HashMap<String, String> = match row.webhook_headers.as_deref() {
                Some(raw) if !raw.trim().is_empty() => serde_json::from_str(raw)?,
                _ => HashMap::new(),
            };
            Some(WebhookConfig {
                url,
                content_type: if row.webhook_content_type.is_empty() {
                    DEFAULT_WEBHOOK_CONTENT_TYPE.to_string()
                } else {
                    row.webhook_content_type
                },
                headers,
                body_template: row.webhook_body,
                username: row.webhook_username,
            })
        }
        None => None,
    };

    Ok(Target {
        id: row.id,
        name: row.name,
        url: row.url,
        probe,
        check_interval: non_negative(row.check_interval),
        check_interval_max: row.check_interval_max.map(non_negative),
        check_timeout: non_negative(row.check_timeout),
        webhook,
        notify_chat_id: row.notify_chat_id,
        is_active: row.is_active,
        sort_order: row.sort_order,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn target_to_active_model(target: &Target) -> Result<monitor::ActiveModel, StoreError> {
    let clamp = |v: u32| i32::try_from(v).unwrap_or(i32::MAX);

    let mut model = monitor::ActiveModel {
        id: Set(target.id.clone()),
        name: Set(target.name.clone()),
        url: Set(target.url.clone()),
        check_type: Set(target.probe.name().to_string()),
        check_method: Set(HttpMethod::Get.as_str().to_string()),
        check_interval: Set(clamp(target.check_interval)),
        check_interval_max: Set(target.check_interval_max.map(clamp)),
        check_timeout: Set(clamp(target.check_timeout)),
        expected_status_codes: Set(String::new()),
        expected_keyword: Set(None),
        forbidden_keyword: Set(None),
        server_filter: Set(None),
        offline_threshold_minutes: Set(0),
        listen_chat_id: Set(None),
        listen_server_names: Set(None),
        listen_offline_keywords: Set(None),
        listen_online_keywords: Set(None),
        notify_chat_id: Set(target.notify_chat_id.clone()),
        webhook_url: Set(None),
        webhook_content_type: Set(DEFAULT_WEBHOOK_CONTENT_TYPE.to_string()),
        webhook_headers: Set(None),
        webhook_body: Set(None),
        webhook_username: Set(None),
        is_active: Set(target.is_active),
        sort_order: Set(target.sort_order),
        created_at: Set(target.created_at),
        updated_at: Set(target.updated_at),
    };

    match &target.probe {
        ProbeKind::Http(http) => {
            model.check_method = Set(http.method.as_str().to_string());
            model.expected_status_codes = Set(http
                .expected_status_codes
                .iter()
                .map(u16::to_string)
                .collect::<Vec<_>>()
                .join(","));
            model.expected_keyword = Set(http.expected_keyword.clone());
            model.forbidden_keyword = Set(http.forbidden_keyword.clone());
        }
        ProbeKind::Tcp => {}
        ProbeKind::StatusApi(api) => {
            model.server_filter = Set(join_list(&api.server_filter));
            model.offline_threshold_minutes = Set(clamp(api.offline_threshold_minutes));
        }
        ProbeKind::PassiveListen(listen) => {
            model.listen_chat_id = Set(Some(listen.chat_id.clone()));
            model.listen_server_names = Set(join_list(&listen.server_names));
            model.listen_offline_keywords = Set(join_list(&listen.offline_keywords));
            model.listen_online_keywords = Set(join_list(&listen.online_keywords));
        }
    }

    if let Some(webhook) = &target.webhook {
        model.webhook_url = Set(Some(webhook.url.clone()));
        model.webhook_content_type = Set(webhook.content_type.clone());
        model.webhook_headers = Set(if webhook.headers.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&webhook.headers)?)
        });
        model.webhook_body = Set(webhook.body_template.clone());
        model.webhook_username = Set(webhook.username.clone());
    }

    Ok(model)
}

/// Retrieves all monitors, ordered for display.
pub async fn list_monitors(db: &DatabaseConnection) -> Result<Vec<Target>, StoreError> {
    monitor::Entity::find()
        .order_by_asc(monitor::Column::SortOrder)
        .order_by_desc(monitor::Column::CreatedAt)
        .all(db)
        .await?
        .into_iter()
        .map(model_to_target)
        .collect()
}

pub async fn get_monitor(db: &DatabaseConnection, id: &str) -> Result<Option<Target>, StoreError> {
    monitor::Entity::find_by_id(id.to_owned())
        .one(db)
        .await?
        .map(model_to_target)
        .transpose()
}

/// Inserts the monitor, or overwrites every column of an existing row with the same id.
pub async fn upsert_monitor(db: &DatabaseConnection, target: &Target) -> Result<(), StoreError> {
    let model = target_to_active_model(target)?;
    monitor::Entity::insert(model)
        .on_conflict(
            OnConflict::column(monitor::Column::Id)
                .update_columns([
                    monitor::Column::Name,
                    monitor::Column::Url,
                    monitor::Column::CheckType,
                    monitor::Column::CheckMethod,
                    monitor::Column::CheckInterval,
                    monitor::Column::CheckIntervalMax,
                    monitor::Column::CheckTimeout,
                    monitor::Column::ExpectedStatusCodes,
                    monitor::Column::ExpectedKeyword,
                    monitor::Column::ForbiddenKeyword,
                    monitor::Column::ServerFilter,
                    monitor::Column::OfflineThresholdMinutes,
                    monitor::Column::ListenChatId,
                    monitor::Column::ListenServerNames,
                    monitor::Column::ListenOfflineKeywords,
                    monitor::Column::ListenOnlineKeywords,
                    monitor::Column::NotifyChatId,
                    monitor::Column::WebhookUrl,
                    monitor::Column::WebhookContentType,
                    monitor::Column::WebhookHeaders,
                    monitor::Column::WebhookBody,
                    monitor::Column::WebhookUsername,
                    monitor::Column::IsActive,
                    monitor::Column::SortOrder,
                    monitor::Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec(db)
        .await?;
    Ok(())
}

/// Deletes a monitor together with its checks and incidents.
pub async fn delete_monitor(db: &DatabaseConnection, id: &str) -> Result<bool, DbErr> {
    let txn = db.begin().await?;
    monitor_check::Entity::delete_many()
        .filter(monitor_check::Column::MonitorId.eq(id))
        .exec(&txn)
        .await?;
    incident::Entity::delete_many()
        .filter(incident::Column::MonitorId.eq(id))
        .exec(&txn)
        .await?;
    let result = monitor::Entity::delete_by_id(id.to_owned()).exec(&txn).await?;
    txn.commit().await?;
    Ok(result.rows_affected > 0)
}

pub async fn update_sort_order(db: &DatabaseConnection, id: &str, sort_order: i32) -> Result<(), DbErr> {
    monitor::Entity::update_many()
        .col_expr(monitor::Column::SortOrder, Expr::value(sort_order))
        .filter(monitor::Column::Id.eq(id))
        .exec(db)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample(probe: ProbeKind) -> Target {
        Target {
            id: "m-1".to_string(),
            name: "edge".to_string(),
            url: "https://example.com".to_string(),
            probe,
            check_interval: 5,
            check_interval_max: Some(9),
            check_timeout: 20,
            webhook: None,
            notify_chat_id: Some("-100".to_string()),
            is_active: true,
            sort_order: 3,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn roundtrip(target: &Target) -> Target {
        let active = target_to_active_model(target).unwrap();
        let row = monitor::Model {
            id: active.id.unwrap(),
            name: active.name.unwrap(),
            url: active.url.unwrap(),
            check_type: active.check_type.unwrap(),
            check_method: active.check_method.unwrap(),
            check_interval: active.check_interval.unwrap(),
            check_interval_max: active.check_interval_max.unwrap(),
            check_timeout: active.check_timeout.unwrap(),
            expected_status_codes: active.expected_status_codes.unwrap(),
            expected_keyword: active.expected_keyword.unwrap(),
            forbidden_keyword: active.forbidden_keyword.unwrap(),
            server_filter: active.server_filter.unwrap(),
            offline_threshold_minutes: active.offline_threshold_minutes.unwrap(),
            listen_chat_id: active.listen_chat_id.unwrap(),
            listen_server_names: active.listen_server_names.unwrap(),
            listen_offline_keywords: active.listen_offline_keywords.unwrap(),
            listen_online_keywords: active.listen_online_keywords.unwrap(),
            notify_chat_id: active.notify_chat_id.unwrap(),
            webhook_url: active.webhook_url.unwrap(),
            webhook_content_type: active.webhook_content_type.unwrap(),
            webhook_headers: active.webhook_headers.unwrap(),
            webhook_body: active.webhook_body.unwrap(),
            webhook_username: active.webhook_username.unwrap(),
            is_active: active.is_active.unwrap(),
            sort_order: active.sort_order.unwrap(),
            created_at: active.created_at.unwrap(),
            updated_at: active.updated_at.unwrap(),
        };
        model_to_target(row).unwrap()
    }

    #[test]
    fn test_passive_listen_lists_survive_storage() {
        let target = sample(ProbeKind::PassiveListen(PassiveListen {
            chat_id: "-100123".to_string(),
            server_names: vec!["hk-1".to_string(), "sg-2".to_string()],
            offline_keywords: vec![],
            online_keywords: vec!["back".to_string()],
        }));
        assert_eq!(roundtrip(&target), target);
    }

    #[test]
    fn test_webhook_headers_are_stored_as_json() {
        let mut target = sample(ProbeKind::Http(HttpProbe {
            method: HttpMethod::Head,
            expected_status_codes: vec![200, 418],
            expected_keyword: Some("ok".to_string()),
            forbidden_keyword: None,
        }));
        target.webhook = Some(WebhookConfig {
            url: "https://hooks.example.com/x".to_string(),
            content_type: "application/json".to_string(),
            headers: HashMap::from([("X-Token".to_string(), "abc".to_string())]),
            body_template: Some(r#"{"text":"{{monitor_name}}"}"#.to_string()),
            username: Some("bot".to_string()),
        });
        assert_eq!(roundtrip(&target), target);
    }

    #[test]
    fn test_empty_status_codes_fall_back_to_defaults() {
        assert_eq!(parse_status_codes(" , "), DEFAULT_EXPECTED_STATUS_CODES.to_vec());
        assert_eq!(parse_status_codes("200, 404"), vec![200, 404]);
    }
}
