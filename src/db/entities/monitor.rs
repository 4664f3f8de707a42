use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "monitors")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub url: String,
    pub check_type: String,
    pub check_method: String,
    pub check_interval: i32,
    pub check_interval_max: Option<i32>,
    pub check_timeout: i32,
    pub expected_status_codes: String,
    pub expected_keyword: Option<String>,
    pub forbidden_keyword: Option<String>,
    pub server_filter: Option<String>,
    pub offline_threshold_minutes: i32,
    pub listen_chat_id: Option<String>,
    pub listen_server_names: Option<String>,
    pub listen_offline_keywords: Option<String>,
    pub listen_online_keywords: Option<String>,
    pub notify_chat_id: Option<String>,
    pub webhook_url: Option<String>,
    pub webhook_content_type: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub webhook_headers: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub webhook_body: Option<String>,
    pub webhook_username: Option<String>,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::monitor_check::Entity")]
    MonitorCheck,
    #[sea_orm(has_many = "super::incident::Entity")]
    Incident,
}

impl Related<super::monitor_check::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MonitorCheck.def()
    }
}

impl Related<super::incident::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Incident.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
