//! User-supplied target definitions and their normalization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::EngineError;
use crate::models::{
    ProbeKind, Target, WebhookConfig, DEFAULT_CHECK_INTERVAL_MINUTES, DEFAULT_CHECK_TIMEOUT_SECONDS,
    DEFAULT_EXPECTED_STATUS_CODES, DEFAULT_OFFLINE_THRESHOLD_MINUTES,
};

fn default_true() -> bool {
    true
}

/// Body of create and update requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetInput {
    pub name: String,
    #[serde(default)]
    pub url: String,
    pub probe: ProbeKind,
    #[serde(default)]
    pub check_interval: Option<u32>,
    #[serde(default)]
    pub check_interval_max: Option<u32>,
    #[serde(default)]
    pub check_timeout: Option<u32>,
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
    #[serde(default)]
    pub notify_chat_id: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty())
        .collect()
}

impl TargetInput {
    /// Validates the input and fills defaults.
    pub fn normalize(self) -> Result<NormalizedInput, EngineError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(EngineError::InvalidInput("name is required".to_string()));
        }

        let check_interval = self.check_interval.unwrap_or(DEFAULT_CHECK_INTERVAL_MINUTES);
        if check_interval < 1 {
            return Err(EngineError::InvalidInput(
                "check_interval must be at least 1 minute".to_string(),
            ));
        }
        let check_timeout = match self.check_timeout {
            None | Some(0) => DEFAULT_CHECK_TIMEOUT_SECONDS,
            Some(secs) => secs,
        };

        let url = self.url.trim().to_string();
        let probe = match self.probe {
            ProbeKind::Http(mut http) => {
                if http.expected_status_codes.is_empty() {
                    http.expected_status_codes = DEFAULT_EXPECTED_STATUS_CODES.to_vec();
                }
                http.expected_keyword = trimmed(http.expected_keyword);
                http.forbidden_keyword = trimmed(http.forbidden_keyword);
                ProbeKind::Http(http)
            }
            ProbeKind::Tcp => ProbeKind::Tcp,
            ProbeKind::StatusApi(mut api) => {
                api.server_filter = clean_list(api.server_filter);
                if api.offline_threshold_minutes == 0 {
                    api.offline_threshold_minutes = DEFAULT_OFFLINE_THRESHOLD_MINUTES;
                }
                ProbeKind::StatusApi(api)
            }
            ProbeKind::PassiveListen(mut listen) => {
                listen.chat_id = listen.chat_id.trim().to_string();
                if listen.chat_id.is_empty() {
                    return Err(EngineError::InvalidInput(
                        "passive listen targets need a chat address".to_string(),
                    ));
                }
                listen.server_names = clean_list(listen.server_names);
                if listen.server_names.is_empty() {
                    return Err(EngineError::InvalidInput(
                        "passive listen targets need at least one server name".to_string(),
                    ));
                }
                listen.offline_keywords = clean_list(listen.offline_keywords);
                listen.online_keywords = clean_list(listen.online_keywords);
                ProbeKind::PassiveListen(listen)
            }
        };

        if probe.is_actively_probed() && url.is_empty() {
            return Err(EngineError::InvalidInput(format!(
                "{} targets need a probe address",
                probe.name()
            )));
        }

        let webhook = self
            .webhook
            .filter(|w| !w.url.trim().is_empty())
            .map(|mut w| {
                w.url = w.url.trim().to_string();
                w.username = trimmed(w.username);
                w.body_template = w.body_template.filter(|b| !b.trim().is_empty());
                w
            });

        Ok(NormalizedInput {
            name,
            url,
            probe,
            check_interval,
            check_interval_max: self.check_interval_max.filter(|max| *max > 0),
            check_timeout,
            webhook,
            notify_chat_id: trimmed(self.notify_chat_id),
            is_active: self.is_active,
        })
    }
}

/// A validated [`TargetInput`].
#[derive(Debug, Clone)]
pub struct NormalizedInput {
    name: String,
    url: String,
    probe: ProbeKind,
    check_interval: u32,
    check_interval_max: Option<u32>,
    check_timeout: u32,
    webhook: Option<WebhookConfig>,
    notify_chat_id: Option<String>,
    is_active: bool,
}

impl NormalizedInput {
    pub fn into_target(self, id: String, sort_order: i32, created_at: DateTime<Utc>) -> Target {
        Target {
            id,
            name: self.name,
            url: self.url,
            probe: self.probe,
            check_interval: self.check_interval,
            check_interval_max: self.check_interval_max,
            check_timeout: self.check_timeout,
            webhook: self.webhook,
            notify_chat_id: self.notify_chat_id,
            is_active: self.is_active,
            sort_order,
            created_at,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> TargetInput {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_defaults_are_filled() {
        let input = parse(json!({
            "name": "  api  ",
            "url": "https://api.example.com",
            "probe": { "kind": "http", "expected_status_codes": [] },
            "check_timeout": 0
        }));
        let target = input.normalize().unwrap().into_target("id".into(), 0, Utc::now());
        assert_eq!(target.name, "api");
        assert_eq!(target.check_interval, 5);
        assert_eq!(target.check_timeout, 30);
        assert!(target.is_active);
        match target.probe {
            ProbeKind::Http(http) => assert_eq!(http.expected_status_codes, DEFAULT_EXPECTED_STATUS_CODES.to_vec()),
            other => panic!("unexpected probe {other:?}"),
        }
    }

    #[test]
    fn test_rejects_blank_name_and_zero_interval() {
        let blank = parse(json!({ "name": " ", "url": "x", "probe": { "kind": "tcp" } }));
        assert!(matches!(blank.normalize(), Err(EngineError::InvalidInput(_))));

        let zero = parse(json!({ "name": "db", "url": "db:5432", "probe": { "kind": "tcp" }, "check_interval": 0 }));
        assert!(matches!(zero.normalize(), Err(EngineError::InvalidInput(_))));
    }

    #[test]
    fn test_passive_listen_needs_chat_and_names() {
        let no_chat = parse(json!({
            "name": "hk",
            "probe": { "kind": "passive_listen", "chat_id": " ", "server_names": ["hk-1"] }
        }));
        assert!(no_chat.normalize().is_err());

        let ok = parse(json!({
            "name": "hk",
            "probe": { "kind": "passive_listen", "chat_id": "-100", "server_names": [" hk-1 ", ""] }
        }));
        let target = ok.normalize().unwrap().into_target("id".into(), 0, Utc::now());
        match target.probe {
            ProbeKind::PassiveListen(listen) => assert_eq!(listen.server_names, vec!["hk-1"]),
            other => panic!("unexpected probe {other:?}"),
        }
    }

    #[test]
    fn test_status_api_threshold_default_and_blank_webhook_dropped() {
        let input = parse(json!({
            "name": "fleet",
            "url": "https://status.example.com/api",
            "probe": { "kind": "status_api", "offline_threshold_minutes": 0 },
            "webhook": { "url": "  " }
        }));
        let target = input.normalize().unwrap().into_target("id".into(), 0, Utc::now());
        assert!(target.webhook.is_none());
        match target.probe {
            ProbeKind::StatusApi(api) => assert_eq!(api.offline_threshold_minutes, 3),
            other => panic!("unexpected probe {other:?}"),
        }
    }

    #[test]
    fn test_active_targets_need_an_address() {
        let input = parse(json!({ "name": "db", "probe": { "kind": "tcp" } }));
        assert!(matches!(input.normalize(), Err(EngineError::InvalidInput(_))));
    }
}
