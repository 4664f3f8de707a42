//! Third-party status API: a document listing servers with their last report time.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::{ProbeFailure, ProbeOutcome};
use crate::models::{StatusApiProbe, Target};

#[derive(Debug, Clone, Deserialize)]
pub struct StatusDocument {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Vec<StatusEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusEntry {
    #[serde(default)]
    pub uuid: Option<String>,
    pub name: String,
    #[serde(default)]
    pub region: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerState {
    pub name: String,
    pub region: String,
    pub updated_at: DateTime<Utc>,
    pub minutes_ago: i64,
    pub is_online: bool,
}

/// Fetches and validates the status document. Returns the HTTP status code alongside it.
pub async fn fetch_document(
    client: &Client,
    url: &str,
    timeout: Duration,
) -> Result<(u16, StatusDocument), ProbeFailure> {
    let map_err = |e: reqwest::Error| {
        if e.is_timeout() {
            ProbeFailure::Timeout(timeout.as_secs())
        } else {
            ProbeFailure::Transport(e.to_string())
        }
    };

    let response = client.get(url).timeout(timeout).send().await.map_err(map_err)?;
    let code = response.status().as_u16();
    if !response.status().is_success() {
        return Err(ProbeFailure::StatusApiHttp(code));
    }
    let document: StatusDocument = response.json().await.map_err(|e| {
        if e.is_timeout() {
            ProbeFailure::Timeout(timeout.as_secs())
        } else {
            ProbeFailure::StatusApiError(format!("unreadable document: {e}"))
        }
    })?;
    if document.status != "success" {
        let message = document
            .message
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or("unknown error");
        return Err(ProbeFailure::StatusApiError(message.to_string()));
    }
    Ok((code, document))
}

/// Applies the name allow-list and classifies every remaining server.
///
/// A server is offline once its last update is strictly older than the threshold.
/// An empty filter keeps every server.
pub fn evaluate_servers(
    entries: &[StatusEntry],
    filter: &[String],
    offline_threshold_minutes: u32,
    now: DateTime<Utc>,
) -> Vec<ServerState> {
    let threshold_ms = i64::from(offline_threshold_minutes) * 60_000;
    entries
        .iter()
        .filter(|entry| filter.is_empty() || filter.iter().any(|name| name == &entry.name))
        .map(|entry| {
            let since_ms = (now - entry.updated_at).num_milliseconds();
            ServerState {
                name: entry.name.clone(),
                region: entry.region.clone(),
                updated_at: entry.updated_at,
                minutes_ago: since_ms.div_euclid(60_000),
                is_online: since_ms <= threshold_ms,
            }
        })
        .collect()
}

fn offline_summary(servers: &[ServerState]) -> Option<String> {
    let offline: Vec<String> = servers
        .iter()
        .filter(|s| !s.is_online)
        .map(|s| format!("{}{}({}min)", s.region, s.name, s.minutes_ago))
        .collect();
    if offline.is_empty() {
        None
    } else {
        Some(offline.join(", "))
    }
}

pub async fn check(client: &Client, target: &Target, params: &StatusApiProbe) -> ProbeOutcome {
    let started = Instant::now();
    let (code, document) = match fetch_document(client, &target.url, target.timeout()).await {
        Ok(fetched) => fetched,
        Err(ProbeFailure::StatusApiHttp(code)) => {
            return ProbeOutcome::down(started, code, ProbeFailure::StatusApiHttp(code));
        }
        Err(failure) => return ProbeOutcome::down(started, 0, failure),
    };

    let servers = evaluate_servers(
        &document.data,
        &params.server_filter,
        params.offline_threshold_minutes,
        Utc::now(),
    );
    match offline_summary(&servers) {
        Some(summary) => ProbeOutcome::down(started, code, ProbeFailure::ServersOffline(summary)),
        None => ProbeOutcome::up(started, code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CheckStatus, ProbeKind};
    use crate::probes::test_support::spawn_server;
    use axum::{routing::get, Json, Router};
    use chrono::Duration as ChronoDuration;
    use serde_json::json;

    fn entry(name: &str, region: &str, updated_at: DateTime<Utc>) -> StatusEntry {
        StatusEntry {
            uuid: None,
            name: name.to_string(),
            region: region.to_string(),
            updated_at,
        }
    }

    #[test]
    fn test_threshold_is_strict() {
        let now = Utc::now();
        let entries = vec![
            entry("edge", "HK", now - ChronoDuration::minutes(3)),
            entry("core", "SG", now - ChronoDuration::minutes(3) - ChronoDuration::seconds(1)),
        ];
        let servers = evaluate_servers(&entries, &[], 3, now);
        assert!(servers[0].is_online);
        assert!(!servers[1].is_online);
        assert_eq!(offline_summary(&servers).as_deref(), Some("SGcore(3min)"));
    }

    #[test]
    fn test_filter_is_exact_name_match() {
        let now = Utc::now();
        let entries = vec![
            entry("edge-1", "", now - ChronoDuration::minutes(30)),
            entry("edge", "", now),
        ];
        let servers = evaluate_servers(&entries, &["edge".to_string()], 3, now);
        assert_eq!(servers.len(), 1);
        assert!(offline_summary(&servers).is_none());
    }

    async fn run_against(body: serde_json::Value, filter: Vec<String>) -> ProbeOutcome {
        let router = Router::new().route("/api/nodes", get(move || {
            let body = body.clone();
            async move { Json(body) }
        }));
        let addr = spawn_server(router).await;
        let params = StatusApiProbe {
            server_filter: filter,
            offline_threshold_minutes: 3,
        };
        let target = Target {
            id: "s1".to_string(),
            name: "fleet".to_string(),
            url: format!("http://{addr}/api/nodes"),
            probe: ProbeKind::StatusApi(params.clone()),
            check_interval: 1,
            check_interval_max: None,
            check_timeout: 2,
            webhook: None,
            notify_chat_id: None,
            is_active: true,
            sort_order: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        check(&Client::new(), &target, &params).await
    }

    #[tokio::test]
    async fn test_stale_server_fails_probe() {
        let stale = (Utc::now() - ChronoDuration::minutes(10)).to_rfc3339();
        let fresh = Utc::now().to_rfc3339();
        let outcome = run_against(
            json!({
                "status": "success",
                "data": [
                    { "uuid": "a", "name": "tokyo", "region": "JP", "updated_at": stale },
                    { "uuid": "b", "name": "paris", "region": "FR", "updated_at": fresh }
                ]
            }),
            vec![],
        )
        .await;
        assert_eq!(outcome.status, CheckStatus::Down);
        assert_eq!(outcome.status_code, 200);
        assert_eq!(outcome.error_message(), "offline servers: JPtokyo(10min)");

        let filtered = run_against(
            json!({
                "status": "success",
                "data": [
                    { "name": "tokyo", "region": "JP", "updated_at": stale },
                    { "name": "paris", "region": "FR", "updated_at": fresh }
                ]
            }),
            vec!["paris".to_string()],
        )
        .await;
        assert_eq!(filtered.status, CheckStatus::Up);
    }

    #[tokio::test]
    async fn test_error_document_fails_probe() {
        let outcome = run_against(json!({ "status": "error", "message": "token expired" }), vec![]).await;
        assert_eq!(
            outcome.failure,
            Some(ProbeFailure::StatusApiError("token expired".to_string()))
        );
    }
}
