//! Active probe executors.
//!
//! Every probe returns a [`ProbeOutcome`]; failures are data, never errors. The
//! [`NetworkProber`] additionally wraps each probe in a hard deadline so a remote
//! endpoint can't hold the scheduler past the target's timeout.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

use crate::models::{CheckStatus, Observation, ProbeKind, Target};

pub mod http;
pub mod status_api;
pub mod tcp;

pub use status_api::ServerState;

pub const USER_AGENT: &str = "UptimeMonitor/1.0";

/// Slack on top of the target's own timeout before the outer deadline fires.
const PROBE_GRACE: Duration = Duration::from_secs(2);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    #[error("timed out after {0}s")]
    Timeout(u64),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("status code {0} not in expected list")]
    UnexpectedStatus(u16),
    #[error("forbidden keyword \"{0}\" detected")]
    ForbiddenKeyword(String),
    #[error("keyword \"{0}\" not found")]
    KeywordMissing(String),
    #[error("status API returned HTTP {0}")]
    StatusApiHttp(u16),
    #[error("status API error: {0}")]
    StatusApiError(String),
    #[error("offline servers: {0}")]
    ServersOffline(String),
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("{0} targets are not actively probed")]
    Unsupported(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    pub status: CheckStatus,
    pub response_time_ms: u64,
    /// Zero when no HTTP response was received.
    pub status_code: u16,
    pub failure: Option<ProbeFailure>,
}

impl ProbeOutcome {
    pub fn up(started: Instant, status_code: u16) -> Self {
        Self {
            status: CheckStatus::Up,
            response_time_ms: elapsed_ms(started),
            status_code,
            failure: None,
        }
    }

    pub fn down(started: Instant, status_code: u16, failure: ProbeFailure) -> Self {
        Self {
            status: CheckStatus::Down,
            response_time_ms: elapsed_ms(started),
            status_code,
            failure: Some(failure),
        }
    }

    pub fn from_result(started: Instant, status_code: u16, result: Result<(), ProbeFailure>) -> Self {
        match result {
            Ok(()) => Self::up(started, status_code),
            Err(failure) => Self::down(started, status_code, failure),
        }
    }

    pub fn error_message(&self) -> String {
        self.failure
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default()
    }

    pub fn into_observation(self, monitor_id: &str, checked_at: DateTime<Utc>) -> Observation {
        Observation {
            monitor_id: monitor_id.to_string(),
            status: self.status,
            response_time_ms: self.response_time_ms,
            status_code: self.status_code,
            error_message: self.error_message(),
            checked_at,
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Runs active checks. The engine depends on this trait rather than on the network directly.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, target: &Target) -> ProbeOutcome;

    /// Per-server breakdown of a status-API target.
    async fn status_api_servers(&self, target: &Target) -> Result<Vec<ServerState>, ProbeFailure>;
}

pub struct NetworkProber {
    client: reqwest::Client,
}

impl NetworkProber {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Prober for NetworkProber {
    async fn probe(&self, target: &Target) -> ProbeOutcome {
        let started = Instant::now();
        let timeout = target.timeout();
        let check = async {
            match &target.probe {
                ProbeKind::Http(params) => http::check(&self.client, target, params).await,
                ProbeKind::Tcp => tcp::check(target).await,
                ProbeKind::StatusApi(params) => status_api::check(&self.client, target, params).await,
                ProbeKind::PassiveListen(_) => ProbeOutcome::down(
                    started,
                    0,
                    ProbeFailure::Unsupported(target.probe.name()),
                ),
            }
        };

        match tokio::time::timeout(timeout + PROBE_GRACE, check).await {
            Ok(outcome) => {
                debug!(monitor_id = %target.id, status = %outcome.status, latency_ms = outcome.response_time_ms, "Probe finished.");
                outcome
            }
            Err(_) => ProbeOutcome::down(started, 0, ProbeFailure::Timeout(timeout.as_secs())),
        }
    }

    async fn status_api_servers(&self, target: &Target) -> Result<Vec<ServerState>, ProbeFailure> {
        let ProbeKind::StatusApi(params) = &target.probe else {
            return Err(ProbeFailure::Unsupported(target.probe.name()));
        };
        let (_, document) = status_api::fetch_document(&self.client, &target.url, target.timeout()).await?;
        Ok(status_api::evaluate_servers(
            &document.data,
            &params.server_filter,
            params.offline_threshold_minutes,
            Utc::now(),
        ))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::Router;
    use std::net::SocketAddr;

    /// Serves `router` on an ephemeral local port for the lifetime of the test runtime.
    pub async fn spawn_server(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HttpProbe, PassiveListen};

    fn target(probe: ProbeKind, url: &str) -> Target {
        Target {
            id: "p1".to_string(),
            name: "probe".to_string(),
            url: url.to_string(),
            probe,
            check_interval: 1,
            check_interval_max: None,
            check_timeout: 1,
            webhook: None,
            notify_chat_id: None,
            is_active: true,
            sort_order: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_outcome_carries_failure_text_into_observation() {
        let outcome = ProbeOutcome::down(Instant::now(), 503, ProbeFailure::UnexpectedStatus(503));
        let observation = outcome.into_observation("p1", Utc::now());
        assert_eq!(observation.status, CheckStatus::Down);
        assert_eq!(observation.status_code, 503);
        assert_eq!(observation.error_message, "status code 503 not in expected list");
    }

    #[tokio::test]
    async fn test_passive_targets_are_not_probed() {
        let prober = NetworkProber::new().unwrap();
        let passive = target(
            ProbeKind::PassiveListen(PassiveListen {
                chat_id: "1".to_string(),
                server_names: vec!["a".to_string()],
                offline_keywords: vec![],
                online_keywords: vec![],
            }),
            "",
        );
        let outcome = prober.probe(&passive).await;
        assert_eq!(outcome.failure, Some(ProbeFailure::Unsupported("passive_listen")));
    }

    #[tokio::test]
    async fn test_status_api_servers_rejects_other_kinds() {
        let prober = NetworkProber::new().unwrap();
        let http = target(ProbeKind::Http(HttpProbe::default()), "http://127.0.0.1:1");
        assert!(matches!(
            prober.status_api_servers(&http).await,
            Err(ProbeFailure::Unsupported("http"))
        ));
    }
}
