//! Domain types shared by the probe, scheduling, incident and ingestion layers.
//!
//! A [`Target`] is what users configure (called a "monitor" on the wire), an
//! [`Observation`] is one immutable up/down evaluation of it, and an
//! [`Incident`] is a continuous down-period.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_EXPECTED_STATUS_CODES: [u16; 5] = [200, 201, 204, 301, 302];
pub const DEFAULT_CHECK_INTERVAL_MINUTES: u32 = 5;
pub const DEFAULT_CHECK_TIMEOUT_SECONDS: u32 = 30;
pub const DEFAULT_OFFLINE_THRESHOLD_MINUTES: u32 = 3;
pub const DEFAULT_WEBHOOK_CONTENT_TYPE: &str = "application/json";

/// Keywords that mark an inbound alert text as "offline" when a target doesn't configure its own.
pub const DEFAULT_OFFLINE_KEYWORDS: [&str; 4] = ["离线", "offline", "down", "掉线"];
/// Keywords that mark an inbound alert text as "online" when a target doesn't configure its own.
pub const DEFAULT_ONLINE_KEYWORDS: [&str; 4] = ["上线", "online", "up", "恢复"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Up,
    Down,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Up => "up",
            CheckStatus::Down => "down",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(CheckStatus::Up),
            "down" => Ok(CheckStatus::Down),
            other => Err(format!("unknown check status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Head,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
        }
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "HEAD" => Ok(HttpMethod::Head),
            "POST" => Ok(HttpMethod::Post),
            other => Err(format!("unsupported HTTP method: {other}")),
        }
    }
}

fn default_expected_status_codes() -> Vec<u16> {
    DEFAULT_EXPECTED_STATUS_CODES.to_vec()
}

fn default_offline_threshold() -> u32 {
    DEFAULT_OFFLINE_THRESHOLD_MINUTES
}

/// Parameters of an active HTTP check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpProbe {
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default = "default_expected_status_codes")]
    pub expected_status_codes: Vec<u16>,
    /// Substring that must be present in the response body.
    #[serde(default)]
    pub expected_keyword: Option<String>,
    /// Substring that must not be present in the response body. Wins over the status code.
    #[serde(default)]
    pub forbidden_keyword: Option<String>,
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self {
            method: HttpMethod::Get,
            expected_status_codes: default_expected_status_codes(),
            expected_keyword: None,
            forbidden_keyword: None,
        }
    }
}

/// Parameters of a third-party status API check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusApiProbe {
    /// Allow-list of sub-resource names; empty means every entry is considered.
    #[serde(default)]
    pub server_filter: Vec<String>,
    #[serde(default = "default_offline_threshold")]
    pub offline_threshold_minutes: u32,
}

impl Default for StatusApiProbe {
    fn default() -> Self {
        Self {
            server_filter: Vec::new(),
            offline_threshold_minutes: DEFAULT_OFFLINE_THRESHOLD_MINUTES,
        }
    }
}

/// Parameters of a target whose state arrives as unsolicited chat messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassiveListen {
    /// Chat address the bot listens on for this target.
    pub chat_id: String,
    /// Case-insensitive name filters; a message must contain one of them.
    #[serde(default)]
    pub server_names: Vec<String>,
    #[serde(default)]
    pub offline_keywords: Vec<String>,
    #[serde(default)]
    pub online_keywords: Vec<String>,
}

/// How a target's state is obtained. Each variant owns its own parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeKind {
    Http(HttpProbe),
    Tcp,
    StatusApi(StatusApiProbe),
    PassiveListen(PassiveListen),
}

impl ProbeKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProbeKind::Http(_) => "http",
            ProbeKind::Tcp => "tcp",
            ProbeKind::StatusApi(_) => "status_api",
            ProbeKind::PassiveListen(_) => "passive_listen",
        }
    }

    /// Passive-listen targets are never probed by the scheduler.
    pub fn is_actively_probed(&self) -> bool {
        !matches!(self, ProbeKind::PassiveListen(_))
    }
}

/// Outbound webhook settings of a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Raw JSON body template with `{{variable}}` placeholders.
    #[serde(default)]
    pub body_template: Option<String>,
    /// Basic-auth username; the password is always empty.
    #[serde(default)]
    pub username: Option<String>,
}

fn default_content_type() -> String {
    DEFAULT_WEBHOOK_CONTENT_TYPE.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub id: String,
    pub name: String,
    /// Probe address; empty for passive-listen targets.
    pub url: String,
    pub probe: ProbeKind,
    /// Fixed interval in minutes.
    pub check_interval: u32,
    /// Upper bound of the randomized interval, honoured for HTTP targets only.
    pub check_interval_max: Option<u32>,
    /// Probe timeout in seconds.
    pub check_timeout: u32,
    pub webhook: Option<WebhookConfig>,
    /// Chat address that receives a short human-readable message on transitions.
    pub notify_chat_id: Option<String>,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Target {
    /// The inclusive randomized interval range, if one is configured and valid.
    ///
    /// A bound that doesn't exceed the fixed interval is ignored.
    pub fn randomized_range(&self) -> Option<(u32, u32)> {
        match (&self.probe, self.check_interval_max) {
            (ProbeKind::Http(_), Some(max)) if max > self.check_interval => {
                Some((self.check_interval, max))
            }
            _ => None,
        }
    }

    pub fn fixed_interval(&self) -> u32 {
        if self.check_interval == 0 {
            DEFAULT_CHECK_INTERVAL_MINUTES
        } else {
            self.check_interval
        }
    }

    pub fn timeout(&self) -> Duration {
        let secs = if self.check_timeout == 0 {
            DEFAULT_CHECK_TIMEOUT_SECONDS
        } else {
            self.check_timeout
        };
        Duration::from_secs(u64::from(secs))
    }

    pub fn notify_chat(&self) -> Option<&str> {
        self.notify_chat_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// One immutable evaluation of a target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub monitor_id: String,
    pub status: CheckStatus,
    pub response_time_ms: u64,
    /// Zero when no HTTP response was involved.
    pub status_code: u16,
    pub error_message: String,
    pub checked_at: DateTime<Utc>,
}

impl Observation {
    /// An observation that didn't come from an active probe.
    pub fn passive(monitor_id: &str, status: CheckStatus, error_message: String) -> Self {
        Self {
            monitor_id: monitor_id.to_string(),
            status,
            response_time_ms: 0,
            status_code: 0,
            error_message,
            checked_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: i64,
    pub monitor_id: String,
    pub started_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub notified: bool,
}

impl Incident {
    pub fn is_open(&self) -> bool {
        self.resolved_at.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationStats {
    pub total_checks: u64,
    pub uptime_percentage: f64,
    pub average_response_time: f64,
}

impl ObservationStats {
    pub fn from_counts(total: u64, up: u64, latency_sum: u64) -> Self {
        if total == 0 {
            return Self {
                total_checks: 0,
                uptime_percentage: 0.0,
                average_response_time: 0.0,
            };
        }
        Self {
            total_checks: total,
            uptime_percentage: up as f64 / total as f64 * 100.0,
            average_response_time: latency_sum as f64 / total as f64,
        }
    }
}
