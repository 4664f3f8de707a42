use std::collections::BTreeMap;

use crate::models::{Observation, Target};

/// Why a notification is being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    Down,
    Recovered,
    /// Manual check of the endpoint; renders exactly like a `Down` alert.
    Test,
}

impl TransitionKind {
    /// Value of the `status` variable and of the default payload's `status` field.
    pub fn status_label(&self) -> &'static str {
        match self {
            TransitionKind::Down | TransitionKind::Test => "down",
            TransitionKind::Recovered => "recovered",
        }
    }
}

/// Named values available to `{{name}}` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateVariables {
    pub monitor_name: String,
    pub monitor_url: String,
    pub status: String,
    pub error: String,
    pub timestamp: String,
    pub response_time: u64,
    pub status_code: u16,
}

impl TemplateVariables {
    pub fn new(target: &Target, observation: &Observation, kind: TransitionKind) -> Self {
        Self {
            monitor_name: target.name.clone(),
            monitor_url: target.url.clone(),
            status: kind.status_label().to_string(),
            error: observation.error_message.clone(),
            timestamp: observation.checked_at.to_rfc3339(),
            response_time: observation.response_time_ms,
            status_code: observation.status_code,
        }
    }

    pub fn as_map(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("monitor_name", self.monitor_name.clone()),
            ("monitor_url", self.monitor_url.clone()),
            ("status", self.status.clone()),
            ("error", self.error.clone()),
            ("timestamp", self.timestamp.clone()),
            ("response_time", self.response_time.to_string()),
            ("status_code", self.status_code.to_string()),
        ])
    }
}
