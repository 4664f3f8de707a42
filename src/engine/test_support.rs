//! Fakes for engine tests: a scripted prober, recording senders and a fake bot connector.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;
use tokio::sync::Mutex;

use super::MonitorEngine;
use crate::db::memory::InMemoryStore;
use crate::db::{MonitorStore, StoreError};
use crate::models::{CheckStatus, Incident, Observation, ObservationStats, ProbeKind, Target};
use crate::notifications::senders::{
    ChatConnector, ChatSession, ChatTransport, SenderError, WebhookRequest, WebhookSender,
};
use crate::probes::{ProbeFailure, ProbeOutcome, Prober, ServerState};

pub const VALID_TOKEN: &str = "123456789:valid-token";

pub fn sample_target(id: &str, probe: ProbeKind) -> Target {
    Target {
        id: id.to_string(),
        name: id.to_string(),
        url: "https://example.com".to_string(),
        probe,
        check_interval: 5,
        check_interval_max: None,
        check_timeout: 5,
        webhook: None,
        notify_chat_id: None,
        is_active: true,
        sort_order: 0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Returns queued statuses in order, then `Up`.
#[derive(Default)]
pub struct ScriptedProber {
    queue: StdMutex<VecDeque<(CheckStatus, u16)>>,
    probed: Mutex<Vec<String>>,
}

impl ScriptedProber {
    pub fn push_status(&self, status: CheckStatus) {
        let code = match status {
            CheckStatus::Up => 200,
            CheckStatus::Down => 0,
        };
        self.queue.lock().unwrap().push_back((status, code));
    }

    pub fn push_up_with_code(&self, status_code: u16) {
        self.queue.lock().unwrap().push_back((CheckStatus::Up, status_code));
    }

    pub async fn probed_ids(&self) -> Vec<String> {
        self.probed.lock().await.clone()
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, target: &Target) -> ProbeOutcome {
        self.probed.lock().await.push(target.id.clone());
        let next = self.queue.lock().unwrap().pop_front();
        match next.unwrap_or((CheckStatus::Up, 200)) {
            (CheckStatus::Up, code) => ProbeOutcome::up(Instant::now(), code),
            (CheckStatus::Down, _) => ProbeOutcome::down(
                Instant::now(),
                0,
                ProbeFailure::ConnectionFailed("scripted".to_string()),
            ),
        }
    }

    async fn status_api_servers(&self, target: &Target) -> Result<Vec<ServerState>, ProbeFailure> {
        match target.probe {
            ProbeKind::StatusApi(_) => Ok(Vec::new()),
            _ => Err(ProbeFailure::Unsupported(target.probe.name())),
        }
    }
}

#[derive(Default)]
pub struct RecordingWebhookSender {
    requests: Mutex<Vec<WebhookRequest>>,
    hang_on: Option<String>,
}

impl RecordingWebhookSender {
    /// Never answers requests whose URL contains `fragment`.
    pub fn hanging_for(fragment: &str) -> Self {
        Self {
            hang_on: Some(fragment.to_string()),
            ..Default::default()
        }
    }

    pub async fn bodies(&self) -> Vec<Value> {
        self.requests
            .lock()
            .await
            .iter()
            .map(|r| serde_json::from_str(&r.body).unwrap())
            .collect()
    }
}

#[async_trait]
impl WebhookSender for RecordingWebhookSender {
    async fn send(&self, request: &WebhookRequest) -> Result<(), SenderError> {
        if self.hang_on.as_deref().is_some_and(|f| request.url.contains(f)) {
            std::future::pending::<()>().await;
        }
        self.requests.lock().await.push(request.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingChat {
    sent: Mutex<Vec<(String, String)>>,
    hangs: bool,
}

impl RecordingChat {
    pub fn hanging() -> Self {
        Self {
            hangs: true,
            ..Default::default()
        }
    }

    pub async fn messages(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl ChatTransport for RecordingChat {
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), SenderError> {
        if self.hangs {
            std::future::pending::<()>().await;
        }
        self.sent
            .lock()
            .await
            .push((chat_id.to_string(), text.to_string()));
        Ok(())
    }
}

/// Accepts [`VALID_TOKEN`] only.
pub struct FakeConnector {
    chat: Arc<RecordingChat>,
}

#[async_trait]
impl ChatConnector for FakeConnector {
    async fn connect(&self, token: &str) -> Result<ChatSession, SenderError> {
        if token != VALID_TOKEN {
            return Err(SenderError::SendFailed("Unauthorized".to_string()));
        }
        Ok(ChatSession {
            transport: self.chat.clone(),
            bot_username: "watcher_bot".to_string(),
            listener: None,
        })
    }
}

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub prober: Arc<ScriptedProber>,
    pub webhooks: Arc<RecordingWebhookSender>,
    pub chat: Arc<RecordingChat>,
    pub engine: Arc<MonitorEngine>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_senders(RecordingWebhookSender::default(), RecordingChat::default())
    }

    pub fn with_senders(webhooks: RecordingWebhookSender, chat: RecordingChat) -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self::assemble(store.clone(), store, webhooks, chat)
    }

    /// The engine writes through a [`FlakyStore`] over the harness store.
    pub fn with_flaky_store() -> (Self, Arc<FlakyStore>) {
        let store = Arc::new(InMemoryStore::new());
        let flaky = Arc::new(FlakyStore::new(store.clone()));
        let harness = Self::assemble(
            store,
            flaky.clone(),
            RecordingWebhookSender::default(),
            RecordingChat::default(),
        );
        (harness, flaky)
    }

    fn assemble(
        store: Arc<InMemoryStore>,
        engine_store: Arc<dyn MonitorStore>,
        webhooks: RecordingWebhookSender,
        chat: RecordingChat,
    ) -> Self {
        let prober = Arc::new(ScriptedProber::default());
        let webhooks = Arc::new(webhooks);
        let chat = Arc::new(chat);
        let connector = Arc::new(FakeConnector { chat: chat.clone() });
        let engine = Arc::new(MonitorEngine::new(
            engine_store,
            prober.clone(),
            webhooks.clone(),
            connector,
            4,
        ));
        Self {
            store,
            prober,
            webhooks,
            chat,
            engine,
        }
    }

    pub async fn connect_bot(&self) {
        self.engine.set_bot_token(VALID_TOKEN).await.unwrap();
    }
}

/// Delegates to an [`InMemoryStore`], but fails observation writes while `failing` is set.
pub struct FlakyStore {
    inner: Arc<InMemoryStore>,
    failing: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: Arc<InMemoryStore>) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl MonitorStore for FlakyStore {
    async fn list_targets(&self) -> Result<Vec<Target>, StoreError> {
        self.inner.list_targets().await
    }

    async fn get_target(&self, id: &str) -> Result<Option<Target>, StoreError> {
        self.inner.get_target(id).await
    }

    async fn upsert_target(&self, target: &Target) -> Result<(), StoreError> {
        self.inner.upsert_target(target).await
    }

    async fn delete_target(&self, id: &str) -> Result<bool, StoreError> {
        self.inner.delete_target(id).await
    }

    async fn set_sort_order(&self, id: &str, sort_order: i32) -> Result<(), StoreError> {
        self.inner.set_sort_order(id, sort_order).await
    }

    async fn insert_observation(&self, observation: &Observation) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Corrupt("write refused".to_string()));
        }
        self.inner.insert_observation(observation).await
    }

    async fn recent_observations(
        &self,
        monitor_id: &str,
        limit: u64,
    ) -> Result<Vec<Observation>, StoreError> {
        self.inner.recent_observations(monitor_id, limit).await
    }

    async fn observation_stats(&self, monitor_id: &str) -> Result<ObservationStats, StoreError> {
        self.inner.observation_stats(monitor_id).await
    }

    async fn open_incident(&self, monitor_id: &str) -> Result<Option<Incident>, StoreError> {
        self.inner.open_incident(monitor_id).await
    }

    async fn insert_incident(
        &self,
        monitor_id: &str,
        started_at: DateTime<Utc>,
        notified: bool,
    ) -> Result<Incident, StoreError> {
        self.inner.insert_incident(monitor_id, started_at, notified).await
    }

    async fn resolve_incident(
        &self,
        incident_id: i64,
        resolved_at: DateTime<Utc>,
        duration_seconds: i64,
    ) -> Result<(), StoreError> {
        self.inner
            .resolve_incident(incident_id, resolved_at, duration_seconds)
            .await
    }

    async fn list_incidents(&self, monitor_id: &str) -> Result<Vec<Incident>, StoreError> {
        self.inner.list_incidents(monitor_id).await
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get_setting(key).await
    }

    async fn put_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.put_setting(key, value).await
    }
}
