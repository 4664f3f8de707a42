//! Chat bot lifecycle: token validation, persistence, restart and status.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::{EngineError, MonitorEngine};
use crate::notifications::senders::telegram::mask_token;
use crate::notifications::senders::{ChatSession, ChatTransport};

pub const BOT_TOKEN_SETTING: &str = "tg_bot_token";

#[derive(Default)]
pub(super) struct BotState {
    session: Option<ChatSession>,
    token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BotStatus {
    /// A token is configured.
    pub enabled: bool,
    /// The token was validated and the listener is running.
    pub connected: bool,
    pub bot_username: Option<String>,
    pub token_masked: String,
}

impl MonitorEngine {
    /// Outbound half of the current bot session, if any.
    pub(crate) async fn chat_transport(&self) -> Option<Arc<dyn ChatTransport>> {
        self.bot
            .lock()
            .await
            .session
            .as_ref()
            .map(|session| session.transport.clone())
    }

    /// Validates `token`, persists it and replaces the running bot. An empty token stops the bot.
    pub async fn set_bot_token(&self, token: &str) -> Result<BotStatus, EngineError> {
        let token = token.trim();
        if token.is_empty() {
            self.store.put_setting(BOT_TOKEN_SETTING, "").await?;
            let mut bot = self.bot.lock().await;
            bot.session = None;
            bot.token = None;
            info!("Chat bot stopped.");
            return Ok(status_of(&bot));
        }

        let session = self.chat_connector.connect(token).await?;
        self.store.put_setting(BOT_TOKEN_SETTING, token).await?;
        let mut bot = self.bot.lock().await;
        // the previous session's listener stops when it is dropped here
        bot.session = Some(session);
        bot.token = Some(token.to_string());
        info!(token = %mask_token(token), "Chat bot connected.");
        Ok(status_of(&bot))
    }

    pub async fn bot_status(&self) -> BotStatus {
        status_of(&*self.bot.lock().await)
    }

    /// Sends a connection-test message to `chat_id`.
    pub async fn test_chat(&self, chat_id: &str) -> Result<(), EngineError> {
        let chat_id = chat_id.trim();
        if chat_id.is_empty() {
            return Err(EngineError::InvalidInput("chat_id is required".to_string()));
        }
        let Some(transport) = self.chat_transport().await else {
            return Err(EngineError::NotConfigured("no chat bot is connected".to_string()));
        };
        transport
            .send_message(chat_id, "✅ Connection test\nThe monitor bot can post to this chat.")
            .await?;
        Ok(())
    }

    /// Starts the bot at boot. A stored token wins over `configured`.
    ///
    /// Returns whether a bot is running afterwards. A token the transport rejects is
    /// logged and leaves the bot stopped.
    pub async fn restore_bot(&self, configured: Option<&str>) -> Result<bool, EngineError> {
        let stored = self
            .store
            .get_setting(BOT_TOKEN_SETTING)
            .await?
            .filter(|t| !t.trim().is_empty());
        let Some(token) = stored.or_else(|| {
            configured
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
        }) else {
            info!("No chat bot token configured.");
            return Ok(false);
        };

        match self.chat_connector.connect(token.trim()).await {
            Ok(session) => {
                let mut bot = self.bot.lock().await;
                bot.session = Some(session);
                bot.token = Some(token.trim().to_string());
                info!(token = %mask_token(&token), "Chat bot restored.");
                Ok(true)
            }
            Err(e) => {
                warn!(token = %mask_token(&token), error = %e, "Stored chat bot token was rejected.");
                let mut bot = self.bot.lock().await;
                bot.session = None;
                bot.token = Some(token.trim().to_string());
                Ok(false)
            }
        }
    }
}

fn status_of(bot: &BotState) -> BotStatus {
    BotStatus {
        enabled: bot.token.is_some(),
        connected: bot.session.is_some(),
        bot_username: bot.session.as_ref().map(|s| s.bot_username.clone()),
        token_masked: bot.token.as_deref().map(mask_token).unwrap_or_default(),
    }
}
