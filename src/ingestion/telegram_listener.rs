//! Inbound side of the Telegram bot: a `getUpdates` long-poll loop feeding an mpsc channel.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::InboundMessage;
use crate::engine::MonitorEngine;
use crate::notifications::senders::telegram::{TelegramBot, Update};
use crate::notifications::senders::{ChatConnector, ChatSession, SenderError};

const LONG_POLL_SECONDS: u64 = 30;
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Converts an update into an inbound message. Updates without text are dropped.
pub fn update_to_message(update: Update) -> Option<InboundMessage> {
    let message = update.message.or(update.channel_post)?;
    let text = message.text.or(message.caption)?;
    if text.trim().is_empty() {
        return None;
    }
    Some(InboundMessage {
        chat_id: message.chat.id.to_string(),
        message_id: message.message_id,
        text,
        date: message.date,
    })
}

/// Polls until `shutdown` flips to true or its sender is dropped.
pub async fn run_update_loop(
    bot: Arc<TelegramBot>,
    inbound: mpsc::Sender<InboundMessage>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Telegram update loop started.");
    let mut offset: i64 = 0;
    loop {
        let polled = tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
            polled = bot.get_updates(offset, LONG_POLL_SECONDS) => polled,
        };

        match polled {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    let Some(message) = update_to_message(update) else {
                        continue;
                    };
                    debug!(chat_id = %message.chat_id, message_id = message.message_id, "Received chat message.");
                    if inbound.send(message).await.is_err() {
                        warn!("Inbound channel closed; stopping Telegram update loop.");
                        return;
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Telegram getUpdates failed; retrying.");
                tokio::select! {
                    biased;
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(RETRY_DELAY) => {}
                }
            }
        }
    }
    info!("Telegram update loop stopped.");
}

/// Validates tokens with `getMe` and starts an update loop per session.
pub struct TelegramConnector {
    api_base: String,
    inbound: mpsc::Sender<InboundMessage>,
}

impl TelegramConnector {
    pub fn new(api_base: &str, inbound: mpsc::Sender<InboundMessage>) -> Self {
        Self {
            api_base: api_base.to_string(),
            inbound,
        }
    }
}

#[async_trait]
impl ChatConnector for TelegramConnector {
    async fn connect(&self, token: &str) -> Result<ChatSession, SenderError> {
        let bot = Arc::new(TelegramBot::new(&self.api_base, token));
        let me = bot.get_me().await?;
        let bot_username = me.username.unwrap_or(me.first_name);
        info!(bot = %bot_username, "Telegram bot token validated.");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(run_update_loop(bot.clone(), self.inbound.clone(), shutdown_rx));

        Ok(ChatSession {
            transport: bot,
            bot_username,
            listener: Some(shutdown_tx),
        })
    }
}

/// Feeds every inbound chat message to the engine until the channel closes.
pub async fn run_chat_consumer(engine: Arc<MonitorEngine>, mut inbound: mpsc::Receiver<InboundMessage>) {
    while let Some(message) = inbound.recv().await {
        match engine.ingest_chat_message(&message).await {
            Ok(outcome) => debug!(chat_id = %message.chat_id, ?outcome, "Chat message processed."),
            Err(e) => warn!(chat_id = %message.chat_id, error = %e, "Failed to process chat message."),
        }
    }
    info!("Chat consumer stopped.");
}
