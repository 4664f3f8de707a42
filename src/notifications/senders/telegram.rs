use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;

use super::{ChatTransport, SenderError};

/// Telegram Bot API client bound to one token.
pub struct TelegramBot {
    client: Client,
    api_base: String,
    token: String,
}

#[derive(Serialize)]
struct TelegramMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotUser {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    /// Unix seconds, as reported by Telegram.
    pub date: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub channel_post: Option<Message>,
}

/// Escapes text for Telegram MarkdownV2.
/// Characters to escape: _ * [ ] ( ) ~ ` > # + - = | { } . !
pub fn escape_markdown_v2(text: &str) -> String {
    let mut escaped_text = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(
            ch,
            '_' | '*' | '[' | ']' | '(' | ')' | '~' | '`' | '>' | '#' | '+' | '-' | '=' | '|' | '{' | '}' | '.' | '!'
        ) {
            escaped_text.push('\\');
        }
        escaped_text.push(ch);
    }
    escaped_text
}

/// Shows the first ten characters of a token.
pub fn mask_token(token: &str) -> String {
    let prefix: String = token.chars().take(10).collect();
    format!("{prefix}...")
}

impl TelegramBot {
    pub fn new(api_base: &str, token: &str) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.token)
    }

    async fn unwrap_response<T: DeserializeOwned>(
        method: &str,
        response: reqwest::Response,
    ) -> Result<T, SenderError> {
        let status = response.status();
        let body: ApiResponse<T> = response.json().await?;
        if !body.ok {
            return Err(SenderError::SendFailed(format!(
                "Telegram {method} failed ({status}): {}",
                body.description.unwrap_or_default()
            )));
        }
        body.result.ok_or_else(|| {
            SenderError::SendFailed(format!("Telegram {method} returned no result"))
        })
    }

    /// The one-time token validation call.
    pub async fn get_me(&self) -> Result<BotUser, SenderError> {
        let response = self
            .client
            .get(self.method_url("getMe"))
            .timeout(Duration::from_secs(10))
            .send()
            .await?;
        Self::unwrap_response("getMe", response).await
    }

    /// Long-polls for updates after `offset`.
    pub async fn get_updates(&self, offset: i64, poll_seconds: u64) -> Result<Vec<Update>, SenderError> {
        let response = self
            .client
            .get(self.method_url("getUpdates"))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", poll_seconds.to_string()),
                ("allowed_updates", r#"["message","channel_post"]"#.to_string()),
            ])
            .timeout(Duration::from_secs(poll_seconds + 10))
            .send()
            .await?;
        Self::unwrap_response("getUpdates", response).await
    }
}

#[async_trait]
impl ChatTransport for TelegramBot {
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), SenderError> {
        let escaped_message = escape_markdown_v2(text);
        let payload = TelegramMessage {
            chat_id,
            text: &escaped_message,
            parse_mode: "MarkdownV2",
        };

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .timeout(Duration::from_secs(10))
            .json(&payload)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(SenderError::SendFailed(format!(
                "Telegram API returned non-success status: {status}. Body: {error_body}"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::test_support::spawn_server;
    use axum::{extract::State, http::StatusCode, routing::{get, post}, Json, Router};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[test]
    fn test_escape_markdown_v2() {
        assert_eq!(escape_markdown_v2("api-1 is DOWN!"), "api\\-1 is DOWN\\!");
        assert_eq!(escape_markdown_v2("plain"), "plain");
    }

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("123456789:ABCDEF"), "123456789:...");
        assert_eq!(mask_token("short"), "short...");
    }

    #[tokio::test]
    async fn test_bot_api_calls() {
        let sent: Arc<Mutex<Vec<Value>>> = Arc::default();
        let router = Router::new()
            .route(
                "/botGOOD/getMe",
                get(|| async { Json(json!({ "ok": true, "result": { "id": 7, "username": "watcher_bot", "first_name": "Watcher" } })) }),
            )
            .route(
                "/botBAD/getMe",
                get(|| async {
                    (StatusCode::UNAUTHORIZED, Json(json!({ "ok": false, "description": "Unauthorized" })))
                }),
            )
            .route(
                "/botGOOD/sendMessage",
                post(|State(sent): State<Arc<Mutex<Vec<Value>>>>, Json(body): Json<Value>| async move {
                    sent.lock().await.push(body);
                    Json(json!({ "ok": true, "result": {} }))
                }),
            )
            .route(
                "/botGOOD/getUpdates",
                get(|| async {
                    Json(json!({ "ok": true, "result": [
                        { "update_id": 10, "message": { "message_id": 3, "date": 1700000000, "chat": { "id": -100 }, "text": "hk offline" } }
                    ] }))
                }),
            )
            .with_state(sent.clone());
        let addr = spawn_server(router).await;
        let base = format!("http://{addr}");

        let bot = TelegramBot::new(&base, "GOOD");
        assert_eq!(bot.get_me().await.unwrap().username.as_deref(), Some("watcher_bot"));
        assert!(TelegramBot::new(&base, "BAD").get_me().await.is_err());

        bot.send_message("-100", "hk.1 down").await.unwrap();
        let sent = sent.lock().await;
        assert_eq!(sent[0]["chat_id"], "-100");
        assert_eq!(sent[0]["text"], "hk\\.1 down");
        assert_eq!(sent[0]["parse_mode"], "MarkdownV2");

        let updates = bot.get_updates(0, 0).await.unwrap();
        assert_eq!(updates.len(), 1);
        let message = updates[0].message.as_ref().unwrap();
        assert_eq!(message.chat.id, -100);
        assert_eq!(message.text.as_deref(), Some("hk offline"));
    }
}
