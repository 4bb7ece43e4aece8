//! Telegram channel adapter.
//!
//! Provides the `TelegramChannel` implementation for receiving and sending messages
//! through the Telegram Bot API.

use crate::message::{
    ChannelMessage, ChatAction, OutgoingContent, OutgoingMessage, ParseMode, PhotoSize,
    ReplyContext, Sender,
};
use crate::traits::{Channel, ChannelError, ChannelResult};
use async_trait::async_trait;
use muse_common::config::TelegramConfig;
use muse_common::util::{sanitize_for_log, truncate_with_ellipsis};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;

/// Maximum length of a text message.
const MAX_MESSAGE_LEN: usize = 4096;

/// Maximum length of a photo caption.
const MAX_CAPTION_LEN: usize = 1024;

/// Pause after a failed poll before trying again.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Telegram channel - long-polls the Bot API for updates.
pub struct TelegramChannel {
    bot_token: String,
    api_base: String,
    poll_timeout_secs: u64,
    client: reqwest::Client,
    /// Bot handle, known after `init`
    bot_username: Option<String>,
}

impl TelegramChannel {
    /// Create a new Telegram channel.
    ///
    /// Fails when `api_base` is not a URL or the HTTP client cannot be built.
    pub fn new(bot_token: String, config: &TelegramConfig) -> ChannelResult<Self> {
        let api_base = config.api_base.trim_end_matches('/').to_string();
        reqwest::Url::parse(&api_base)
            .map_err(|e| ChannelError::Connection(format!("invalid telegram.api_base: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ChannelError::Connection(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            bot_token,
            api_base,
            poll_timeout_secs: config.poll_timeout_secs,
            client,
            bot_username: None,
        })
    }

    /// Bot handle reported by `getMe`; `None` until `init` succeeds.
    pub fn bot_username(&self) -> Option<&str> {
        self.bot_username.as_deref()
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.bot_token)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_base, self.bot_token, file_path)
    }

    /// Call a Bot API method and return its `result` field.
    async fn call(&self, method: &str, body: &Value) -> anyhow::Result<Value> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("{method} request failed: {}", sanitize_for_log(&e.to_string())))?;

        let status = resp.status();
        if !status.is_success() {
            let err = resp.text().await.unwrap_or_default();
            anyhow::bail!("Telegram {method} failed ({status}): {err}");
        }

        let data: Value = resp.json().await?;
        Ok(data.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Register the visible command menu.
    ///
    /// Only `/start` is listed; `/edit` and `/admin` still work but stay hidden.
    pub async fn register_commands(&self) -> anyhow::Result<()> {
        self.call(
            "setMyCommands",
            &serde_json::json!({
                "commands": [{ "command": "start", "description": "🚀 Старт" }]
            }),
        )
        .await?;

        self.call(
            "setChatMenuButton",
            &serde_json::json!({ "menu_button": { "type": "commands" } }),
        )
        .await?;

        tracing::info!("Telegram command menu registered");
        Ok(())
    }

    /// Send a single message chunk, falling back to plain text on markup errors.
    async fn send_single_chunk(
        &self,
        text: &str,
        chat_id: i64,
        parse_mode: Option<ParseMode>,
    ) -> anyhow::Result<()> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(mode) = parse_mode {
            body["parse_mode"] = Value::from(mode.as_str());
        }

        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await?;

        if resp.status().is_success() {
            return Ok(());
        }

        let status = resp.status();
        let error_text = resp.text().await.unwrap_or_default();

        // Telegram returns "Bad Request: can't parse entities" for markup errors
        if parse_mode.is_some() && status.as_u16() == 400 && error_text.contains("parse entities") {
            tracing::warn!(
                error = %error_text,
                "Telegram markup parsing failed, retrying without parse_mode"
            );

            let body_plain = serde_json::json!({
                "chat_id": chat_id,
                "text": text
            });

            let resp_plain = self
                .client
                .post(self.api_url("sendMessage"))
                .json(&body_plain)
                .send()
                .await?;

            if resp_plain.status().is_success() {
                return Ok(());
            }

            let plain_error = resp_plain.text().await.unwrap_or_default();
            anyhow::bail!("Telegram sendMessage failed: {plain_error}");
        }

        anyhow::bail!("Telegram sendMessage failed: {error_text}")
    }

    async fn send_photo_by_url(
        &self,
        chat_id: i64,
        url: &str,
        caption: Option<&str>,
        parse_mode: Option<ParseMode>,
    ) -> anyhow::Result<()> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "photo": url,
        });
        if let Some(caption) = caption {
            body["caption"] = Value::from(truncate_with_ellipsis(caption, MAX_CAPTION_LEN - 3));
            if let Some(mode) = parse_mode {
                body["parse_mode"] = Value::from(mode.as_str());
            }
        }

        self.call("sendPhoto", &body).await.map(|_| ())
    }

    /// Long-poll `getUpdates` and forward every text message into `tx`.
    ///
    /// Returns when the receiving side of `tx` is dropped. The channel must
    /// have been initialized first.
    pub async fn listen(&self, tx: mpsc::Sender<ChannelMessage>) -> ChannelResult<()> {
        if self.bot_username.is_none() {
            return Err(ChannelError::NotReady);
        }
        let mut offset: i64 = 0;

        tracing::info!("Telegram channel listening for messages...");

        loop {
            let body = serde_json::json!({
                "offset": offset,
                "timeout": self.poll_timeout_secs,
                "allowed_updates": ["message"]
            });

            let resp = match self.client.post(self.api_url("getUpdates")).json(&body).send().await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!("Telegram poll error: {}", sanitize_for_log(&e.to_string()));
                    tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                    continue;
                }
            };

            let data: Value = match resp.json().await {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!("Telegram parse error: {e}");
                    tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                    continue;
                }
            };

            if data.get("ok").and_then(Value::as_bool) == Some(false) {
                let description = data
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error");
                tracing::warn!(description, "Telegram getUpdates rejected");
                tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                continue;
            }

            let Some(results) = data.get("result").and_then(Value::as_array) else {
                continue;
            };

            for update in results {
                if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                    offset = uid + 1;
                }

                let Some(msg) = parse_update(update) else {
                    continue;
                };

                tracing::info!(
                    channel = "telegram",
                    trace_id = %msg.trace_id,
                    user_id = %msg.sender.id,
                    chat_id = %msg.chat_id,
                    is_command = msg.is_command(),
                    has_reply = msg.reply_to.is_some(),
                    "IM message received"
                );

                if tx.send(msg).await.is_err() {
                    tracing::info!("Message queue closed, stopping Telegram listener");
                    return Ok(());
                }
            }
        }
    }
}

/// Convert a raw Bot API update into a [`ChannelMessage`].
///
/// Only messages carrying text are kept; photos, stickers, edits and service
/// messages yield `None`.
fn parse_update(update: &Value) -> Option<ChannelMessage> {
    let message = update.get("message")?;
    let text = message.get("text").and_then(Value::as_str)?;
    let chat_id = message.get("chat").and_then(|c| c.get("id")).and_then(Value::as_i64)?;
    let from = message.get("from")?;
    let user_id = from.get("id").and_then(Value::as_i64)?;

    let username = from
        .get("username")
        .and_then(Value::as_str)
        .map(String::from);
    let full_name = [
        from.get("first_name").and_then(Value::as_str),
        from.get("last_name").and_then(Value::as_str),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ");

    let reply_to = message.get("reply_to_message").map(|reply| ReplyContext {
        message_id: reply.get("message_id").and_then(Value::as_i64).unwrap_or_default(),
        photos: reply
            .get("photo")
            .cloned()
            .and_then(|p| serde_json::from_value::<Vec<PhotoSize>>(p).ok())
            .unwrap_or_default(),
    });

    Some(ChannelMessage {
        id: message.get("message_id").and_then(Value::as_i64).unwrap_or_default(),
        chat_id,
        sender: Sender {
            id: user_id,
            username,
            full_name,
        },
        text: text.to_string(),
        reply_to,
        timestamp: message
            .get("date")
            .and_then(Value::as_i64)
            .map_or(0, |secs| secs * 1000),
        trace_id: muse_common::logging::generate_trace_id(),
    })
}

/// Split a message into chunks that fit within Telegram's limit.
///
/// Lengths are counted in characters, as Telegram counts them.
fn split_message(message: &str, max_len: usize) -> Vec<String> {
    if message.chars().count() <= max_len {
        return vec![message.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = message;

    while !remaining.is_empty() {
        let Some((byte_limit, _)) = remaining.char_indices().nth(max_len) else {
            chunks.push(remaining.to_string());
            break;
        };

        let chunk = &remaining[..byte_limit];
        let split_pos = chunk
            .rfind("\n\n")
            .or_else(|| chunk.rfind('\n'))
            .or_else(|| chunk.rfind(". ").map(|p| p + 1))
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(byte_limit);

        let actual_split = if split_pos == 0 { byte_limit } else { split_pos };

        chunks.push(remaining[..actual_split].to_string());
        remaining = remaining[actual_split..].trim_start();
    }

    chunks
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn init(&mut self) -> ChannelResult<()> {
        // Verify bot token by calling getMe
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::Connection(sanitize_for_log(&e.to_string())))?;

        if !resp.status().is_success() {
            let err = resp.text().await.unwrap_or_default();
            return Err(ChannelError::Auth(format!("Invalid bot token: {err}")));
        }

        let data: Value = resp
            .json()
            .await
            .map_err(|e| ChannelError::Connection(e.to_string()))?;
        let username = data
            .get("result")
            .and_then(|r| r.get("username"))
            .and_then(Value::as_str)
            .ok_or_else(|| ChannelError::Auth("getMe returned no bot username".into()))?;
        self.bot_username = Some(username.to_string());

        tracing::info!(bot = %username, "Telegram channel initialized");
        Ok(())
    }

    async fn send(&self, message: OutgoingMessage) -> ChannelResult<()> {
        let chat_id = message.chat_id;
        let (text, parse_mode) = match message.content {
            OutgoingContent::Text { text } => (text, None),
            OutgoingContent::Markdown { text } => (text, Some(ParseMode::Markdown)),
            OutgoingContent::Html { text } => (text, Some(ParseMode::Html)),
            OutgoingContent::Photo {
                url,
                caption,
                parse_mode,
            } => {
                return self
                    .send_photo_by_url(chat_id, &url, caption.as_deref(), parse_mode)
                    .await
                    .map_err(|e| ChannelError::SendFailed(e.to_string()));
            }
        };

        if text.trim().is_empty() {
            return Err(ChannelError::InvalidMessage("empty text".into()));
        }

        for chunk in split_message(&text, MAX_MESSAGE_LEN) {
            self.send_single_chunk(&chunk, chat_id, parse_mode)
                .await
                .map_err(|e| ChannelError::SendFailed(e.to_string()))?;
        }
        Ok(())
    }

    async fn send_action(&self, chat_id: i64, action: ChatAction) -> ChannelResult<()> {
        self.call(
            "sendChatAction",
            &serde_json::json!({ "chat_id": chat_id, "action": action.as_str() }),
        )
        .await
        .map(|_| ())
        .map_err(|e| ChannelError::SendFailed(e.to_string()))
    }

    async fn download_file(&self, file_id: &str, dest: &Path) -> ChannelResult<u64> {
        // Step 1: Get the file path via getFile API
        let result = self
            .call("getFile", &serde_json::json!({ "file_id": file_id }))
            .await
            .map_err(|e| ChannelError::DownloadFailed(e.to_string()))?;

        let file_path = result
            .get("file_path")
            .and_then(Value::as_str)
            .ok_or_else(|| ChannelError::DownloadFailed("Missing file_path in getFile response".into()))?;

        // Step 2: Download the file
        let resp = self
            .client
            .get(self.file_url(file_path))
            .send()
            .await
            .map_err(|e| ChannelError::DownloadFailed(sanitize_for_log(&e.to_string())))?;

        if !resp.status().is_success() {
            return Err(ChannelError::DownloadFailed(format!(
                "file download returned {}",
                resp.status()
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ChannelError::DownloadFailed(e.to_string()))?;

        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|e| ChannelError::DownloadFailed(format!("write {}: {e}", dest.display())))?;

        tracing::debug!(file_id, bytes = bytes.len(), "Telegram file downloaded");
        Ok(bytes.len() as u64)
    }

    async fn shutdown(&self) -> ChannelResult<()> {
        tracing::info!("Telegram channel shutting down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> TelegramChannel {
        TelegramChannel::new("123:ABC".into(), &TelegramConfig::default()).unwrap()
    }

    #[test]
    fn telegram_channel_name() {
        assert_eq!(channel().name(), "telegram");
    }

    #[test]
    fn telegram_api_url() {
        let ch = channel();
        assert_eq!(ch.api_url("getMe"), "https://api.telegram.org/bot123:ABC/getMe");
        assert_eq!(
            ch.file_url("photos/file_1.jpg"),
            "https://api.telegram.org/file/bot123:ABC/photos/file_1.jpg"
        );
    }

    #[test]
    fn telegram_new_rejects_bad_api_base() {
        let config = TelegramConfig {
            api_base: "not a url".into(),
            ..TelegramConfig::default()
        };
        let err = TelegramChannel::new("123:ABC".into(), &config).err().unwrap();
        assert!(matches!(err, ChannelError::Connection(_)));
    }

    #[tokio::test]
    async fn telegram_listen_requires_init() {
        let ch = channel();
        assert!(ch.bot_username().is_none());
        let (tx, _rx) = mpsc::channel(1);
        assert!(matches!(ch.listen(tx).await, Err(ChannelError::NotReady)));
    }

    #[test]
    fn parse_text_update() {
        let update = serde_json::json!({
            "update_id": 1,
            "message": {
                "message_id": 42,
                "date": 1_700_000_000,
                "chat": {"id": -100, "type": "private"},
                "from": {"id": 7, "is_bot": false, "first_name": "Ivan", "last_name": "Petrenko"},
                "text": "Привіт, як справи?"
            }
        });

        let msg = parse_update(&update).unwrap();
        assert_eq!(msg.id, 42);
        assert_eq!(msg.chat_id, -100);
        assert_eq!(msg.sender.id, 7);
        assert_eq!(msg.sender.display_name(), "Ivan Petrenko");
        assert_eq!(msg.text, "Привіт, як справи?");
        assert_eq!(msg.timestamp, 1_700_000_000_000);
        assert!(msg.reply_to.is_none());
        assert!(!msg.trace_id.is_empty());
    }

    #[test]
    fn parse_reply_to_photo() {
        let update = serde_json::json!({
            "update_id": 2,
            "message": {
                "message_id": 43,
                "chat": {"id": 5},
                "from": {"id": 5, "first_name": "A", "username": "alice"},
                "text": "/edit make it night",
                "reply_to_message": {
                    "message_id": 40,
                    "photo": [
                        {"file_id": "s", "file_unique_id": "u1", "width": 90, "height": 90},
                        {"file_id": "l", "file_unique_id": "u2", "width": 1280, "height": 1280, "file_size": 1000}
                    ]
                }
            }
        });

        let msg = parse_update(&update).unwrap();
        assert_eq!(msg.sender.display_name(), "alice");
        assert_eq!(msg.reply_photo().map(|p| p.file_id.as_str()), Some("l"));
    }

    #[test]
    fn parse_skips_non_text() {
        let photo_only = serde_json::json!({
            "update_id": 3,
            "message": {"message_id": 1, "chat": {"id": 1}, "from": {"id": 1}, "photo": []}
        });
        assert!(parse_update(&photo_only).is_none());

        let edited = serde_json::json!({"update_id": 4, "edited_message": {"text": "x"}});
        assert!(parse_update(&edited).is_none());
    }

    #[test]
    fn split_message_short() {
        let result = split_message("Hello, World!", MAX_MESSAGE_LEN);
        assert_eq!(result, vec!["Hello, World!".to_string()]);
    }

    #[test]
    fn split_message_long() {
        let msg = "x".repeat(5000);
        let result = split_message(&msg, MAX_MESSAGE_LEN);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].chars().count(), MAX_MESSAGE_LEN);
    }

    #[test]
    fn split_message_counts_characters_not_bytes() {
        // 3000 Cyrillic characters are 6000 bytes but fit one message
        let msg = "ж".repeat(3000);
        assert_eq!(split_message(&msg, MAX_MESSAGE_LEN).len(), 1);

        let msg = format!("{}\n\n{}", "а".repeat(3000), "б".repeat(3000));
        let chunks = split_message(&msg, MAX_MESSAGE_LEN);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].starts_with('б'));
    }
}
