//! Muse Channels - Telegram front end of the Muse bot.
//!
//! Messages arrive by long-polling the Telegram Bot API, are classified by
//! intent and answered by the chat or image responder.
//!
//! ## Architecture
//!
//! ```text
//! Telegram → getUpdates → TelegramChannel → Dispatcher → ChatResponder  → OpenAI chat
//!                                                      → ImageResponder → OpenAI images
//! User ←──── sendMessage / sendPhoto ←──────────┘
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod context;
pub mod dispatcher;
pub mod intent;
pub mod message;
pub mod request_log;
pub mod responder;
pub mod telegram;
pub mod traits;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use context::{Conversation, ConversationHandle, ConversationStore};
pub use dispatcher::{Dispatcher, Route};
pub use intent::{Intent, IntentRules};
pub use message::{
    ChannelMessage, ChatAction, OutgoingContent, OutgoingMessage, ParseMode, PhotoSize,
    ReplyContext, Sender,
};
pub use request_log::{RequestKind, RequestLog, RequestLogEntry};
pub use responder::{ChatResponder, ImageResponder};
pub use telegram::TelegramChannel;
pub use traits::{Channel, ChannelError, ChannelResult};

use muse_common::config::Config;
use muse_gateway::{OpenAIImageProvider, OpenAIProvider};
use std::sync::Arc;
use std::time::Duration;

/// Inbound queue depth between the poller and the dispatcher.
const INBOUND_QUEUE: usize = 100;

/// Run the bot until the poller stops or Ctrl-C is received.
pub async fn start(config: Config) -> anyhow::Result<()> {
    let bot_token = config
        .telegram_bot_token()
        .ok_or_else(|| anyhow::anyhow!("Telegram bot token is not configured"))?
        .to_string();
    let api_key = config
        .openai_api_key()
        .ok_or_else(|| anyhow::anyhow!("OpenAI API key is not configured"))?;

    let timeout = Duration::from_secs(config.openai.timeout_secs);
    let chat_provider = Arc::new(OpenAIProvider::with_base_url(
        api_key,
        &config.openai.base_url,
        timeout,
    )?);
    let image_provider = Arc::new(OpenAIImageProvider::with_base_url(
        api_key,
        &config.openai.base_url,
        timeout,
    )?);

    let mut telegram = TelegramChannel::new(bot_token, &config.telegram)?;
    telegram.init().await?;
    if let Err(e) = telegram.register_commands().await {
        tracing::warn!(error = %e, "Failed to register bot commands");
    }
    let telegram = Arc::new(telegram);

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(config),
        telegram.clone(),
        chat_provider,
        image_provider,
    )?);

    let (tx, rx) = tokio::sync::mpsc::channel(INBOUND_QUEUE);
    let processor_handle = Dispatcher::spawn_processor(dispatcher, rx);

    tracing::info!(
        bot = %telegram.bot_username().unwrap_or_default(),
        "Muse bot is polling for updates"
    );

    tokio::select! {
        result = telegram.listen(tx) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Telegram polling stopped");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    processor_handle.abort();
    telegram.shutdown().await?;

    Ok(())
}
