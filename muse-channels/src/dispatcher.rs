//! Routes inbound messages to responders and delivers their replies.
//!
//! ```text
//! TelegramChannel::listen → mpsc → Dispatcher::spawn_processor
//!                                      ↓ (one task per message)
//!                                  route → responder → Channel::send
//! ```

use crate::context::ConversationStore;
use crate::intent::{Intent, IntentRules};
use crate::message::{ChannelMessage, OutgoingContent, OutgoingMessage, ParseMode};
use crate::request_log::{RequestLog, EMPTY_LOG_MESSAGE};
use crate::responder::{ChatResponder, ImageResponder};
use crate::traits::Channel;
use muse_common::{channel_span, Config};
use muse_gateway::{ChatProvider, ImageProvider};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::Instrument;

pub(crate) const UNKNOWN_COMMAND_MESSAGE: &str =
    "❓ Невідома команда. Просто напишіть свій запит або '/edit' у відповіді на фото.";

/// Where a message goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Start,
    Admin,
    Edit,
    Generate,
    Chat,
    UnknownCommand,
}

pub struct Dispatcher {
    channel: Arc<dyn Channel>,
    config: Arc<Config>,
    rules: Arc<IntentRules>,
    request_log: Arc<RequestLog>,
    chat: ChatResponder,
    image: ImageResponder,
}

impl Dispatcher {
    pub fn new(
        config: Arc<Config>,
        channel: Arc<dyn Channel>,
        chat_provider: Arc<dyn ChatProvider>,
        image_provider: Arc<dyn ImageProvider>,
    ) -> muse_common::Result<Self> {
        let rules = Arc::new(IntentRules::new(&config.intents)?);
        let conversations = Arc::new(ConversationStore::new(config.chat.max_retained_turns));
        let request_log = Arc::new(
            RequestLog::new(
                config.admin.request_log_capacity,
                config.admin.request_log_window,
            )
            .with_chat_label(config.admin.chat_label.clone()),
        );

        let chat = ChatResponder::new(
            chat_provider,
            channel.clone(),
            conversations,
            request_log.clone(),
            rules.clone(),
            config.clone(),
        );
        let image = ImageResponder::new(
            image_provider,
            channel.clone(),
            request_log.clone(),
            config.image.clone(),
            &config.retry,
        );

        Ok(Self {
            channel,
            config,
            rules,
            request_log,
            chat,
            image,
        })
    }

    /// Decide how to handle `msg`. Commands accept an `@botname` suffix.
    pub fn route(&self, msg: &ChannelMessage) -> Route {
        let text = msg.trimmed_text();
        let intent = self.rules.classify(text);

        if msg.is_command() {
            let command = text
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .trim_start_matches('/');
            let name = command.split('@').next().unwrap_or_default().to_lowercase();

            return match name.as_str() {
                "start" => Route::Start,
                "admin" => Route::Admin,
                _ if intent == Intent::ImageEdit => Route::Edit,
                _ => Route::UnknownCommand,
            };
        }

        match intent {
            Intent::ImageEdit => Route::Edit,
            Intent::ImageGenerate => Route::Generate,
            Intent::SelfDescription | Intent::Chat => Route::Chat,
        }
    }

    /// Handle one message end to end.
    pub async fn process(&self, msg: ChannelMessage) {
        let route = self.route(&msg);
        tracing::info!(route = ?route, "Routing message");

        let reply = match route {
            Route::Start => {
                self.welcome(&msg).await;
                return;
            }
            Route::Admin => match self.admin_view(&msg).await {
                Some(content) => content,
                None => return,
            },
            Route::Edit => {
                let description = self.rules.edit_description(msg.trimmed_text());
                self.image.edit(&msg, description).await
            }
            Route::Generate => self.image.generate(&msg).await,
            Route::Chat => self.chat.respond(&msg).await,
            Route::UnknownCommand => OutgoingContent::text(UNKNOWN_COMMAND_MESSAGE),
        };

        self.reply(msg.chat_id, reply).await;
    }

    /// Deliver a reply. A rejected photo is resent as its caption plus the URL.
    async fn reply(&self, chat_id: i64, content: OutgoingContent) {
        let fallback = match &content {
            OutgoingContent::Photo { url, caption, .. } => Some(match caption {
                Some(caption) => format!("{caption}\n{url}"),
                None => url.clone(),
            }),
            _ => None,
        };

        let Err(e) = self.channel.send(OutgoingMessage::new(chat_id, content)).await else {
            return;
        };

        match fallback {
            Some(text) => {
                tracing::warn!(chat_id, error = %e, "Photo rejected, sending link as text");
                if let Err(e) = self
                    .channel
                    .send(OutgoingMessage::new(chat_id, OutgoingContent::text(text)))
                    .await
                {
                    tracing::error!(chat_id, error = %e, "Failed to send reply");
                }
            }
            None => tracing::error!(chat_id, error = %e, "Failed to send reply"),
        }
    }

    /// `/start`: notify the administrator, then greet with the welcome photo.
    async fn welcome(&self, msg: &ChannelMessage) {
        if let Some(admin_id) = self.config.admin.admin_id.filter(|_| self.config.admin.notify_on_start) {
            let note = format!(
                "🔔 Бот відкрився: @{} (id: {})",
                msg.sender.display_name(),
                msg.sender.id
            );
            if let Err(e) = self
                .channel
                .send(OutgoingMessage::new(admin_id, OutgoingContent::text(note)))
                .await
            {
                tracing::warn!(admin_id, error = %e, "Failed to notify administrator");
            }
        }

        let greeting = self.config.greeting();
        let photo = OutgoingContent::Photo {
            url: self.config.branding.welcome_image_url.clone(),
            caption: Some(greeting.clone()),
            parse_mode: Some(ParseMode::Markdown),
        };

        if let Err(e) = self.channel.send(OutgoingMessage::new(msg.chat_id, photo)).await {
            tracing::warn!(error = %e, "Welcome photo failed, sending text greeting");
            self.reply(msg.chat_id, OutgoingContent::markdown(greeting)).await;
        }
    }

    /// `/admin`: the request log, or `None` for anyone but the administrator.
    async fn admin_view(&self, msg: &ChannelMessage) -> Option<OutgoingContent> {
        if !self.config.is_admin(msg.sender.id) {
            tracing::debug!(user_id = msg.sender.id, "Ignoring /admin from non-administrator");
            return None;
        }

        Some(match self.request_log.render().await {
            Some(html) => OutgoingContent::html(html),
            None => OutgoingContent::text(EMPTY_LOG_MESSAGE),
        })
    }

    /// Spawn a background task that handles each queued message in its own task.
    pub fn spawn_processor(
        dispatcher: Arc<Self>,
        mut rx: mpsc::Receiver<ChannelMessage>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let dispatcher = Arc::clone(&dispatcher);
                let span = channel_span!(
                    dispatcher.channel.name(),
                    msg.trace_id,
                    msg.sender.id,
                    chat_id = %msg.chat_id
                );
                tokio::spawn(async move { dispatcher.process(msg).await }.instrument(span));
            }
            tracing::info!("Message processor stopped");
        })
    }
}
