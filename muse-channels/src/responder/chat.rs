//! Chat completions with per-conversation history.

use super::{show_progress, CHAT_ERROR_MESSAGE};
use crate::context::ConversationStore;
use crate::intent::IntentRules;
use crate::message::{ChannelMessage, ChatAction, OutgoingContent};
use crate::request_log::{RequestKind, RequestLog, RequestLogEntry};
use crate::traits::Channel;
use muse_common::util::{normalize_hyphens, sanitize_for_log};
use muse_common::Config;
use muse_gateway::{ChatProvider, ChatRequest, Message};
use std::sync::Arc;

pub struct ChatResponder {
    provider: Arc<dyn ChatProvider>,
    channel: Arc<dyn Channel>,
    conversations: Arc<ConversationStore>,
    request_log: Arc<RequestLog>,
    rules: Arc<IntentRules>,
    config: Arc<Config>,
}

impl ChatResponder {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        channel: Arc<dyn Channel>,
        conversations: Arc<ConversationStore>,
        request_log: Arc<RequestLog>,
        rules: Arc<IntentRules>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            provider,
            channel,
            conversations,
            request_log,
            rules,
            config,
        }
    }

    /// Answer `msg`, either with the fixed self-description or a model reply.
    ///
    /// History changes only when the model call succeeds.
    pub async fn respond(&self, msg: &ChannelMessage) -> OutgoingContent {
        let prompt = msg.trimmed_text();

        if self.rules.is_self_description(prompt) {
            tracing::debug!("Answering self-description query");
            return OutgoingContent::markdown(self.config.biography());
        }

        self.request_log
            .append(RequestLogEntry::new(
                msg.sender.id,
                msg.sender.display_name(),
                RequestKind::Chat,
                prompt,
            ))
            .await;

        show_progress(self.channel.as_ref(), msg.chat_id, ChatAction::Typing).await;

        let conversation = self.conversations.get_or_create(msg.chat_id);
        let mut conversation = conversation.lock().await;

        // The window counts the new user turn.
        let prior = conversation.recent(self.config.chat.history_window.saturating_sub(1));
        let today = chrono::Local::now().format("%Y-%m-%d").to_string();

        let mut messages = Vec::with_capacity(prior.len() + 2);
        messages.push(Message::system(self.config.system_prompt(&today)));
        messages.extend(prior);
        messages.push(Message::user(prompt));

        let request = ChatRequest {
            model: self.config.chat.model.clone(),
            messages,
            max_tokens: Some(self.config.chat.max_tokens),
            temperature: Some(self.config.chat.temperature),
        };

        match self.provider.chat(request).await {
            Ok(response) => {
                let reply = normalize_hyphens(&response.content).trim().to_string();
                if reply.is_empty() {
                    tracing::error!(model = %response.model, "Model returned an empty reply");
                    return OutgoingContent::text(CHAT_ERROR_MESSAGE);
                }

                conversation.push_exchange(prompt, reply.clone());
                tracing::info!(
                    model = %response.model,
                    latency_ms = response.latency_ms,
                    total_tokens = response.usage.total_tokens,
                    history_len = conversation.len(),
                    "Chat reply generated"
                );
                OutgoingContent::text(reply)
            }
            Err(e) => {
                tracing::error!(error = %sanitize_for_log(&e.to_string()), "Chat completion failed");
                OutgoingContent::text(CHAT_ERROR_MESSAGE)
            }
        }
    }
}
