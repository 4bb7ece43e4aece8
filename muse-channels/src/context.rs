//! Per-conversation chat history.
//!
//! Each conversation sits behind its own `tokio::sync::Mutex`, so a responder
//! can hold the lock from reading history until it appends the new exchange.
//! Messages in different conversations never contend.

use dashmap::DashMap;
use muse_gateway::{Message, Role};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared handle to one conversation.
pub type ConversationHandle = Arc<Mutex<Conversation>>;

/// Bounded history of user and assistant turns.
#[derive(Debug, Clone)]
pub struct Conversation {
    turns: VecDeque<Message>,
    max_turns: usize,
}

impl Conversation {
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            max_turns: max_turns.max(2),
        }
    }

    /// The most recent `limit` turns, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<Message> {
        let skip = self.turns.len().saturating_sub(limit);
        self.turns.iter().skip(skip).cloned().collect()
    }

    /// Append a completed exchange, evicting the oldest turns beyond capacity.
    pub fn push_exchange(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.turns.push_back(Message {
            role: Role::User,
            content: user.into(),
        });
        self.turns.push_back(Message {
            role: Role::Assistant,
            content: assistant.into(),
        });
        while self.turns.len() > self.max_turns {
            self.turns.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// All conversations known to the process, keyed by chat id.
pub struct ConversationStore {
    conversations: DashMap<i64, ConversationHandle>,
    max_turns: usize,
}

impl ConversationStore {
    /// `max_turns` caps how many turns each conversation retains.
    pub fn new(max_turns: usize) -> Self {
        Self {
            conversations: DashMap::new(),
            max_turns,
        }
    }

    /// Get the conversation for `chat_id`, creating it on first touch.
    pub fn get_or_create(&self, chat_id: i64) -> ConversationHandle {
        self.conversations
            .entry(chat_id)
            .or_insert_with(|| Arc::new(Mutex::new(Conversation::new(self.max_turns))))
            .clone()
    }

    /// Number of retained turns for `chat_id` (0 if the conversation is unknown).
    pub async fn history_len(&self, chat_id: i64) -> usize {
        let handle = self.conversations.get(&chat_id).map(|entry| entry.clone());
        match handle {
            Some(conversation) => conversation.lock().await.len(),
            None => 0,
        }
    }

    /// Number of conversations seen so far.
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}
