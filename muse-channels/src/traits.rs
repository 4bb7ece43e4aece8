//! Channel traits for implementing channel adapters.

use crate::message::{ChatAction, OutgoingMessage};
use async_trait::async_trait;
use std::path::Path;

/// Result type for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Channel error type.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Message send failed: {0}")]
    SendFailed(String),

    #[error("File download failed: {0}")]
    DownloadFailed(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Channel not ready")]
    NotReady,
}

/// Channel adapter trait.
///
/// Receiving is adapter-specific; this trait covers what the dispatcher and
/// responders need to answer a message.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Get the channel name.
    fn name(&self) -> &'static str;

    /// Initialize the channel (authenticate, register menus, etc.).
    async fn init(&mut self) -> ChannelResult<()>;

    /// Send a message to the channel.
    async fn send(&self, message: OutgoingMessage) -> ChannelResult<()>;

    /// Show a transient progress indicator in a conversation.
    async fn send_action(&self, chat_id: i64, action: ChatAction) -> ChannelResult<()>;

    /// Download a platform file into `dest`, returning the number of bytes written.
    async fn download_file(&self, file_id: &str, dest: &Path) -> ChannelResult<u64>;

    /// Shutdown the channel gracefully.
    async fn shutdown(&self) -> ChannelResult<()>;
}
