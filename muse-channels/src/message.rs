//! Message types for channel communication.

use serde::{Deserialize, Serialize};

/// Who sent an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    /// Platform numeric user id
    pub id: i64,
    /// Handle without the leading `@`, if the user has one
    pub username: Option<String>,
    /// First and last name joined by a space
    pub full_name: String,
}

impl Sender {
    /// Handle if present, otherwise the full name.
    pub fn display_name(&self) -> &str {
        self.username
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or(&self.full_name)
    }
}

/// One resolution of a photo attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub file_size: Option<u64>,
}

/// The message an inbound message replies to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplyContext {
    pub message_id: i64,
    /// All available resolutions of the attached photo, empty if none
    #[serde(default)]
    pub photos: Vec<PhotoSize>,
}

impl ReplyContext {
    /// The highest-resolution photo, if the replied-to message has one.
    pub fn largest_photo(&self) -> Option<&PhotoSize> {
        self.photos.iter().max_by_key(|p| {
            (
                u64::from(p.width) * u64::from(p.height),
                p.file_size.unwrap_or(0),
            )
        })
    }
}

/// Unified inbound text message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Platform message id
    pub id: i64,
    /// Conversation id (Telegram chat id)
    pub chat_id: i64,
    pub sender: Sender,
    pub text: String,
    #[serde(default)]
    pub reply_to: Option<ReplyContext>,
    /// Timestamp (Unix millis)
    pub timestamp: i64,
    /// Correlates every log line produced while handling this message
    pub trace_id: String,
}

impl ChannelMessage {
    /// Text with surrounding whitespace removed.
    pub fn trimmed_text(&self) -> &str {
        self.text.trim()
    }

    /// Whether the text is a platform command (starts with `/`).
    pub fn is_command(&self) -> bool {
        self.trimmed_text().starts_with('/')
    }

    /// Largest photo of the replied-to message.
    pub fn reply_photo(&self) -> Option<&PhotoSize> {
        self.reply_to.as_ref().and_then(ReplyContext::largest_photo)
    }
}

/// Text formatting requested from the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseMode {
    Markdown,
    Html,
}

impl ParseMode {
    /// Value of the Bot API `parse_mode` field.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "Markdown",
            Self::Html => "HTML",
        }
    }
}

/// Transient progress indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatAction {
    Typing,
    UploadPhoto,
}

impl ChatAction {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Typing => "typing",
            Self::UploadPhoto => "upload_photo",
        }
    }
}

/// Outgoing message to send to a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Target conversation
    pub chat_id: i64,
    pub content: OutgoingContent,
}

impl OutgoingMessage {
    pub fn new(chat_id: i64, content: OutgoingContent) -> Self {
        Self { chat_id, content }
    }
}

/// Outgoing message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutgoingContent {
    /// Plain text
    Text { text: String },
    /// Markdown text
    Markdown { text: String },
    /// HTML text
    Html { text: String },
    /// Photo hosted at a URL
    Photo {
        url: String,
        caption: Option<String>,
        parse_mode: Option<ParseMode>,
    },
}

impl OutgoingContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Self::Markdown { text: text.into() }
    }

    pub fn html(text: impl Into<String>) -> Self {
        Self::Html { text: text.into() }
    }

    pub fn photo(url: impl Into<String>, caption: impl Into<String>) -> Self {
        Self::Photo {
            url: url.into(),
            caption: Some(caption.into()),
            parse_mode: None,
        }
    }

    /// The text or caption carried by this content.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Text { text } | Self::Markdown { text } | Self::Html { text } => Some(text),
            Self::Photo { caption, .. } => caption.as_deref(),
        }
    }
}
