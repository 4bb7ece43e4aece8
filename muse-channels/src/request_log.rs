//! Bounded log of recent user requests, readable by the administrator.

use std::collections::VecDeque;
use tokio::sync::RwLock;

/// Shown when nothing has been logged yet.
pub const EMPTY_LOG_MESSAGE: &str = "📭 Історія порожня.";

const LOG_HEADER: &str = "📜 Останні запити:";

/// Category of a logged request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Chat,
    Image,
    Edit,
}

impl RequestKind {
    /// Label shown in the admin view; chat entries carry the log's chat label.
    pub fn label<'a>(&self, chat_label: &'a str) -> &'a str {
        match self {
            Self::Chat => chat_label,
            Self::Image => "Image",
            Self::Edit => "Edit Image",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLogEntry {
    pub user_id: i64,
    pub user_display_name: String,
    pub kind: RequestKind,
    pub content: String,
}

impl RequestLogEntry {
    pub fn new(
        user_id: i64,
        user_display_name: impl Into<String>,
        kind: RequestKind,
        content: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            user_display_name: user_display_name.into(),
            kind,
            content: content.into(),
        }
    }

    /// One HTML line with a clickable user mention.
    pub fn render_html(&self, chat_label: &str) -> String {
        format!(
            "<a href='tg://user?id={}'>@{}</a> -> {}: {}",
            self.user_id,
            html_escape::encode_text(&self.user_display_name),
            html_escape::encode_text(self.kind.label(chat_label)),
            html_escape::encode_text(&self.content),
        )
    }
}

/// Process-wide request log.
///
/// Appends past `capacity` evict the oldest entries; reads show the last
/// `window` entries in arrival order.
pub struct RequestLog {
    entries: RwLock<VecDeque<RequestLogEntry>>,
    capacity: usize,
    window: usize,
    chat_label: String,
}

impl RequestLog {
    pub fn new(capacity: usize, window: usize) -> Self {
        let window = window.max(1);
        Self {
            entries: RwLock::new(VecDeque::new()),
            capacity: capacity.max(window),
            window,
            chat_label: "Chat".into(),
        }
    }

    /// Label printed for chat entries, e.g. the model name.
    pub fn with_chat_label(mut self, label: impl Into<String>) -> Self {
        self.chat_label = label.into();
        self
    }

    pub async fn append(&self, entry: RequestLogEntry) {
        let mut entries = self.entries.write().await;
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// The display window, oldest first.
    pub async fn recent(&self) -> Vec<RequestLogEntry> {
        let entries = self.entries.read().await;
        let skip = entries.len().saturating_sub(self.window);
        entries.iter().skip(skip).cloned().collect()
    }

    /// HTML admin view, or `None` when the log is empty.
    pub async fn render(&self) -> Option<String> {
        let recent = self.recent().await;
        if recent.is_empty() {
            return None;
        }

        let mut out = String::from(LOG_HEADER);
        for entry in &recent {
            out.push('\n');
            out.push_str(&entry.render_html(&self.chat_label));
        }
        Some(out)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
