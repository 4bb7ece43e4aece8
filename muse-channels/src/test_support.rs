//! In-memory channel and providers for unit tests.

use crate::message::{ChannelMessage, ChatAction, OutgoingContent, OutgoingMessage, PhotoSize, ReplyContext, Sender};
use crate::traits::{Channel, ChannelError, ChannelResult};
use async_trait::async_trait;
use muse_gateway::{
    ChatProvider, ChatRequest, ChatResponse, GeneratedImage, ImageEditRequest,
    ImageGenerationRequest, ImageProvider, ProviderError, TokenUsage,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

pub fn message(chat_id: i64, text: &str) -> ChannelMessage {
    ChannelMessage {
        id: 1,
        chat_id,
        sender: Sender {
            id: chat_id,
            username: Some(format!("user{chat_id}")),
            full_name: "Test User".into(),
        },
        text: text.into(),
        reply_to: None,
        timestamp: 0,
        trace_id: "test-trace".into(),
    }
}

/// A message replying to a photo with two resolutions.
pub fn edit_message(chat_id: i64, text: &str) -> ChannelMessage {
    let mut msg = message(chat_id, text);
    msg.reply_to = Some(ReplyContext {
        message_id: 0,
        photos: vec![
            PhotoSize {
                file_id: "small-photo".into(),
                width: 90,
                height: 60,
                file_size: Some(1_000),
            },
            PhotoSize {
                file_id: "large-photo".into(),
                width: 1280,
                height: 853,
                file_size: Some(90_000),
            },
        ],
    });
    msg
}

#[derive(Default)]
pub struct MockChannel {
    sent: Mutex<Vec<OutgoingMessage>>,
    actions: Mutex<Vec<(i64, ChatAction)>>,
    downloads: Mutex<Vec<(String, PathBuf)>>,
    download_bytes: Option<Vec<u8>>,
    fail_photos: AtomicBool,
}

impl MockChannel {
    pub fn with_download(bytes: Vec<u8>) -> Self {
        Self {
            download_bytes: Some(bytes),
            ..Self::default()
        }
    }

    pub fn fail_photos(&self) {
        self.fail_photos.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn actions(&self) -> Vec<(i64, ChatAction)> {
        self.actions.lock().unwrap().clone()
    }

    pub fn downloads(&self) -> Vec<(String, PathBuf)> {
        self.downloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Channel for MockChannel {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn init(&mut self) -> ChannelResult<()> {
        Ok(())
    }

    async fn send(&self, message: OutgoingMessage) -> ChannelResult<()> {
        if matches!(message.content, OutgoingContent::Photo { .. })
            && self.fail_photos.load(Ordering::SeqCst)
        {
            return Err(ChannelError::SendFailed("photo rejected".into()));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn send_action(&self, chat_id: i64, action: ChatAction) -> ChannelResult<()> {
        self.actions.lock().unwrap().push((chat_id, action));
        Ok(())
    }

    async fn download_file(&self, file_id: &str, dest: &Path) -> ChannelResult<u64> {
        self.downloads
            .lock()
            .unwrap()
            .push((file_id.to_string(), dest.to_path_buf()));
        let bytes = self
            .download_bytes
            .as_ref()
            .ok_or_else(|| ChannelError::DownloadFailed("no file".into()))?;
        std::fs::write(dest, bytes).map_err(|e| ChannelError::DownloadFailed(e.to_string()))?;
        Ok(bytes.len() as u64)
    }

    async fn shutdown(&self) -> ChannelResult<()> {
        Ok(())
    }
}

pub struct MockChatProvider {
    reply: Mutex<Result<String, Option<u16>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockChatProvider {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Mutex::new(Ok(reply.to_string())),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_with(&self, status: Option<u16>) {
        *self.reply.lock().unwrap() = Err(status);
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let model = request.model.clone();
        self.requests.lock().unwrap().push(request);
        let reply = self.reply.lock().unwrap().clone();
        match reply {
            Ok(content) => Ok(ChatResponse {
                model,
                content,
                usage: TokenUsage::default(),
                finish_reason: Some("stop".into()),
                latency_ms: 1,
            }),
            Err(status) => Err(ProviderError {
                provider: "mock".into(),
                model,
                message: "mock failure".into(),
                status_code: status,
            }),
        }
    }
}

pub struct MockImageProvider {
    /// Failed calls before the first success
    failures_before_success: u32,
    fail_status: Option<u16>,
    calls: AtomicU32,
    generate_prompts: Mutex<Vec<String>>,
    edit_prompts: Mutex<Vec<String>>,
    last_edit_image: Mutex<Option<Vec<u8>>>,
}

impl MockImageProvider {
    pub fn succeeding_after(failures: u32) -> Self {
        Self {
            failures_before_success: failures,
            fail_status: None,
            calls: AtomicU32::new(0),
            generate_prompts: Mutex::new(Vec::new()),
            edit_prompts: Mutex::new(Vec::new()),
            last_edit_image: Mutex::new(None),
        }
    }

    pub fn failing_with(status: Option<u16>) -> Self {
        Self {
            fail_status: status,
            ..Self::succeeding_after(u32::MAX)
        }
    }

    pub fn generate_prompts(&self) -> Vec<String> {
        self.generate_prompts.lock().unwrap().clone()
    }

    pub fn edit_prompts(&self) -> Vec<String> {
        self.edit_prompts.lock().unwrap().clone()
    }

    pub fn last_edit_image(&self) -> Option<Vec<u8>> {
        self.last_edit_image.lock().unwrap().clone()
    }

    fn outcome(&self, model: &str) -> Result<GeneratedImage, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures_before_success {
            return Err(ProviderError {
                provider: "mock".into(),
                model: model.into(),
                message: "mock failure".into(),
                status_code: self.fail_status,
            });
        }
        Ok(GeneratedImage {
            url: "https://images.example/1.png".into(),
            revised_prompt: None,
        })
    }
}

#[async_trait]
impl ImageProvider for MockImageProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: ImageGenerationRequest) -> Result<GeneratedImage, ProviderError> {
        self.generate_prompts.lock().unwrap().push(request.prompt);
        self.outcome(&request.model)
    }

    async fn edit(&self, request: ImageEditRequest) -> Result<GeneratedImage, ProviderError> {
        self.edit_prompts.lock().unwrap().push(request.prompt);
        *self.last_edit_image.lock().unwrap() = Some(request.image_png);
        self.outcome(&request.model)
    }
}
