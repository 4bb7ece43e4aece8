//! Image generation and photo edits with retry.

use super::{show_progress, EDIT_ERROR_MESSAGE, EDIT_USAGE_MESSAGE, GENERATE_ERROR_MESSAGE};
use crate::message::{ChannelMessage, ChatAction, OutgoingContent};
use crate::request_log::{RequestKind, RequestLog, RequestLogEntry};
use crate::traits::Channel;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use muse_common::config::{ImageConfig, RetryConfig};
use muse_common::util::sanitize_for_log;
use muse_common::RetryPolicy;
use muse_gateway::{ImageEditRequest, ImageGenerationRequest, ImageProvider, ProviderError};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

pub struct ImageResponder {
    provider: Arc<dyn ImageProvider>,
    channel: Arc<dyn Channel>,
    request_log: Arc<RequestLog>,
    config: ImageConfig,
    policy: RetryPolicy,
    retry_client_errors: bool,
}

impl ImageResponder {
    pub fn new(
        provider: Arc<dyn ImageProvider>,
        channel: Arc<dyn Channel>,
        request_log: Arc<RequestLog>,
        config: ImageConfig,
        retry: &RetryConfig,
    ) -> Self {
        Self {
            provider,
            channel,
            request_log,
            config,
            policy: RetryPolicy::from_config(retry),
            retry_client_errors: retry.retry_client_errors,
        }
    }

    fn is_terminal(&self, error: &ProviderError) -> bool {
        !self.retry_client_errors && !error.is_retryable()
    }

    /// Generate an image described by the message text.
    pub async fn generate(&self, msg: &ChannelMessage) -> OutgoingContent {
        let description = msg.trimmed_text();

        self.request_log
            .append(RequestLogEntry::new(
                msg.sender.id,
                msg.sender.display_name(),
                RequestKind::Image,
                description,
            ))
            .await;

        let request = ImageGenerationRequest {
            model: self.config.model.clone(),
            prompt: format!("{}: {description}", self.config.generate_prompt_prefix),
            size: self.config.size.clone(),
        };

        let result = self
            .policy
            .run(
                |_| {
                    let request = request.clone();
                    async move {
                        show_progress(self.channel.as_ref(), msg.chat_id, ChatAction::UploadPhoto)
                            .await;
                        self.provider.generate(request).await
                    }
                },
                |e| self.is_terminal(e),
            )
            .await;

        match result {
            Ok(image) => {
                tracing::info!(
                    revised_prompt = image.revised_prompt.as_deref().unwrap_or_default(),
                    "Image generated"
                );
                OutgoingContent::photo(image.url, format!("🎨 {description}"))
            }
            Err(e) => {
                tracing::error!(
                    attempts = e.attempts,
                    error = %sanitize_for_log(&e.last.to_string()),
                    "Image generation failed"
                );
                OutgoingContent::text(GENERATE_ERROR_MESSAGE)
            }
        }
    }

    /// Edit the photo the message replies to according to `description`.
    ///
    /// The downloaded source lives in a temporary file that is removed when
    /// this call returns, whatever the outcome.
    pub async fn edit(&self, msg: &ChannelMessage, description: &str) -> OutgoingContent {
        let Some(photo) = msg.reply_photo() else {
            return OutgoingContent::text(EDIT_USAGE_MESSAGE);
        };
        if description.is_empty() {
            return OutgoingContent::text(EDIT_USAGE_MESSAGE);
        }

        self.request_log
            .append(RequestLogEntry::new(
                msg.sender.id,
                msg.sender.display_name(),
                RequestKind::Edit,
                description,
            ))
            .await;

        let source = match tempfile::Builder::new().prefix("muse-edit-").tempfile() {
            Ok(file) => file,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create temporary file");
                return OutgoingContent::text(EDIT_ERROR_MESSAGE);
            }
        };

        if let Err(e) = self.channel.download_file(&photo.file_id, source.path()).await {
            tracing::error!(file_id = %photo.file_id, error = %e, "Failed to download photo");
            return OutgoingContent::text(EDIT_ERROR_MESSAGE);
        }

        let side = square_side(&self.config.size);
        let path = source.path().to_path_buf();
        let image_png = match tokio::task::spawn_blocking(move || prepare_edit_source(&path, side)).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Failed to transcode photo");
                return OutgoingContent::text(EDIT_ERROR_MESSAGE);
            }
            Err(e) => {
                tracing::error!(error = %e, "Transcode task failed");
                return OutgoingContent::text(EDIT_ERROR_MESSAGE);
            }
        };

        let request = ImageEditRequest {
            model: self.config.edit_model.clone(),
            prompt: format!("{}: {description}", self.config.edit_prompt_prefix),
            size: self.config.size.clone(),
            image_png,
        };

        let result = self
            .policy
            .run(
                |_| {
                    let request = request.clone();
                    async move {
                        show_progress(self.channel.as_ref(), msg.chat_id, ChatAction::UploadPhoto)
                            .await;
                        self.provider.edit(request).await
                    }
                },
                |e| self.is_terminal(e),
            )
            .await;

        match result {
            Ok(image) => OutgoingContent::photo(image.url, format!("✏️ {description}")),
            Err(e) => {
                tracing::error!(
                    attempts = e.attempts,
                    error = %sanitize_for_log(&e.last.to_string()),
                    "Image edit failed"
                );
                OutgoingContent::text(EDIT_ERROR_MESSAGE)
            }
        }
    }
}

/// Side length from a `WxH` size string, if it is square.
fn square_side(size: &str) -> Option<u32> {
    let (w, h) = size.split_once('x')?;
    let (w, h): (u32, u32) = (w.trim().parse().ok()?, h.trim().parse().ok()?);
    (w == h && w > 0).then_some(w)
}

/// Decode any supported photo, center-crop it to a square, shrink it to at
/// most `side` pixels and re-encode it as RGBA PNG.
fn prepare_edit_source(path: &Path, side: Option<u32>) -> Result<Vec<u8>, image::ImageError> {
    let decoded = ImageReader::open(path)?.with_guessed_format()?.decode()?;

    let (width, height) = (decoded.width(), decoded.height());
    let edge = width.min(height);
    let mut square = decoded.crop_imm((width - edge) / 2, (height - edge) / 2, edge, edge);
    if let Some(side) = side.filter(|&s| edge > s) {
        square = square.resize_exact(side, side, FilterType::Triangle);
    }

    let mut png = Vec::new();
    DynamicImage::ImageRgba8(square.to_rgba8()).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(png)
}
