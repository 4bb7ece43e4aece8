//! OpenAI Images API implementation.
//!
//! Generation posts JSON; edits post a multipart form with the PNG source.

use super::{GeneratedImage, ImageEditRequest, ImageGenerationRequest, ImageProvider};
use crate::provider::{api_error_message, build_client, ProviderError};
use async_trait::async_trait;
use muse_common::util::sanitize_for_log;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// OpenAI Images API provider.
pub struct OpenAIImageProvider {
    client: reqwest::Client,
    base_url: String,
}

impl OpenAIImageProvider {
    /// Create a provider against `https://api.openai.com` with a 120s timeout.
    pub fn new(api_key: &str) -> Result<Self, ProviderError> {
        Self::with_base_url(api_key, "https://api.openai.com", Duration::from_secs(120))
    }

    /// Create with custom base URL (for OpenAI-compatible APIs and tests).
    pub fn with_base_url(
        api_key: &str,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(api_key, timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn parse_response(
        response: reqwest::Response,
        model: &str,
    ) -> Result<GeneratedImage, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::new(
                "openai",
                model,
                api_error_message(&body),
                Some(status.as_u16()),
            ));
        }

        let images: ImagesResponse = response.json().await.map_err(|e| {
            ProviderError::new("openai", model, format!("Failed to parse response: {e}"), None)
        })?;

        images
            .data
            .into_iter()
            .find_map(|d| {
                d.url.map(|url| GeneratedImage {
                    url,
                    revised_prompt: d.revised_prompt,
                })
            })
            .ok_or_else(|| ProviderError::new("openai", model, "Response contained no image URL", None))
    }
}

#[async_trait]
impl ImageProvider for OpenAIImageProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, request: ImageGenerationRequest) -> Result<GeneratedImage, ProviderError> {
        let url = format!("{}/v1/images/generations", self.base_url);
        let body = GenerationBody {
            model: &request.model,
            prompt: &request.prompt,
            n: 1,
            size: &request.size,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let message = format!("Request failed: {}", sanitize_for_log(&e.to_string()));
                ProviderError::new("openai", &request.model, message, None)
            })?;

        let image = Self::parse_response(response, &request.model).await?;
        tracing::debug!(model = %request.model, "Image generated");
        Ok(image)
    }

    async fn edit(&self, request: ImageEditRequest) -> Result<GeneratedImage, ProviderError> {
        let url = format!("{}/v1/images/edits", self.base_url);
        let bytes = request.image_png.len();

        let image_part = Part::bytes(request.image_png)
            .file_name("image.png")
            .mime_str("image/png")
            .map_err(|e| {
                ProviderError::new("openai", &request.model, format!("Invalid MIME type: {e}"), None)
            })?;

        let form = Form::new()
            .part("image", image_part)
            .text("prompt", request.prompt)
            .text("model", request.model.clone())
            .text("n", "1")
            .text("size", request.size);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                let message = format!("Request failed: {}", sanitize_for_log(&e.to_string()));
                ProviderError::new("openai", &request.model, message, None)
            })?;

        let image = Self::parse_response(response, &request.model).await?;
        tracing::debug!(model = %request.model, source_bytes = bytes, "Image edited");
        Ok(image)
    }
}

// ============================================================================
// OpenAI API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerationBody<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    revised_prompt: Option<String>,
}
