//! Image generation and photo edit providers.

mod openai;

pub use openai::OpenAIImageProvider;

use crate::provider::ProviderError;
use async_trait::async_trait;

/// Unified interface for image providers.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Generate a single image from a text prompt.
    async fn generate(&self, request: ImageGenerationRequest) -> Result<GeneratedImage, ProviderError>;

    /// Edit a PNG image according to a text prompt.
    async fn edit(&self, request: ImageEditRequest) -> Result<GeneratedImage, ProviderError>;
}

/// Request for `/v1/images/generations`.
#[derive(Debug, Clone)]
pub struct ImageGenerationRequest {
    pub model: String,
    pub prompt: String,
    /// e.g. `1024x1024`
    pub size: String,
}

/// Request for `/v1/images/edits`.
#[derive(Debug, Clone)]
pub struct ImageEditRequest {
    pub model: String,
    pub prompt: String,
    pub size: String,
    /// PNG-encoded source image
    pub image_png: Vec<u8>,
}

/// A hosted image produced by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub url: String,
    /// Prompt after the provider's own rewriting, when reported
    pub revised_prompt: Option<String>,
}
