//! Muse Gateway - Upstream AI providers.
//!
//! This crate wraps the OpenAI HTTP API behind two traits:
//! - [`ChatProvider`] for chat completions
//! - [`ImageProvider`] for image generation and photo edits
//!
//! The bot only ever talks to these traits, so tests can substitute
//! in-memory providers and the HTTP contract is tested separately.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod image;
pub mod provider;

pub use image::{
    GeneratedImage, ImageEditRequest, ImageGenerationRequest, ImageProvider, OpenAIImageProvider,
};
pub use provider::{
    ChatProvider, ChatRequest, ChatResponse, Message, OpenAIProvider, ProviderError, Role,
    TokenUsage,
};
