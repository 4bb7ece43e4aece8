//! Muse Common - Shared types, utilities, and configuration for the Muse bot.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Configuration validation
//! - Error types and handling utilities
//! - Logging setup and structured logging helpers
//! - A reusable retry policy for flaky upstream calls
//! - Utility functions used across Muse crates

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod retry;
pub mod util;
pub mod validation;

pub use config::{
    AdminConfig, BrandingConfig, ChatConfig, Config, ImageConfig, IntentsConfig,
    ObservabilityConfig, OpenAiConfig, PersonaConfig, RetryConfig, SecretsConfig, TelegramConfig,
};
pub use error::{Error, Result, ResultExt};
pub use retry::{Backoff, RetryError, RetryPolicy};
pub use validation::{Validate, ValidationError, ValidationResult};
