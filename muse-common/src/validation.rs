//! Configuration validation for the Muse bot.
//!
//! Checks that credentials are present and that numeric settings are within
//! ranges the responders rely on.

use thiserror::Error;

use crate::config::{AdminConfig, ChatConfig, Config, ObservabilityConfig, RetryConfig};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if self.telegram_bot_token().is_none() {
            errors.push(ValidationError::MissingField {
                field: "secrets.telegram_bot_token (or BOT_TOKEN)".into(),
            });
        }

        if self.openai_api_key().is_none() {
            errors.push(ValidationError::MissingField {
                field: "secrets.openai_api_key (or OPENAI_API_KEY)".into(),
            });
        }

        if self.telegram.request_timeout_secs <= self.telegram.poll_timeout_secs {
            errors.push(ValidationError::InvalidValue {
                field: "telegram.request_timeout_secs".into(),
                reason: "must be greater than telegram.poll_timeout_secs".into(),
            });
        }

        if self.openai.timeout_secs == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "openai.timeout_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }

        let sections: [&dyn Validate; 4] =
            [&self.chat, &self.admin, &self.retry, &self.observability];
        for section in sections {
            if let Err(e) = section.validate() {
                errors.push(e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }

    /// Settings that are valid but switch features off.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.admin.admin_id.is_none() {
            warnings.push(
                "admin.admin_id (or ADMIN_ID) is not set: /admin is disabled and /start \
                 notifications are not sent"
                    .to_string(),
            );
        }
        warnings
    }

    /// Load, apply environment overrides, and validate configuration.
    pub fn load_and_validate() -> anyhow::Result<Self> {
        let config = Self::load_with_env()?;
        config.validate().map_err(|e| anyhow::anyhow!("{}", e))?;
        Ok(config)
    }
}

impl Validate for ChatConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.history_window == 0 {
            return Err(ValidationError::InvalidValue {
                field: "chat.history_window".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.max_retained_turns < self.history_window {
            return Err(ValidationError::InvalidValue {
                field: "chat.max_retained_turns".into(),
                reason: format!("must be at least chat.history_window ({})", self.history_window),
            });
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ValidationError::InvalidValue {
                field: "chat.temperature".into(),
                reason: "must be between 0.0 and 2.0".into(),
            });
        }

        if self.max_tokens <= 0 {
            return Err(ValidationError::InvalidValue {
                field: "chat.max_tokens".into(),
                reason: "must be greater than 0".into(),
            });
        }

        Ok(())
    }
}

impl Validate for AdminConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.request_log_window == 0 {
            return Err(ValidationError::InvalidValue {
                field: "admin.request_log_window".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.request_log_capacity < self.request_log_window {
            return Err(ValidationError::InvalidValue {
                field: "admin.request_log_capacity".into(),
                reason: format!(
                    "must be at least admin.request_log_window ({})",
                    self.request_log_window
                ),
            });
        }

        Ok(())
    }
}

impl Validate for RetryConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.max_attempts == 0 {
            return Err(ValidationError::InvalidValue {
                field: "retry.max_attempts".into(),
                reason: "must be at least 1".into(),
            });
        }

        if self.exponential && self.max_backoff_ms < self.backoff_ms {
            return Err(ValidationError::InvalidValue {
                field: "retry.max_backoff_ms".into(),
                reason: "must not be below retry.backoff_ms".into(),
            });
        }

        Ok(())
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            });
        }

        Ok(())
    }
}
