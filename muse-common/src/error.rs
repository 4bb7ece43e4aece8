//! Error types for the Muse bot.

use thiserror::Error;

/// Result type alias using the Muse error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for Muse crates.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create an error with additional context.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Extension trait for adding context to any error type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_with_context() {
        let err = Error::Config("missing bot token".into()).with_context("loading config");
        assert!(matches!(err, Error::WithContext { .. }));
        assert_eq!(
            err.to_string(),
            "loading config: Configuration error: missing bot token"
        );
    }

    #[test]
    fn test_result_ext_wraps_io_error() {
        let res: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "gone",
        ));
        let err = res.context("reading config.json").unwrap_err();
        match err {
            Error::WithContext { context, source } => {
                assert_eq!(context, "reading config.json");
                assert!(matches!(*source, Error::Io(_)));
            }
            other => panic!("expected context wrapper, got {other:?}"),
        }
    }
}
