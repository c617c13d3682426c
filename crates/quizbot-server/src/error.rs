//! Error types for the QuizBot server.

use std::path::PathBuf;

use quizbot_core::QuizError;

/// A specialized `Result` type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors that can occur while configuring or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    // ========================================================================
    // Configuration errors
    // ========================================================================
    /// Invalid JSON syntax in the configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your quizbot.json with a JSON linter")]
    ConfigParse {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Delivery errors
    // ========================================================================
    /// A message could not be delivered to Slack's `response_url`.
    #[error("Failed to deliver message to response URL: {message}")]
    Delivery {
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // Quiz errors
    // ========================================================================
    /// An error raised by the quiz engine.
    #[error(transparent)]
    Quiz(#[from] QuizError),
}

impl ServerError {
    /// Creates a new `ConfigParse` error.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidation` error.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `Delivery` error.
    #[must_use]
    pub fn delivery(message: impl Into<String>) -> Self {
        Self::Delivery {
            message: message.into(),
        }
    }
}

/// Reasons a Slack request signature is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// A required header is absent or not valid UTF-8.
    #[error("missing or unreadable '{0}' header")]
    MissingHeader(&'static str),

    /// The timestamp header is not an integer.
    #[error("invalid request timestamp '{0}'")]
    InvalidTimestamp(String),

    /// The timestamp is too far from the current time.
    #[error("request timestamp is {age_secs}s away from now (limit {max_age_secs}s)")]
    Expired {
        /// Absolute distance between the timestamp and now.
        age_secs: u64,
        /// Configured limit.
        max_age_secs: u64,
    },

    /// The signature does not match the body.
    #[error("signature does not match")]
    Mismatch,
}
