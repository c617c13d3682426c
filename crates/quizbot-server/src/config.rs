//! Configuration for the QuizBot server.
//!
//! Settings come from `quizbot.json` in camelCase. Every field has a default,
//! so a missing file yields a working configuration. The Slack signing secret
//! is never read from this file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ServerError};

/// The default config file name.
pub const CONFIG_FILE_NAME: &str = "quizbot.json";

fn default_bank_path() -> PathBuf {
    PathBuf::from("qa_lookup.json")
}

const fn default_question_count() -> usize {
    5
}

const fn default_max_question_count() -> usize {
    50
}

/// Slack's documented replay window.
const fn default_max_request_age() -> u64 {
    300
}

const fn default_delivery_timeout() -> u64 {
    10
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Path to the question bank JSON document.
    #[serde(default = "default_bank_path")]
    pub bank_path: PathBuf,

    /// Exam set used when the slash command names none. `None` draws from
    /// every set.
    #[serde(default)]
    pub default_exam_set: Option<String>,

    /// Number of questions when the slash command gives no count.
    #[serde(default = "default_question_count")]
    pub default_question_count: usize,

    /// Upper bound on the requested question count.
    #[serde(default = "default_max_question_count")]
    pub max_question_count: usize,

    /// Maximum distance in seconds between a request's timestamp and now.
    #[serde(default = "default_max_request_age")]
    pub max_request_age_secs: u64,

    /// Visibility of quiz messages in the channel.
    #[serde(default)]
    pub response_type: ResponseType,

    /// Timeout in seconds for posting to Slack's `response_url`.
    #[serde(default = "default_delivery_timeout")]
    pub delivery_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bank_path: default_bank_path(),
            default_exam_set: None,
            default_question_count: default_question_count(),
            max_question_count: default_max_question_count(),
            max_request_age_secs: default_max_request_age(),
            response_type: ResponseType::default(),
            delivery_timeout_secs: default_delivery_timeout(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from `quizbot.json` in the given directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is invalid.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::ConfigParse` if the file cannot be read or is not
    /// valid JSON, and `ServerError::ConfigValidation` if a value is out of
    /// range.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(ServerError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ServerError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::ConfigValidation` if any check fails.
    pub fn validate(&self) -> Result<()> {
        if self.bank_path.as_os_str().is_empty() {
            return Err(ServerError::config_validation(
                "bankPath must not be empty",
                "Point bankPath at your question bank JSON in quizbot.json",
            ));
        }

        if self.default_question_count == 0 {
            return Err(ServerError::config_validation(
                "defaultQuestionCount must be greater than 0",
                "Set defaultQuestionCount to at least 1 in your quizbot.json",
            ));
        }

        if self.max_question_count < self.default_question_count {
            return Err(ServerError::config_validation(
                format!(
                    "maxQuestionCount ({}) is smaller than defaultQuestionCount ({})",
                    self.max_question_count, self.default_question_count
                ),
                "Raise maxQuestionCount or lower defaultQuestionCount in your quizbot.json",
            ));
        }

        if self.max_request_age_secs == 0 {
            return Err(ServerError::config_validation(
                "maxRequestAgeSecs must be greater than 0",
                "Set maxRequestAgeSecs to at least 1 second (Slack recommends 300)",
            ));
        }

        if self.delivery_timeout_secs == 0 {
            return Err(ServerError::config_validation(
                "deliveryTimeoutSecs must be greater than 0",
                "Set deliveryTimeoutSecs to at least 1 second in your quizbot.json",
            ));
        }

        if matches!(&self.default_exam_set, Some(set) if set.trim().is_empty()) {
            return Err(ServerError::config_validation(
                "defaultExamSet must not be an empty string",
                "Use null to draw from every exam set",
            ));
        }

        Ok(())
    }

    /// Clamps a requested question count to `maxQuestionCount`.
    #[must_use]
    pub fn clamp_count(&self, requested: usize) -> usize {
        requested.min(self.max_question_count)
    }
}

/// Visibility of messages posted in response to a slash command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseType {
    /// Visible to everyone in the channel (default).
    #[default]
    InChannel,
    /// Visible only to the user who ran the command.
    Ephemeral,
}

impl ResponseType {
    /// Returns Slack's wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InChannel => "in_channel",
            Self::Ephemeral => "ephemeral",
        }
    }

    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "in_channel" => Some(Self::InChannel),
            "ephemeral" => Some(Self::Ephemeral),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for ResponseType {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid response type '{s}': expected one of 'in_channel', 'ephemeral'"
            ))
        })
    }
}

impl Serialize for ResponseType {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}
