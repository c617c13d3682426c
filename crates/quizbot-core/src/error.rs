//! Error types for the QuizBot core.
//!
//! Load-time errors (`MalformedBank`, `BankRead`) abort startup. Everything
//! else is raised while serving a request and is meant to be shown to the
//! person taking the quiz, never to crash the handler.

use std::path::PathBuf;

/// A specialized `Result` type for quiz operations.
pub type Result<T> = std::result::Result<T, QuizError>;

/// Errors that can occur while loading questions or running a quiz.
#[derive(Debug, thiserror::Error)]
pub enum QuizError {
    // ========================================================================
    // Question bank errors
    // ========================================================================
    /// The question bank document could not be parsed.
    #[error("Malformed question bank{}: {message}\n\nSuggestion: Fix the entry in the question bank JSON and restart", location_suffix(.exam_set.as_deref(), .question.as_deref()))]
    MalformedBank {
        /// Exam set containing the bad entry, if known.
        exam_set: Option<String>,
        /// Question text of the bad entry, if known.
        question: Option<String>,
        /// What is wrong with the entry.
        message: String,
    },

    /// The question bank file could not be read.
    #[error("Failed to read question bank '{path}': {message}\n\nSuggestion: Check the 'bankPath' setting and file permissions")]
    BankRead {
        /// Path of the bank file.
        path: PathBuf,
        /// Description of the I/O failure.
        message: String,
    },

    // ========================================================================
    // Quiz start errors
    // ========================================================================
    /// No questions are available to sample from.
    #[error("No questions available{}", exam_set_suffix(.exam_set.as_deref()))]
    EmptyPool {
        /// The exam set that was requested, or `None` for the combined pool.
        exam_set: Option<String>,
    },

    /// The requested exam set does not exist in the bank.
    #[error("Unknown exam set '{name}' (available: {})", .available.join(", "))]
    UnknownExamSet {
        /// The name that was requested.
        name: String,
        /// Names of the exam sets that do exist.
        available: Vec<String>,
    },

    /// A quiz was requested with zero questions.
    #[error("Question count must be at least 1 (got {requested})")]
    InvalidQuestionCount {
        /// The count that was requested.
        requested: usize,
    },

    // ========================================================================
    // Answer errors
    // ========================================================================
    /// An answer was submitted but no quiz is in progress for the key.
    #[error("No active quiz for session '{key}'")]
    NoActiveSession {
        /// The session key the answer was submitted for.
        key: String,
    },

    /// An answer was submitted for a question that is no longer current.
    #[error("Submission for session '{key}' does not match the current question")]
    StaleSubmission {
        /// The session key the answer was submitted for.
        key: String,
    },
}

fn location_suffix(exam_set: Option<&str>, question: Option<&str>) -> String {
    match (exam_set, question) {
        (Some(set), Some(question)) => format!(" (set '{set}', question '{}')", truncate(question)),
        (Some(set), None) => format!(" (set '{set}')"),
        (None, Some(question)) => format!(" (question '{}')", truncate(question)),
        (None, None) => String::new(),
    }
}

fn exam_set_suffix(exam_set: Option<&str>) -> String {
    exam_set.map_or_else(String::new, |set| format!(" in exam set '{set}'"))
}

/// Shortens long question text for error messages.
fn truncate(text: &str) -> String {
    const MAX_CHARS: usize = 60;
    let first_line = text.lines().next().unwrap_or_default();
    if first_line.chars().count() > MAX_CHARS {
        let head: String = first_line.chars().take(MAX_CHARS).collect();
        format!("{head}…")
    } else {
        first_line.to_string()
    }
}

impl QuizError {
    /// Creates a new `MalformedBank` error with no location.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedBank {
            exam_set: None,
            question: None,
            message: message.into(),
        }
    }

    /// Creates a new `MalformedBank` error located at a question.
    #[must_use]
    pub fn malformed_question(
        exam_set: impl Into<String>,
        question: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::MalformedBank {
            exam_set: Some(exam_set.into()),
            question: Some(question.into()),
            message: message.into(),
        }
    }

    /// Creates a new `MalformedBank` error located at an exam set.
    #[must_use]
    pub fn malformed_set(exam_set: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedBank {
            exam_set: Some(exam_set.into()),
            question: None,
            message: message.into(),
        }
    }

    /// Creates a new `BankRead` error.
    #[must_use]
    pub fn bank_read(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::BankRead {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `EmptyPool` error.
    #[must_use]
    pub fn empty_pool(exam_set: Option<&str>) -> Self {
        Self::EmptyPool {
            exam_set: exam_set.map(ToString::to_string),
        }
    }

    /// Creates a new `UnknownExamSet` error.
    #[must_use]
    pub fn unknown_exam_set(name: impl Into<String>, available: Vec<String>) -> Self {
        Self::UnknownExamSet {
            name: name.into(),
            available,
        }
    }

    /// Creates a new `NoActiveSession` error.
    #[must_use]
    pub fn no_active_session(key: impl std::fmt::Display) -> Self {
        Self::NoActiveSession {
            key: key.to_string(),
        }
    }

    /// Creates a new `StaleSubmission` error.
    #[must_use]
    pub fn stale_submission(key: impl std::fmt::Display) -> Self {
        Self::StaleSubmission {
            key: key.to_string(),
        }
    }

    /// Returns `true` if this error must abort startup.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::MalformedBank { .. } | Self::BankRead { .. })
    }

    /// Returns `true` if this error should be reported to the quiz taker
    /// rather than treated as a server failure.
    #[must_use]
    pub const fn is_user_facing(&self) -> bool {
        !self.is_fatal()
    }

    /// Returns the message to show the quiz taker.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NoActiveSession { .. } => {
                "You don't have an active quiz. Start one with `/start_quiz`.".to_string()
            }
            Self::StaleSubmission { .. } => {
                "That question has already been answered. Use the latest question message."
                    .to_string()
            }
            Self::EmptyPool { .. } => {
                format!("Cannot start quiz: {self}.")
            }
            Self::UnknownExamSet { name, available } => format!(
                "Cannot start quiz: there is no exam set named `{name}`. Available sets: {}.",
                available.join(", ")
            ),
            Self::InvalidQuestionCount { .. } => {
                "Cannot start quiz: ask for at least one question.".to_string()
            }
            Self::MalformedBank { .. } | Self::BankRead { .. } => {
                "The quiz is unavailable right now. Please try again later.".to_string()
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_question_display_includes_location() {
        let err = QuizError::malformed_question("exam_a", "What is S3?", "missing 'answer' field");
        let msg = err.to_string();
        assert!(msg.contains("exam_a"));
        assert!(msg.contains("What is S3?"));
        assert!(msg.contains("missing 'answer' field"));
        assert!(msg.contains("Suggestion"));
    }

    #[test]
    fn test_malformed_truncates_long_question_text() {
        let long = "x".repeat(200);
        let err = QuizError::malformed_question("set", long, "bad");
        assert!(err.to_string().contains('…'));
    }

    #[test]
    fn test_empty_pool_display() {
        assert_eq!(
            QuizError::empty_pool(Some("exam_b")).to_string(),
            "No questions available in exam set 'exam_b'"
        );
        assert_eq!(
            QuizError::empty_pool(None).to_string(),
            "No questions available"
        );
    }

    #[test]
    fn test_is_fatal() {
        assert!(QuizError::malformed("bad").is_fatal());
        assert!(QuizError::bank_read("/tmp/qa.json", "denied").is_fatal());
        assert!(!QuizError::no_active_session("c:u").is_fatal());
        assert!(!QuizError::empty_pool(None).is_fatal());
    }

    #[test]
    fn test_is_user_facing() {
        assert!(QuizError::no_active_session("c:u").is_user_facing());
        assert!(QuizError::stale_submission("c:u").is_user_facing());
        assert!(QuizError::InvalidQuestionCount { requested: 0 }.is_user_facing());
        assert!(!QuizError::malformed("bad").is_user_facing());
    }

    #[test]
    fn test_user_messages() {
        let msg = QuizError::no_active_session("c:u").user_message();
        assert!(msg.contains("no active quiz") || msg.contains("don't have an active quiz"));

        let msg = QuizError::unknown_exam_set("exam_z", vec!["exam_a".into(), "exam_b".into()])
            .user_message();
        assert!(msg.contains("exam_z"));
        assert!(msg.contains("exam_a, exam_b"));

        let msg = QuizError::empty_pool(Some("exam_a")).user_message();
        assert!(msg.starts_with("Cannot start quiz"));
    }
}
