//! Quiz session state.
//!
//! A session moves through `NoSession -> InProgress -> Completed`. Completed
//! sessions are removed from the store in the same step that completes them,
//! so a live session is always `InProgress` and its position always names a
//! question that has not been answered yet.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bank::Question;

// ============================================================================
// SessionKey
// ============================================================================

/// Identifies the requester a quiz belongs to.
///
/// For Slack this is the channel and user pair, so the same user can run
/// separate quizzes in separate channels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    /// Creates a key from an arbitrary identifier.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Creates the key for a user in a channel.
    ///
    /// # Examples
    ///
    /// ```
    /// use quizbot_core::SessionKey;
    ///
    /// let key = SessionKey::for_user("C024BE91L", "U2147483697");
    /// assert_eq!(key.as_str(), "C024BE91L:U2147483697");
    /// ```
    #[must_use]
    pub fn for_user(channel_id: &str, user_id: &str) -> Self {
        Self(format!("{channel_id}:{user_id}"))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Checkpoint
// ============================================================================

/// Identifies one question of one session.
///
/// Prompts carry the checkpoint they were rendered for. An answer submitted
/// with an older checkpoint (a double click, or a click on a message from a
/// replaced quiz) is rejected instead of being scored against the wrong
/// question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Identifier of the session the prompt belongs to.
    pub session_id: Uuid,
    /// Zero-based position of the question.
    pub position: usize,
}

impl Checkpoint {
    /// Encodes the checkpoint as `"{session_id}:{position}"`.
    #[must_use]
    pub fn encode(&self) -> String {
        format!("{}:{}", self.session_id, self.position)
    }

    /// Decodes a checkpoint produced by [`Checkpoint::encode`].
    ///
    /// # Examples
    ///
    /// ```
    /// use quizbot_core::Checkpoint;
    /// use uuid::Uuid;
    ///
    /// let checkpoint = Checkpoint { session_id: Uuid::new_v4(), position: 3 };
    /// assert_eq!(Checkpoint::decode(&checkpoint.encode()), Some(checkpoint));
    /// assert_eq!(Checkpoint::decode("submit"), None);
    /// ```
    #[must_use]
    pub fn decode(value: &str) -> Option<Self> {
        let (id, position) = value.rsplit_once(':')?;
        Some(Self {
            session_id: Uuid::parse_str(id).ok()?,
            position: position.parse().ok()?,
        })
    }
}

// ============================================================================
// SessionStatus
// ============================================================================

/// Lifecycle status of a quiz for a session key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No quiz exists for the key.
    #[default]
    NoSession,
    /// Questions remain to be answered.
    InProgress,
    /// Every question has been answered.
    Completed,
}

impl SessionStatus {
    /// Returns `true` if this status is terminal.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSession => write!(f, "no_session"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

// ============================================================================
// Score / Progress
// ============================================================================

/// Correct answers out of questions asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    /// Number of questions answered correctly.
    pub correct: usize,
    /// Number of questions counted.
    pub total: usize,
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.correct, self.total)
    }
}

/// Read-only view of a session's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    /// Status of the session.
    pub status: SessionStatus,
    /// Questions answered so far.
    pub answered: usize,
    /// Questions answered correctly so far.
    pub correct: usize,
    /// Questions in the quiz.
    pub total: usize,
}

// ============================================================================
// QuizSession
// ============================================================================

/// Mutable state of one quiz.
#[derive(Debug, Clone)]
pub struct QuizSession {
    /// Regenerated on every start, so prompts from a replaced quiz go stale.
    pub id: Uuid,
    /// Key of the requester.
    pub key: SessionKey,
    /// Exam set the questions were drawn from, `None` for the combined pool.
    pub exam_set: Option<String>,
    /// Questions in the order they are asked.
    pub questions: Vec<Arc<Question>>,
    /// Zero-based index of the next question to answer.
    pub position: usize,
    /// Questions answered correctly so far.
    pub correct: usize,
    /// When the quiz started.
    pub created_at: DateTime<Utc>,
    /// When the quiz last changed.
    pub updated_at: DateTime<Utc>,
}

impl QuizSession {
    /// Creates a session positioned at the first question.
    #[must_use]
    pub fn new(key: SessionKey, questions: Vec<Arc<Question>>, exam_set: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            key,
            exam_set,
            questions,
            position: 0,
            correct: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the number of questions in the quiz.
    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Returns `true` if the quiz has no questions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        if self.position >= self.questions.len() {
            SessionStatus::Completed
        } else {
            SessionStatus::InProgress
        }
    }

    /// Returns the question at the current position, or `None` once every
    /// question has been answered.
    #[must_use]
    pub fn current_question(&self) -> Option<&Arc<Question>> {
        self.questions.get(self.position)
    }

    /// Returns the checkpoint for the current position.
    #[must_use]
    pub const fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            session_id: self.id,
            position: self.position,
        }
    }

    /// Returns the score so far.
    #[must_use]
    pub const fn score(&self) -> Score {
        Score {
            correct: self.correct,
            total: self.questions.len(),
        }
    }

    /// Returns the progress view.
    #[must_use]
    pub fn progress(&self) -> Progress {
        Progress {
            status: self.status(),
            answered: self.position,
            correct: self.correct,
            total: self.questions.len(),
        }
    }

    /// Records the answer to the current question and moves to the next one.
    ///
    /// Does nothing once the quiz is complete, so the position never exceeds
    /// the number of questions and the correct count never exceeds the
    /// position.
    pub fn record_answer(&mut self, was_correct: bool) -> SessionStatus {
        if self.status().is_terminal() {
            return SessionStatus::Completed;
        }
        self.position += 1;
        if was_correct {
            self.correct += 1;
        }
        self.touch();
        self.status()
    }

    /// Updates the `updated_at` timestamp to the current time.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
