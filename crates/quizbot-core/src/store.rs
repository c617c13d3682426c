//! Session storage.
//!
//! The controller only talks to the [`SessionStore`] trait. The in-memory
//! implementation is the only one shipped: sessions last minutes and losing
//! them on restart is acceptable. A durable backend has to provide the same
//! per-key atomicity for [`SessionStore::advance`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::bank::Question;
use crate::error::{QuizError, Result};
use crate::session::{Checkpoint, QuizSession, SessionKey, SessionStatus};

/// Outcome of [`SessionStore::advance`].
#[derive(Debug, Clone)]
pub enum Advance {
    /// Questions remain. Holds the updated session.
    InProgress(QuizSession),
    /// The last question was answered. The session has been removed from the
    /// store; this is its final state.
    Completed(QuizSession),
}

impl Advance {
    /// Returns the session snapshot.
    #[must_use]
    pub const fn session(&self) -> &QuizSession {
        match self {
            Self::InProgress(session) | Self::Completed(session) => session,
        }
    }

    /// Returns `true` if the quiz finished.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Storage for active quiz sessions, at most one per key.
///
/// Every operation is atomic with respect to the others for the same key.
pub trait SessionStore: Send + Sync {
    /// Starts a new session for `key`, replacing any existing one, and
    /// returns a snapshot of it.
    fn create(
        &self,
        key: SessionKey,
        questions: Vec<Arc<Question>>,
        exam_set: Option<String>,
    ) -> QuizSession;

    /// Returns a snapshot of the session for `key`.
    fn get(&self, key: &SessionKey) -> Option<QuizSession>;

    /// Records an answer for the question identified by `checkpoint`.
    ///
    /// Removes the session when its last question is answered.
    ///
    /// # Errors
    ///
    /// - `QuizError::NoActiveSession` if there is no session for `key`.
    /// - `QuizError::StaleSubmission` if `checkpoint` does not name the
    ///   session's current question.
    fn advance(
        &self,
        key: &SessionKey,
        checkpoint: Checkpoint,
        was_correct: bool,
    ) -> Result<Advance>;

    /// Removes and returns the session for `key`.
    fn remove(&self, key: &SessionKey) -> Option<QuizSession>;

    /// Returns the number of active sessions.
    fn len(&self) -> usize;

    /// Returns `true` if there are no active sessions.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S: SessionStore + ?Sized> SessionStore for Arc<S> {
    fn create(
        &self,
        key: SessionKey,
        questions: Vec<Arc<Question>>,
        exam_set: Option<String>,
    ) -> QuizSession {
        (**self).create(key, questions, exam_set)
    }

    fn get(&self, key: &SessionKey) -> Option<QuizSession> {
        (**self).get(key)
    }

    fn advance(
        &self,
        key: &SessionKey,
        checkpoint: Checkpoint,
        was_correct: bool,
    ) -> Result<Advance> {
        (**self).advance(key, checkpoint, was_correct)
    }

    fn remove(&self, key: &SessionKey) -> Option<QuizSession> {
        (**self).remove(key)
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}

/// Process-local session store guarded by a single mutex.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<SessionKey, QuizSession>>,
}

impl InMemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the map. A poisoned lock is recovered: every mutation below is a
    /// single insert, remove or field update, so the map is never left
    /// half-written.
    fn lock(&self) -> MutexGuard<'_, HashMap<SessionKey, QuizSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(
        &self,
        key: SessionKey,
        questions: Vec<Arc<Question>>,
        exam_set: Option<String>,
    ) -> QuizSession {
        let session = QuizSession::new(key.clone(), questions, exam_set);
        let replaced = self.lock().insert(key, session.clone());
        if let Some(old) = replaced {
            tracing::debug!(
                key = %old.key,
                answered = old.position,
                "Replaced in-progress quiz"
            );
        }
        session
    }

    fn get(&self, key: &SessionKey) -> Option<QuizSession> {
        self.lock().get(key).cloned()
    }

    fn advance(
        &self,
        key: &SessionKey,
        checkpoint: Checkpoint,
        was_correct: bool,
    ) -> Result<Advance> {
        let mut sessions = self.lock();
        let session = sessions
            .get_mut(key)
            .ok_or_else(|| QuizError::no_active_session(key))?;

        if session.checkpoint() != checkpoint {
            return Err(QuizError::stale_submission(key));
        }

        match session.record_answer(was_correct) {
            SessionStatus::Completed => sessions
                .remove(key)
                .map(Advance::Completed)
                .ok_or_else(|| QuizError::no_active_session(key)),
            SessionStatus::InProgress | SessionStatus::NoSession => {
                Ok(Advance::InProgress(session.clone()))
            }
        }
    }

    fn remove(&self, key: &SessionKey) -> Option<QuizSession> {
        self.lock().remove(key)
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}
