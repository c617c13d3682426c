//! Quiz session controller.
//!
//! Maps (session state, event) to (new state, render instruction). Every call
//! is synchronous; the only shared state is the session store, whose
//! `advance` applies an answer atomically.

use std::sync::{Arc, Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::bank::{ChoiceId, QuestionBank};
use crate::error::{QuizError, Result};
use crate::matcher;
use crate::render::{Feedback, QuestionPrompt, RenderInstruction};
use crate::session::{Checkpoint, Progress, QuizSession, Score, SessionKey};
use crate::store::{Advance, InMemorySessionStore, SessionStore};

/// Parameters for starting a quiz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    /// Number of questions to ask. Clamped to the pool size.
    pub count: usize,
    /// Exam set to draw from, or `None` for all sets.
    pub exam_set: Option<String>,
}

impl StartRequest {
    /// Creates a request drawing `count` questions from all sets.
    #[must_use]
    pub const fn new(count: usize) -> Self {
        Self {
            count,
            exam_set: None,
        }
    }

    /// Restricts the request to one exam set.
    #[must_use]
    pub fn with_exam_set(mut self, exam_set: impl Into<String>) -> Self {
        self.exam_set = Some(exam_set.into());
        self
    }
}

/// An answer to the current question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Key of the requester.
    pub key: SessionKey,
    /// Selected choice identifiers. May be empty or contain unknown ids.
    pub choices: Vec<ChoiceId>,
    /// Checkpoint of the prompt being answered. `None` answers whatever
    /// question is current.
    pub checkpoint: Option<Checkpoint>,
}

/// Runs quizzes against a question bank and a session store.
pub struct QuizController<S = InMemorySessionStore> {
    bank: Arc<QuestionBank>,
    store: S,
    rng: Mutex<StdRng>,
}

impl<S> std::fmt::Debug for QuizController<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuizController")
            .field("question_count", &self.bank.question_count())
            .finish_non_exhaustive()
    }
}

impl<S: SessionStore> QuizController<S> {
    /// Creates a controller with an entropy-seeded RNG.
    pub fn new(bank: Arc<QuestionBank>, store: S) -> Self {
        Self::with_rng(bank, store, StdRng::from_entropy())
    }

    /// Creates a controller with a caller-supplied RNG.
    pub fn with_rng(bank: Arc<QuestionBank>, store: S, rng: StdRng) -> Self {
        Self {
            bank,
            store,
            rng: Mutex::new(rng),
        }
    }

    /// Returns the question bank.
    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    /// Returns the session store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Starts a quiz for `key`, replacing any quiz already in progress, and
    /// returns the first question.
    ///
    /// # Errors
    ///
    /// - `QuizError::InvalidQuestionCount` if `request.count` is zero.
    /// - `QuizError::UnknownExamSet` if the named set does not exist.
    /// - `QuizError::EmptyPool` if there are no questions to draw from.
    pub fn start(&self, key: SessionKey, request: StartRequest) -> Result<RenderInstruction> {
        let questions = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            self.bank
                .sample(request.exam_set.as_deref(), request.count, &mut *rng)?
        };

        let session = self.store.create(key, questions, request.exam_set);
        tracing::info!(
            key = %session.key,
            session_id = %session.id,
            exam_set = session.exam_set.as_deref().unwrap_or("*"),
            questions = session.len(),
            "Quiz started"
        );

        prompt_for(&session, None)
    }

    /// Scores an answer to the current question and returns the next
    /// question, or the final score if it was the last one.
    ///
    /// # Errors
    ///
    /// - `QuizError::NoActiveSession` if no quiz is in progress for the key.
    /// - `QuizError::StaleSubmission` if the submission's checkpoint is not
    ///   the current question. The session is left unchanged.
    pub fn answer(&self, submission: Submission) -> Result<RenderInstruction> {
        let Submission {
            key,
            choices,
            checkpoint,
        } = submission;

        let session = self
            .store
            .get(&key)
            .ok_or_else(|| QuizError::no_active_session(&key))?;

        let live = session.checkpoint();
        let checkpoint = checkpoint.unwrap_or(live);
        if checkpoint != live {
            return Err(QuizError::stale_submission(&key));
        }

        let question = session
            .current_question()
            .ok_or_else(|| QuizError::no_active_session(&key))?;
        let evaluation = matcher::evaluate(question, &choices);
        let correct = evaluation.correct;

        let advance = self.store.advance(&key, checkpoint, correct)?;
        tracing::debug!(
            key = %key,
            position = checkpoint.position,
            correct,
            "Answer recorded"
        );

        let feedback = Feedback::from(evaluation);
        match advance {
            Advance::InProgress(session) => prompt_for(&session, Some(feedback)),
            Advance::Completed(session) => {
                let score = session.score();
                tracing::info!(key = %key, session_id = %session.id, score = %score, "Quiz completed");
                Ok(RenderInstruction::Final { feedback, score })
            }
        }
    }

    /// Ends the quiz for `key` early and returns the score over the questions
    /// answered so far.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::NoActiveSession` if no quiz is in progress.
    pub fn abandon(&self, key: &SessionKey) -> Result<Score> {
        let session = self
            .store
            .remove(key)
            .ok_or_else(|| QuizError::no_active_session(key))?;
        let score = Score {
            correct: session.correct,
            total: session.position,
        };
        tracing::info!(key = %key, session_id = %session.id, score = %score, "Quiz abandoned");
        Ok(score)
    }

    /// Returns the progress of the quiz for `key`, if one is in progress.
    pub fn progress(&self, key: &SessionKey) -> Option<Progress> {
        self.store.get(key).map(|session| session.progress())
    }
}

fn prompt_for(session: &QuizSession, feedback: Option<Feedback>) -> Result<RenderInstruction> {
    let question = session
        .current_question()
        .ok_or_else(|| QuizError::no_active_session(&session.key))?;
    Ok(RenderInstruction::Question {
        feedback,
        prompt: QuestionPrompt::new(session.checkpoint(), session.len(), question),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::bank::{ExamSet, Question};
    use crate::session::SessionStatus;

    /// Three single-answer questions whose key is always `b`.
    fn bank() -> Arc<QuestionBank> {
        let questions = (1..=3)
            .map(|i| {
                Question::new(format!("Question {i}"), ["w", "x", "y"], &["b"], format!("Because {i}"))
                    .unwrap()
            })
            .collect();
        let other = vec![Question::new("Other", ["p", "q"], &["a"], "").unwrap()];
        Arc::new(QuestionBank::from_sets([
            ExamSet::new("exam_a", questions).unwrap(),
            ExamSet::new("exam_b", other).unwrap(),
        ]))
    }

    fn controller() -> QuizController {
        QuizController::with_rng(bank(), InMemorySessionStore::new(), StdRng::seed_from_u64(42))
    }

    fn key() -> SessionKey {
        SessionKey::for_user("C1", "U1")
    }

    fn submit(key: &SessionKey, labels: &[&str]) -> Submission {
        Submission {
            key: key.clone(),
            choices: labels.iter().map(|label| ChoiceId::new(label)).collect(),
            checkpoint: None,
        }
    }

    #[test]
    fn test_start_returns_first_question_without_feedback() {
        let controller = controller();
        let instruction = controller
            .start(key(), StartRequest::new(2).with_exam_set("exam_a"))
            .unwrap();

        let prompt = instruction.prompt().unwrap();
        assert_eq!(prompt.number, 1);
        assert_eq!(prompt.total, 2);
        assert!(instruction.feedback().is_none());
        assert_eq!(controller.store().len(), 1);
    }

    #[test]
    fn test_count_is_clamped_and_score_reported() {
        let controller = controller();
        let instruction = controller
            .start(key(), StartRequest::new(10).with_exam_set("exam_a"))
            .unwrap();
        assert_eq!(instruction.prompt().unwrap().total, 3);

        let mut seen = HashSet::new();
        seen.insert(instruction.question_text().unwrap().to_string());

        let second = controller.answer(submit(&key(), &["b"])).unwrap();
        assert!(second.feedback().unwrap().correct);
        assert_eq!(second.prompt().unwrap().number, 2);
        seen.insert(second.question_text().unwrap().to_string());

        let third = controller.answer(submit(&key(), &["a"])).unwrap();
        let feedback = third.feedback().unwrap();
        assert!(!feedback.correct);
        assert_eq!(feedback.correct_labels(), "B");
        seen.insert(third.question_text().unwrap().to_string());
        assert_eq!(seen.len(), 3);

        let last = controller.answer(submit(&key(), &["b"])).unwrap();
        assert!(last.is_final());
        assert_eq!(last.score(), Some(Score { correct: 2, total: 3 }));
        assert!(last.to_plain_text().ends_with("Quiz completed! Your score is 2/3."));

        assert!(controller.store().is_empty());
        let err = controller.answer(submit(&key(), &["b"])).unwrap_err();
        assert!(matches!(err, QuizError::NoActiveSession { .. }));
    }

    #[test]
    fn test_start_without_exam_set_uses_all_sets() {
        let controller = controller();
        let instruction = controller.start(key(), StartRequest::new(50)).unwrap();
        assert_eq!(instruction.prompt().unwrap().total, 4);
    }

    #[test]
    fn test_start_replaces_existing_quiz() {
        let controller = controller();
        controller
            .start(key(), StartRequest::new(3).with_exam_set("exam_a"))
            .unwrap();
        controller.answer(submit(&key(), &["b"])).unwrap();

        let restarted = controller
            .start(key(), StartRequest::new(1).with_exam_set("exam_b"))
            .unwrap();
        assert_eq!(restarted.prompt().unwrap().total, 1);

        let progress = controller.progress(&key()).unwrap();
        assert_eq!(progress.answered, 0);
        assert_eq!(progress.correct, 0);
        assert_eq!(controller.store().len(), 1);
    }

    #[test]
    fn test_start_errors() {
        let controller = controller();
        let err = controller.start(key(), StartRequest::new(0)).unwrap_err();
        assert!(matches!(err, QuizError::InvalidQuestionCount { requested: 0 }));

        let err = controller
            .start(key(), StartRequest::new(1).with_exam_set("missing"))
            .unwrap_err();
        assert!(matches!(err, QuizError::UnknownExamSet { .. }));

        let empty = QuizController::new(Arc::new(QuestionBank::default()), InMemorySessionStore::new());
        let err = empty.start(key(), StartRequest::new(1)).unwrap_err();
        assert!(matches!(err, QuizError::EmptyPool { .. }));
        assert!(empty.store().is_empty());
    }

    #[test]
    fn test_answer_without_session() {
        let controller = controller();
        let err = controller.answer(submit(&key(), &["a"])).unwrap_err();
        assert!(matches!(err, QuizError::NoActiveSession { .. }));
    }

    #[test]
    fn test_empty_and_unknown_submissions_are_incorrect() {
        let controller = controller();
        controller
            .start(key(), StartRequest::new(3).with_exam_set("exam_a"))
            .unwrap();

        let next = controller.answer(submit(&key(), &[])).unwrap();
        assert!(!next.feedback().unwrap().correct);

        let next = controller.answer(submit(&key(), &["z"])).unwrap();
        assert!(!next.feedback().unwrap().correct);

        let progress = controller.progress(&key()).unwrap();
        assert_eq!(progress.answered, 2);
        assert_eq!(progress.correct, 0);
    }

    #[test]
    fn test_stale_checkpoint_is_rejected() {
        let controller = controller();
        let first = controller
            .start(key(), StartRequest::new(3).with_exam_set("exam_a"))
            .unwrap();
        let checkpoint = first.prompt().unwrap().checkpoint;

        let answer = Submission {
            checkpoint: Some(checkpoint),
            ..submit(&key(), &["b"])
        };
        controller.answer(answer.clone()).unwrap();

        let err = controller.answer(answer).unwrap_err();
        assert!(matches!(err, QuizError::StaleSubmission { .. }));
        assert_eq!(controller.progress(&key()).unwrap().answered, 1);
    }

    #[test]
    fn test_sessions_do_not_interfere() {
        let controller = controller();
        let alice = SessionKey::for_user("C1", "alice");
        let bob = SessionKey::for_user("C1", "bob");
        controller
            .start(alice.clone(), StartRequest::new(3).with_exam_set("exam_a"))
            .unwrap();
        controller
            .start(bob.clone(), StartRequest::new(3).with_exam_set("exam_a"))
            .unwrap();

        controller.answer(submit(&alice, &["b"])).unwrap();
        assert_eq!(controller.progress(&alice).unwrap().answered, 1);
        assert_eq!(controller.progress(&bob).unwrap().answered, 0);
    }

    #[test]
    fn test_abandon_reports_partial_score() {
        let controller = controller();
        controller
            .start(key(), StartRequest::new(3).with_exam_set("exam_a"))
            .unwrap();
        controller.answer(submit(&key(), &["b"])).unwrap();

        let score = controller.abandon(&key()).unwrap();
        assert_eq!(score, Score { correct: 1, total: 1 });
        assert!(controller.progress(&key()).is_none());

        let err = controller.abandon(&key()).unwrap_err();
        assert!(matches!(err, QuizError::NoActiveSession { .. }));
    }

    #[test]
    fn test_progress_status() {
        let controller = controller();
        assert!(controller.progress(&key()).is_none());
        controller
            .start(key(), StartRequest::new(2).with_exam_set("exam_a"))
            .unwrap();
        assert_eq!(
            controller.progress(&key()).unwrap().status,
            SessionStatus::InProgress
        );
    }

    #[test]
    fn test_seeded_controllers_draw_the_same_questions() {
        let a = controller();
        let b = controller();
        let first_a = a.start(key(), StartRequest::new(3)).unwrap();
        let first_b = b.start(key(), StartRequest::new(3)).unwrap();
        assert_eq!(first_a.question_text(), first_b.question_text());
    }
}
