//! QuizBot core
//!
//! Question bank, answer matching and the per-user quiz state machine. Knows
//! nothing about HTTP or Slack.

pub mod bank;
pub mod controller;
pub mod error;
pub mod matcher;
pub mod render;
pub mod session;
pub mod store;

pub use bank::{Choice, ChoiceId, ExamSet, Question, QuestionBank, MAX_CHOICES};
pub use controller::{QuizController, StartRequest, Submission};
pub use error::{QuizError, Result};
pub use matcher::Evaluation;
pub use render::{Feedback, QuestionPrompt, RenderInstruction};
pub use session::{Checkpoint, Progress, QuizSession, Score, SessionKey, SessionStatus};
pub use store::{Advance, InMemorySessionStore, SessionStore};
