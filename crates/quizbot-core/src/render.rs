//! Render instructions.
//!
//! The controller never talks to a chat platform. It returns a
//! [`RenderInstruction`] describing what to show next, and the boundary layer
//! turns that into whatever message format it speaks.

use std::fmt::{self, Write};

use serde::{Deserialize, Serialize};

use crate::bank::{Choice, ChoiceId, Question};
use crate::matcher::Evaluation;
use crate::session::{Checkpoint, Score};

/// Result of the previous answer, shown above the next prompt or the final
/// score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    /// Whether the previous answer was correct.
    pub correct: bool,
    /// The answer key of the previous question.
    pub correct_choice_ids: Vec<ChoiceId>,
    /// Explanation of the previous question.
    pub explanation: String,
}

impl Feedback {
    /// Returns the answer key as display labels, e.g. `"A, C"`.
    #[must_use]
    pub fn correct_labels(&self) -> String {
        self.correct_choice_ids
            .iter()
            .map(ChoiceId::label)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl From<Evaluation> for Feedback {
    fn from(evaluation: Evaluation) -> Self {
        Self {
            correct: evaluation.correct,
            correct_choice_ids: evaluation.correct_choice_ids,
            explanation: evaluation.explanation,
        }
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.correct {
            writeln!(f, "That's correct!")?;
        } else {
            writeln!(f, "That's incorrect. Correct answer: {}", self.correct_labels())?;
        }
        if !self.explanation.is_empty() {
            writeln!(f, "Explanation: {}", self.explanation)?;
        }
        Ok(())
    }
}

/// A question ready to be shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPrompt {
    /// Checkpoint the answer must be submitted with.
    pub checkpoint: Checkpoint,
    /// One-based question number.
    pub number: usize,
    /// Questions in the quiz.
    pub total: usize,
    /// The question prompt.
    pub text: String,
    /// Choices in display order.
    pub choices: Vec<Choice>,
}

impl QuestionPrompt {
    /// Builds the prompt for `question` at `checkpoint`.
    #[must_use]
    pub fn new(checkpoint: Checkpoint, total: usize, question: &Question) -> Self {
        Self {
            checkpoint,
            number: checkpoint.position + 1,
            total,
            text: question.text.clone(),
            choices: question.choices.clone(),
        }
    }

    /// Returns the heading, e.g. `"Question 2/5"`.
    #[must_use]
    pub fn heading(&self) -> String {
        format!("Question {}/{}", self.number, self.total)
    }
}

/// What to show after a quiz operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderInstruction {
    /// Show a question, optionally preceded by feedback on the previous one.
    Question {
        /// Feedback on the previous answer. `None` for the first question.
        feedback: Option<Feedback>,
        /// The question to show.
        prompt: QuestionPrompt,
    },
    /// Show the final score.
    Final {
        /// Feedback on the last answer.
        feedback: Feedback,
        /// Final score.
        score: Score,
    },
}

impl RenderInstruction {
    /// Returns `true` if this is the final message of a quiz.
    #[must_use]
    pub const fn is_final(&self) -> bool {
        matches!(self, Self::Final { .. })
    }

    /// Returns the final score, if the quiz is over.
    #[must_use]
    pub const fn score(&self) -> Option<Score> {
        match self {
            Self::Final { score, .. } => Some(*score),
            Self::Question { .. } => None,
        }
    }

    /// Returns the feedback on the previous answer.
    #[must_use]
    pub const fn feedback(&self) -> Option<&Feedback> {
        match self {
            Self::Question { feedback, .. } => feedback.as_ref(),
            Self::Final { feedback, .. } => Some(feedback),
        }
    }

    /// Returns the question to show.
    #[must_use]
    pub const fn prompt(&self) -> Option<&QuestionPrompt> {
        match self {
            Self::Question { prompt, .. } => Some(prompt),
            Self::Final { .. } => None,
        }
    }

    /// Returns the text of the question to show.
    #[must_use]
    pub fn question_text(&self) -> Option<&str> {
        self.prompt().map(|prompt| prompt.text.as_str())
    }

    /// Returns the choices of the question to show.
    #[must_use]
    pub fn choices(&self) -> Option<&[Choice]> {
        self.prompt().map(|prompt| prompt.choices.as_slice())
    }

    /// Renders the instruction as plain text.
    ///
    /// Chat platforms with richer formats render the parts themselves; this is
    /// the fallback text and what the logs show.
    #[must_use]
    pub fn to_plain_text(&self) -> String {
        let mut out = String::new();
        if let Some(feedback) = self.feedback() {
            let _ = write!(out, "{feedback}");
        }
        match self {
            Self::Question { prompt, .. } => {
                if !out.is_empty() {
                    out.push('\n');
                }
                let _ = writeln!(out, "{}: {}", prompt.heading(), prompt.text);
                for choice in &prompt.choices {
                    let _ = writeln!(out, "{}. {}", choice.id.label(), choice.text);
                }
            }
            Self::Final { score, .. } => {
                let _ = write!(out, "Quiz completed! Your score is {score}.");
            }
        }
        out
    }
}
