//! Answer validation.
//!
//! Scoring is all-or-nothing: a submission is correct only when the set of
//! selected choices equals the answer key exactly. This covers both
//! single-answer keys (exactly one choice selected) and multi-answer keys (no
//! partial credit for subsets, no credit for supersets).
//!
//! Submissions are untrusted. Empty selections and identifiers that do not
//! belong to the question are scored as incorrect instead of being rejected.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::bank::{ChoiceId, Question};

/// Result of checking a submission against a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Whether the submission matched the answer key exactly.
    pub correct: bool,
    /// The answer key, in label order.
    pub correct_choice_ids: Vec<ChoiceId>,
    /// Explanation of the answer.
    pub explanation: String,
    /// Submitted identifiers that are not choices of the question.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unknown_choice_ids: Vec<ChoiceId>,
}

/// Checks `submitted` against the question's answer key.
///
/// Duplicate identifiers collapse and identifiers are normalized before
/// comparison, so `["A", "a "]` is the same submission as `["a"]`.
///
/// # Examples
///
/// ```
/// use quizbot_core::{matcher, ChoiceId, Question};
///
/// let q = Question::new("Pick two", ["x", "y", "z"], &["a", "c"], "x and z").unwrap();
///
/// assert!(!matcher::evaluate(&q, &[ChoiceId::new("a")]).correct);
/// assert!(matcher::evaluate(&q, &[ChoiceId::new("a"), ChoiceId::new("c")]).correct);
/// assert!(!matcher::evaluate(&q, &[ChoiceId::new("a"), ChoiceId::new("b"), ChoiceId::new("c")]).correct);
/// ```
#[must_use]
pub fn evaluate(question: &Question, submitted: &[ChoiceId]) -> Evaluation {
    let selected: BTreeSet<ChoiceId> = submitted
        .iter()
        .map(|id| ChoiceId::new(id.as_str()))
        .collect();

    let unknown_choice_ids: Vec<ChoiceId> = selected
        .iter()
        .filter(|id| !question.has_choice(id))
        .cloned()
        .collect();

    if !unknown_choice_ids.is_empty() {
        tracing::warn!(
            unknown = ?unknown_choice_ids,
            "Submission references choices that do not exist; scoring as incorrect"
        );
    }

    let correct = unknown_choice_ids.is_empty()
        && !selected.is_empty()
        && selected == question.answer_key;

    Evaluation {
        correct,
        correct_choice_ids: question.answer_key.iter().cloned().collect(),
        explanation: question.explanation.clone(),
        unknown_choice_ids,
    }
}
