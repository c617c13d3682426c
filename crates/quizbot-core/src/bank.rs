//! Question bank loading and sampling.
//!
//! The bank is a JSON document keyed by exam-set name. Each set maps the
//! question text to its answer key and explanation:
//!
//! ```json
//! {
//!   "practice_exam_a": {
//!     "1. Which service stores objects?\nA. EC2\nB. S3\nC. RDS": {
//!       "answer": "B",
//!       "explanation": "S3 is object storage."
//!     },
//!     "2. Which are compute services?": {
//!       "choices": ["Lambda", "S3", "EC2"],
//!       "answer": ["A", "C"],
//!       "explanation": "Lambda and EC2 run code."
//!     }
//!   }
//! }
//! ```
//!
//! Entries with an explicit `choices` list are preferred. Entries without one
//! fall back to the legacy layout where the choices are the lines that follow
//! the question text.
//!
//! # Example
//!
//! ```
//! use quizbot_core::QuestionBank;
//!
//! let bank = QuestionBank::from_json(r#"{
//!     "basics": {
//!         "Pick the vowel": {
//!             "choices": ["b", "e", "k"],
//!             "answer": "B",
//!             "explanation": "Only 'e' is a vowel."
//!         }
//!     }
//! }"#).unwrap();
//!
//! assert_eq!(bank.question_count(), 1);
//! assert_eq!(bank.set_names(), vec!["basics"]);
//! ```

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{QuizError, Result};

/// Maximum number of choices a question may have (one per letter).
pub const MAX_CHOICES: usize = 26;

/// Leading question numbering such as `"12. "`.
static NUMBER_PREFIX: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^\s*\d+\.\s+").ok());

/// Leading choice label such as `"A. "` or `"b) "`.
static CHOICE_LABEL: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^\s*[A-Za-z][.)]\s+").ok());

/// The label list at the start of an answer field: `"B"`, `"A, C"`,
/// `"B. because ..."`.
static ANSWER_LABELS: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z](?:\s*,\s*[A-Za-z])*)\s*(?:[.)]|\s|$)").ok()
});

// ============================================================================
// ChoiceId / Choice
// ============================================================================

/// Identifier of a choice within a question: a lowercase letter.
///
/// Identifiers are assigned by position (`a` for the first choice) and
/// compared after trimming and lowercasing, so `" B "` and `"b"` are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChoiceId(String);

impl ChoiceId {
    /// Creates a normalized identifier from raw input.
    #[must_use]
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_lowercase())
    }

    /// Returns the identifier for the choice at `index`, or `None` if the
    /// index is beyond [`MAX_CHOICES`].
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        let offset = u8::try_from(index).ok().filter(|i| usize::from(*i) < MAX_CHOICES)?;
        Some(Self(char::from(b'a' + offset).to_string()))
    }

    /// Returns the position of this identifier, or `None` if it is not a
    /// single letter.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        let mut chars = self.0.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_lowercase() => Some(usize::from(c as u8 - b'a')),
            _ => None,
        }
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the uppercase label shown to users (`"A"`).
    #[must_use]
    pub fn label(&self) -> String {
        self.0.to_uppercase()
    }
}

impl fmt::Display for ChoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChoiceId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// A single selectable choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// Identifier submitted when this choice is selected.
    pub id: ChoiceId,
    /// Text shown to the user.
    pub text: String,
}

// ============================================================================
// Question
// ============================================================================

/// A multiple-choice question. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// The question prompt. Unique within its exam set.
    pub text: String,
    /// Choices in display order.
    pub choices: Vec<Choice>,
    /// Identifiers of the correct choices. Never empty.
    pub answer_key: BTreeSet<ChoiceId>,
    /// Explanation shown after the question is answered.
    pub explanation: String,
}

impl Question {
    /// Creates a question from a prompt, choice texts, answer labels and an
    /// explanation, validating that the key names existing choices.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::MalformedBank` if there are fewer than two or more
    /// than [`MAX_CHOICES`] choices, if the key is empty, or if it names a
    /// choice that does not exist.
    pub fn new<I, S>(
        text: impl Into<String>,
        choices: I,
        answer_key: &[&str],
        explanation: impl Into<String>,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let text = text.into();
        let choice_texts: Vec<String> = choices.into_iter().map(Into::into).collect();
        let key = answer_key.iter().map(|label| ChoiceId::new(label)).collect();
        build_question(text, choice_texts, key, explanation.into())
            .map_err(|message| QuizError::MalformedBank {
                exam_set: None,
                question: None,
                message,
            })
    }

    /// Returns `true` if the answer key names more than one choice.
    #[must_use]
    pub fn is_multi_answer(&self) -> bool {
        self.answer_key.len() > 1
    }

    /// Returns `true` if `id` names one of this question's choices.
    #[must_use]
    pub fn has_choice(&self, id: &ChoiceId) -> bool {
        self.choices.iter().any(|choice| &choice.id == id)
    }
}

/// Builds and validates a question, returning a bare message on failure so
/// callers can attach their own location.
fn build_question(
    text: String,
    choice_texts: Vec<String>,
    answer_key: BTreeSet<ChoiceId>,
    explanation: String,
) -> std::result::Result<Question, String> {
    if text.trim().is_empty() {
        return Err("question text is empty".to_string());
    }
    if choice_texts.len() < 2 {
        return Err(format!(
            "expected at least 2 choices, found {}",
            choice_texts.len()
        ));
    }
    if choice_texts.len() > MAX_CHOICES {
        return Err(format!(
            "expected at most {MAX_CHOICES} choices, found {}",
            choice_texts.len()
        ));
    }
    if answer_key.is_empty() {
        return Err("answer does not name any choice".to_string());
    }

    let choices: Vec<Choice> = choice_texts
        .into_iter()
        .enumerate()
        .filter_map(|(index, text)| {
            ChoiceId::from_index(index).map(|id| Choice {
                id,
                text: text.trim().to_string(),
            })
        })
        .collect();

    for id in &answer_key {
        let known = id.index().is_some_and(|index| index < choices.len());
        if !known {
            return Err(format!(
                "answer names choice '{}' but the question has {} choices",
                id.label(),
                choices.len()
            ));
        }
    }

    Ok(Question {
        text: text.trim().to_string(),
        choices,
        answer_key,
        explanation: explanation.trim().to_string(),
    })
}

// ============================================================================
// Raw document types
// ============================================================================

/// The `answer` field as it appears in the source document.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAnswer {
    /// `"B"`, `"A, C"` or `"B. explanation"`.
    Text(String),
    /// `["A", "C"]`.
    List(Vec<String>),
}

/// One question entry as it appears in the source document.
#[derive(Debug, Deserialize)]
struct RawEntry {
    answer: Option<RawAnswer>,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    choices: Option<Vec<String>>,
}

type RawBank = BTreeMap<String, BTreeMap<String, RawEntry>>;

/// Splits a bank key into the prompt and the choice texts.
///
/// With explicit choices the whole key (minus numbering) is the prompt.
/// Otherwise the first non-empty line is the prompt and each following
/// non-empty line is a choice with its leading label removed.
fn split_question_text(raw: &str, explicit_choices: Option<Vec<String>>) -> (String, Vec<String>) {
    let without_number = strip_prefix(&NUMBER_PREFIX, raw);

    if let Some(choices) = explicit_choices {
        return (without_number.trim().to_string(), choices);
    }

    let mut lines = without_number
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty());
    let prompt = lines.next().unwrap_or_default().to_string();
    let choices = lines
        .map(|line| strip_prefix(&CHOICE_LABEL, line).trim().to_string())
        .collect();
    (prompt, choices)
}

fn strip_prefix<'a>(pattern: &Lazy<Option<Regex>>, text: &'a str) -> &'a str {
    pattern
        .as_ref()
        .and_then(|re| re.find(text))
        .map_or(text, |m| &text[m.end()..])
}

/// Parses the answer labels out of the raw `answer` field.
fn parse_answer_key(answer: &RawAnswer) -> std::result::Result<BTreeSet<ChoiceId>, String> {
    let labels: Vec<String> = match answer {
        RawAnswer::List(items) => items.clone(),
        RawAnswer::Text(text) => {
            let captured = ANSWER_LABELS
                .as_ref()
                .and_then(|re| re.captures(text))
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
                .ok_or_else(|| format!("cannot read answer labels from '{text}'"))?;
            captured.split(',').map(ToString::to_string).collect()
        }
    };

    let mut key = BTreeSet::new();
    for label in labels {
        let id = ChoiceId::new(&label);
        if id.index().is_none() {
            return Err(format!("answer label '{label}' is not a single letter"));
        }
        key.insert(id);
    }
    Ok(key)
}

// ============================================================================
// ExamSet
// ============================================================================

/// A named collection of questions.
#[derive(Debug, Clone)]
pub struct ExamSet {
    name: String,
    questions: Vec<Arc<Question>>,
}

impl ExamSet {
    /// Creates an exam set, rejecting duplicate prompts.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::MalformedBank` if two questions share a prompt.
    pub fn new(name: impl Into<String>, questions: Vec<Question>) -> Result<Self> {
        let name = name.into();
        let mut seen = HashSet::new();
        for question in &questions {
            if !seen.insert(question.text.as_str()) {
                return Err(QuizError::malformed_question(
                    &name,
                    &question.text,
                    "duplicate question text in exam set",
                ));
            }
        }
        Ok(Self {
            name,
            questions: questions.into_iter().map(Arc::new).collect(),
        })
    }

    /// Returns the set name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the questions in load order.
    #[must_use]
    pub fn questions(&self) -> &[Arc<Question>] {
        &self.questions
    }

    /// Returns the number of questions in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Returns `true` if the set has no questions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

// ============================================================================
// QuestionBank
// ============================================================================

/// All exam sets loaded at startup.
#[derive(Debug, Clone, Default)]
pub struct QuestionBank {
    sets: BTreeMap<String, ExamSet>,
}

impl QuestionBank {
    /// Loads the bank from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::BankRead` if the file cannot be read and
    /// `QuizError::MalformedBank` if its content is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| QuizError::bank_read(path, e.to_string()))?;
        let bank = Self::from_json(&contents)?;
        tracing::info!(
            path = %path.display(),
            sets = bank.sets.len(),
            questions = bank.question_count(),
            "Question bank loaded"
        );
        Ok(bank)
    }

    /// Parses the bank from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::MalformedBank` if the document is not a mapping of
    /// set name to question entries, or if any entry is invalid.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawBank = serde_json::from_str(json)
            .map_err(|e| QuizError::malformed(format!("invalid bank document: {e}")))?;

        let mut sets = Vec::with_capacity(raw.len());
        for (set_name, entries) in raw {
            if entries.is_empty() {
                return Err(QuizError::malformed_set(&set_name, "exam set has no questions"));
            }

            let mut questions = Vec::with_capacity(entries.len());
            for (raw_text, entry) in entries {
                let answer = entry.answer.as_ref().ok_or_else(|| {
                    QuizError::malformed_question(&set_name, &raw_text, "missing 'answer' field")
                })?;
                let key = parse_answer_key(answer)
                    .map_err(|message| QuizError::malformed_question(&set_name, &raw_text, message))?;
                let (prompt, choices) = split_question_text(&raw_text, entry.choices);
                let question = build_question(prompt, choices, key, entry.explanation)
                    .map_err(|message| QuizError::malformed_question(&set_name, &raw_text, message))?;
                questions.push(question);
            }

            sets.push(ExamSet::new(set_name, questions)?);
        }

        Ok(Self::from_sets(sets))
    }

    /// Builds a bank from already-validated exam sets.
    #[must_use]
    pub fn from_sets(sets: impl IntoIterator<Item = ExamSet>) -> Self {
        Self {
            sets: sets
                .into_iter()
                .map(|set| (set.name.clone(), set))
                .collect(),
        }
    }

    /// Returns the exam set names in sorted order.
    #[must_use]
    pub fn set_names(&self) -> Vec<&str> {
        self.sets.keys().map(String::as_str).collect()
    }

    /// Returns the named exam set.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ExamSet> {
        self.sets.get(name)
    }

    /// Returns the total number of questions across all sets.
    #[must_use]
    pub fn question_count(&self) -> usize {
        self.sets.values().map(ExamSet::len).sum()
    }

    /// Returns the number of questions available for `exam_set`, or for the
    /// combined pool when `None`.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::UnknownExamSet` if the named set does not exist.
    pub fn pool_size(&self, exam_set: Option<&str>) -> Result<usize> {
        Ok(self.pool(exam_set)?.len())
    }

    /// Draws `count` distinct questions uniformly at random.
    ///
    /// Draws from the named set, or from the union of all sets when
    /// `exam_set` is `None`. A `count` larger than the pool is clamped to the
    /// pool size.
    ///
    /// # Errors
    ///
    /// - `QuizError::InvalidQuestionCount` if `count` is zero.
    /// - `QuizError::UnknownExamSet` if the named set does not exist.
    /// - `QuizError::EmptyPool` if there are no questions to draw from.
    pub fn sample<R>(
        &self,
        exam_set: Option<&str>,
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<Arc<Question>>>
    where
        R: Rng + ?Sized,
    {
        if count == 0 {
            return Err(QuizError::InvalidQuestionCount { requested: count });
        }

        let pool = self.pool(exam_set)?;
        if pool.is_empty() {
            return Err(QuizError::empty_pool(exam_set));
        }

        let take = count.min(pool.len());
        if take < count {
            tracing::debug!(requested = count, available = pool.len(), "Clamped question count");
        }

        Ok(pool
            .choose_multiple(rng, take)
            .map(|question| Arc::clone(question))
            .collect())
    }

    fn pool(&self, exam_set: Option<&str>) -> Result<Vec<&Arc<Question>>> {
        match exam_set {
            Some(name) => self
                .sets
                .get(name)
                .map(|set| set.questions.iter().collect())
                .ok_or_else(|| {
                    QuizError::unknown_exam_set(
                        name,
                        self.set_names().into_iter().map(ToString::to_string).collect(),
                    )
                }),
            None => {
                // A prompt shared by several sets counts once; the first set
                // in name order wins.
                let mut seen = HashSet::new();
                Ok(self
                    .sets
                    .values()
                    .flat_map(|set| set.questions.iter())
                    .filter(|question| seen.insert(question.text.as_str()))
                    .collect())
            }
        }
    }
}
