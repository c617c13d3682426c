//! Block Kit rendering of quiz messages.
//!
//! A question message is up to three blocks: feedback on the previous answer,
//! the question itself, and an actions block holding the answer checkboxes and
//! the submit button. The final message is plain text.

use std::fmt::Write;

use quizbot_core::{Choice, Feedback, QuestionBank, QuestionPrompt, RenderInstruction};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::ResponseType;
use crate::error::{Result, ServerError};
use crate::slack::{SELECT_ANSWER_ACTION, SUBMIT_ANSWER_ACTION};

/// Slack rejects checkbox option labels longer than this.
const MAX_OPTION_TEXT: usize = 75;

/// Slack rejects checkbox groups with more options than this.
pub const MAX_CHECKBOX_OPTIONS: usize = 10;

/// Checks that every question in `bank` fits in one checkbox group.
///
/// # Errors
///
/// Returns `ServerError::ConfigValidation` naming the first question with
/// more than [`MAX_CHECKBOX_OPTIONS`] choices.
pub fn validate_bank(bank: &QuestionBank) -> Result<()> {
    for name in bank.set_names() {
        let Some(set) = bank.get(name) else {
            continue;
        };
        if let Some(question) = set
            .questions()
            .iter()
            .find(|question| question.choices.len() > MAX_CHECKBOX_OPTIONS)
        {
            return Err(ServerError::config_validation(
                format!(
                    "question '{}' in exam set '{name}' has {} choices, but Slack shows at most {MAX_CHECKBOX_OPTIONS}",
                    question.text,
                    question.choices.len()
                ),
                format!("Split the question or trim its choices to {MAX_CHECKBOX_OPTIONS} or fewer"),
            ));
        }
    }
    Ok(())
}

/// A message body accepted both as a slash command response and by
/// `response_url`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlackMessage {
    /// Visibility of the message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_type: Option<ResponseType>,
    /// Replace the message the interaction came from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replace_original: Option<bool>,
    /// Fallback text, shown in notifications.
    pub text: String,
    /// Block Kit blocks.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<Value>,
}

impl SlackMessage {
    /// Creates a plain text message.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            response_type: None,
            replace_original: None,
            text: text.into(),
            blocks: Vec::new(),
        }
    }

    /// Creates a message only the requesting user sees.
    #[must_use]
    pub fn notice(text: impl Into<String>) -> Self {
        Self::text(text).with_response_type(ResponseType::Ephemeral)
    }

    /// Renders a quiz instruction.
    #[must_use]
    pub fn from_instruction(instruction: &RenderInstruction) -> Self {
        MessageBuilder::new(instruction).build()
    }

    /// Sets the visibility of the message.
    #[must_use]
    pub const fn with_response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = Some(response_type);
        self
    }

    /// Marks the message as a replacement for the one interacted with.
    #[must_use]
    pub const fn replacing_original(mut self) -> Self {
        self.replace_original = Some(true);
        self
    }
}

/// Builds the Slack message for one [`RenderInstruction`].
struct MessageBuilder<'a> {
    instruction: &'a RenderInstruction,
}

impl<'a> MessageBuilder<'a> {
    const fn new(instruction: &'a RenderInstruction) -> Self {
        Self { instruction }
    }

    fn build(&self) -> SlackMessage {
        match self.instruction {
            RenderInstruction::Question { feedback, prompt } => {
                let mut blocks = Vec::with_capacity(3);
                if let Some(feedback) = feedback {
                    blocks.push(section(&feedback_text(feedback)));
                }
                blocks.push(section(&question_text(prompt)));
                blocks.push(answer_block(&prompt.choices, &prompt.checkpoint.encode()));

                SlackMessage {
                    blocks,
                    ..SlackMessage::text(format!("{}: {}", prompt.heading(), prompt.text))
                }
            }
            RenderInstruction::Final { .. } => SlackMessage::text(self.instruction.to_plain_text()),
        }
    }
}

fn feedback_text(feedback: &Feedback) -> String {
    let mut out = String::new();
    if feedback.correct {
        let _ = writeln!(out, ":white_check_mark: That's correct!");
    } else {
        let _ = writeln!(
            out,
            ":x: That's incorrect. Correct answer: *{}*",
            feedback.correct_labels()
        );
    }
    if !feedback.explanation.is_empty() {
        let _ = write!(out, "*Explanation:* {}", escape_mrkdwn(&feedback.explanation));
    }
    out.trim_end().to_string()
}

fn question_text(prompt: &QuestionPrompt) -> String {
    format!("*{}:* {}", prompt.heading(), escape_mrkdwn(&prompt.text))
}

fn section(text: &str) -> Value {
    json!({
        "type": "section",
        "text": {"type": "mrkdwn", "text": text}
    })
}

/// Checkboxes and submit button. Block and action ids are fresh for every
/// message so Slack does not carry selections over to the next question.
fn answer_block(choices: &[Choice], checkpoint: &str) -> Value {
    let options: Vec<Value> = choices
        .iter()
        .map(|choice| {
            json!({
                "text": {
                    "type": "plain_text",
                    "text": option_label(choice),
                    "emoji": true
                },
                "value": choice.id.as_str()
            })
        })
        .collect();

    json!({
        "type": "actions",
        "block_id": unique_id("answer_block"),
        "elements": [
            {
                "type": "checkboxes",
                "action_id": unique_id(SELECT_ANSWER_ACTION),
                "options": options
            },
            {
                "type": "button",
                "text": {"type": "plain_text", "text": "Submit", "emoji": true},
                "style": "primary",
                "value": checkpoint,
                "action_id": SUBMIT_ANSWER_ACTION
            }
        ]
    })
}

fn option_label(choice: &Choice) -> String {
    let label = format!("{}. {}", choice.id.label(), choice.text);
    if label.chars().count() <= MAX_OPTION_TEXT {
        return label;
    }
    let mut truncated: String = label.chars().take(MAX_OPTION_TEXT - 1).collect();
    truncated.push('…');
    truncated
}

fn unique_id(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{prefix}_{}", &suffix[..8])
}

/// Escapes the three characters Slack's mrkdwn treats as control sequences.
fn escape_mrkdwn(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
