//! Slack request payloads.
//!
//! Only the fields QuizBot reads are modelled; everything else Slack sends is
//! ignored.

use std::collections::HashMap;

use quizbot_core::{Checkpoint, ChoiceId, SessionKey};
use serde::Deserialize;

/// Prefix of the checkbox element's action id.
pub const SELECT_ANSWER_ACTION: &str = "select_answer";

/// Action id of the submit button.
pub const SUBMIT_ANSWER_ACTION: &str = "submit_answer";

// ============================================================================
// Slash commands
// ============================================================================

/// Form body of a slash command invocation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlashCommand {
    /// The command that was typed, e.g. `/start_quiz`.
    #[serde(default)]
    pub command: String,
    /// Everything typed after the command.
    #[serde(default)]
    pub text: String,
    /// User who ran the command.
    pub user_id: String,
    /// Channel the command was run in.
    #[serde(default)]
    pub channel_id: String,
    /// URL for delayed responses.
    #[serde(default)]
    pub response_url: String,
}

impl SlashCommand {
    /// Returns the session key of the invoking user.
    #[must_use]
    pub fn session_key(&self) -> SessionKey {
        SessionKey::for_user(&self.channel_id, &self.user_id)
    }
}

/// What a slash command asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandAction {
    /// Start a quiz. `None` fields fall back to configured defaults.
    Start {
        /// Requested number of questions.
        count: Option<usize>,
        /// Requested exam set.
        exam_set: Option<String>,
    },
    /// Abandon the quiz in progress.
    Stop,
    /// List the exam sets.
    ListSets,
    /// Show usage.
    Help,
}

impl CommandAction {
    /// Parses the text typed after the slash command.
    ///
    /// ```text
    /// (empty)        start with defaults
    /// 10             10 questions
    /// 10 exam_a      10 questions from exam_a (either order)
    /// exam_a         default count from exam_a
    /// stop | cancel  abandon
    /// sets           list exam sets
    /// help           usage
    /// ```
    ///
    /// # Examples
    ///
    /// ```
    /// use quizbot_server::slack::CommandAction;
    ///
    /// assert_eq!(
    ///     CommandAction::parse("exam_a 3"),
    ///     CommandAction::Start { count: Some(3), exam_set: Some("exam_a".into()) }
    /// );
    /// assert_eq!(CommandAction::parse("3 4"), CommandAction::Help);
    /// ```
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        match tokens.as_slice() {
            [] => Self::Start {
                count: None,
                exam_set: None,
            },
            [word] => match word.to_lowercase().as_str() {
                "stop" | "cancel" => Self::Stop,
                "sets" => Self::ListSets,
                "help" => Self::Help,
                _ => match Token::classify(word) {
                    Token::Count(count) => Self::Start {
                        count: Some(count),
                        exam_set: None,
                    },
                    Token::Name(name) => Self::Start {
                        count: None,
                        exam_set: Some(name.to_string()),
                    },
                    Token::Invalid => Self::Help,
                },
            },
            [first, second] => match (Token::classify(first), Token::classify(second)) {
                (Token::Count(count), Token::Name(name))
                | (Token::Name(name), Token::Count(count)) => Self::Start {
                    count: Some(count),
                    exam_set: Some(name.to_string()),
                },
                _ => Self::Help,
            },
            _ => Self::Help,
        }
    }
}

enum Token<'a> {
    Count(usize),
    Name(&'a str),
    Invalid,
}

impl<'a> Token<'a> {
    fn classify(word: &'a str) -> Self {
        if let Ok(count) = word.parse() {
            Self::Count(count)
        } else if word.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '+') {
            Self::Invalid
        } else {
            Self::Name(word)
        }
    }
}

/// Usage text for the slash command.
#[must_use]
pub fn usage(command: &str) -> String {
    let command = if command.is_empty() { "/start_quiz" } else { command };
    format!(
        "Usage:\n\
         • `{command}` start a quiz with the default number of questions\n\
         • `{command} 10` start a 10-question quiz\n\
         • `{command} 10 <exam set>` draw the questions from one exam set\n\
         • `{command} sets` list the exam sets\n\
         • `{command} stop` abandon the current quiz"
    )
}

// ============================================================================
// Interactions
// ============================================================================

/// Form body of an interactivity request.
#[derive(Debug, Clone, Deserialize)]
pub struct InteractionForm {
    /// JSON-encoded [`InteractionPayload`].
    pub payload: String,
}

/// An interactivity payload. Only `block_actions` payloads are handled.
#[derive(Debug, Clone, Deserialize)]
pub struct InteractionPayload {
    /// Payload type, e.g. `block_actions`.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// User who interacted.
    pub user: SlackUser,
    /// Channel of the message that was interacted with.
    #[serde(default)]
    pub channel: Option<SlackChannel>,
    /// Actions taken. Slack sends exactly one for block actions.
    #[serde(default)]
    pub actions: Vec<BlockAction>,
    /// Values of the message's input elements.
    #[serde(default)]
    pub state: Option<BlockState>,
    /// URL for replacing the message.
    #[serde(default)]
    pub response_url: String,
}

/// A Slack user reference.
#[derive(Debug, Clone, Deserialize)]
pub struct SlackUser {
    /// User id.
    pub id: String,
}

/// A Slack channel reference.
#[derive(Debug, Clone, Deserialize)]
pub struct SlackChannel {
    /// Channel id.
    pub id: String,
}

/// One interactive action.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockAction {
    /// Action id of the element.
    pub action_id: String,
    /// Block id of the containing block.
    #[serde(default)]
    pub block_id: String,
    /// Button value.
    #[serde(default)]
    pub value: Option<String>,
    /// Selected options, for checkbox actions.
    #[serde(default)]
    pub selected_options: Vec<SelectedOption>,
}

/// Input state of a message, keyed by block id then action id.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockState {
    /// Element values.
    #[serde(default)]
    pub values: HashMap<String, HashMap<String, ElementState>>,
}

/// Current value of one input element.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ElementState {
    /// Selected options, for checkboxes.
    #[serde(default)]
    pub selected_options: Vec<SelectedOption>,
}

/// A selected checkbox option.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectedOption {
    /// The option's value: a choice id.
    pub value: String,
}

/// What an interaction asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    /// A checkbox was toggled. Nothing to do until submit.
    Select,
    /// The submit button was pressed.
    Submit {
        /// Checkpoint carried by the button, if it parsed.
        checkpoint: Option<Checkpoint>,
        /// Selected choices read from the message state.
        choices: Vec<ChoiceId>,
    },
    /// Anything else.
    Unknown(String),
}

impl InteractionPayload {
    /// Parses the JSON payload of an interactivity request.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if the payload is not a valid interaction.
    pub fn from_json(payload: &str) -> serde_json::Result<Self> {
        serde_json::from_str(payload)
    }

    /// Returns the session key of the interacting user.
    #[must_use]
    pub fn session_key(&self) -> SessionKey {
        let channel = self.channel.as_ref().map_or("", |channel| channel.id.as_str());
        SessionKey::for_user(channel, &self.user.id)
    }

    /// Classifies the first action of the payload.
    #[must_use]
    pub fn interaction(&self) -> Interaction {
        let Some(action) = self.actions.first() else {
            return Interaction::Unknown(String::new());
        };

        if action.action_id.starts_with(SELECT_ANSWER_ACTION) {
            Interaction::Select
        } else if action.action_id == SUBMIT_ANSWER_ACTION {
            Interaction::Submit {
                checkpoint: action.value.as_deref().and_then(Checkpoint::decode),
                choices: self.selected_choices(),
            }
        } else {
            Interaction::Unknown(action.action_id.clone())
        }
    }

    /// Returns the choices selected in the message's answer checkboxes.
    #[must_use]
    pub fn selected_choices(&self) -> Vec<ChoiceId> {
        let Some(state) = &self.state else {
            return Vec::new();
        };
        state
            .values
            .values()
            .flat_map(HashMap::iter)
            .filter(|(action_id, _)| action_id.starts_with(SELECT_ANSWER_ACTION))
            .flat_map(|(_, element)| &element.selected_options)
            .map(|option| ChoiceId::new(&option.value))
            .collect()
    }
}
