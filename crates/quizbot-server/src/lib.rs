//! QuizBot Slack server
//!
//! Webhook endpoints for the `/start_quiz` slash command and Slack
//! interactivity, request signature verification, Block Kit rendering and
//! delivery to `response_url`.

pub mod api;
pub mod blocks;
pub mod config;
pub mod error;
pub mod responder;
pub mod signature;
pub mod slack;

pub use api::{create_router, AppState, ErrorResponse, HealthResponse};
pub use blocks::{validate_bank, SlackMessage, MAX_CHECKBOX_OPTIONS};
pub use config::{ResponseType, ServerConfig, CONFIG_FILE_NAME};
pub use error::{Result, ServerError, SignatureError};
pub use responder::{
    RecordingResponder, ResponseSender, SlackResponder, DEFAULT_RECORDING_LIMIT,
};
pub use signature::{SignatureVerifier, SIGNATURE_HEADER, TIMESTAMP_HEADER};
pub use slack::{CommandAction, Interaction, InteractionPayload, SlashCommand};
