//! HTTP endpoints for the Slack app.
//!
//! # Endpoints
//!
//! - `POST /start_quiz` - Slash command (form-encoded)
//! - `POST /slack/events` - Interactivity requests (form field `payload`)
//! - `GET /` - Liveness text
//! - `GET /health` - Session and bank counts as JSON
//!
//! Both `POST` routes require a valid Slack signature.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use quizbot_core::QuestionBank;
//! use quizbot_server::{create_router, AppState, RecordingResponder, ServerConfig};
//!
//! # async fn example() {
//! let bank = Arc::new(QuestionBank::load("qa_lookup.json").unwrap());
//! let state = AppState::new(
//!     ServerConfig::default(),
//!     bank,
//!     "signing-secret",
//!     Arc::new(RecordingResponder::new()),
//! );
//!
//! let router = create_router(state);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await.unwrap();
//! axum::serve(listener, router).await.unwrap();
//! # }
//! ```

use std::fmt::Write;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use quizbot_core::{
    InMemorySessionStore, QuestionBank, QuizController, QuizError, SessionStore, StartRequest,
    Submission,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::blocks::SlackMessage;
use crate::config::ServerConfig;
use crate::error::{ServerError, SignatureError};
use crate::responder::ResponseSender;
use crate::signature::SignatureVerifier;
use crate::slack::{usage, CommandAction, Interaction, InteractionForm, InteractionPayload, SlashCommand};

/// Largest request body accepted before signature verification.
const MAX_BODY_BYTES: usize = 64 * 1024;

// ============================================================================
// Response Types
// ============================================================================

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"ok"`.
    pub status: String,
    /// Number of quizzes in progress.
    pub active_sessions: usize,
    /// Number of questions in the bank.
    pub question_count: usize,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: ServerConfig,
    /// The quiz engine.
    pub controller: Arc<QuizController>,
    /// Verifies Slack request signatures.
    pub verifier: SignatureVerifier,
    /// Delivers interaction results to Slack.
    pub responder: Arc<dyn ResponseSender>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("controller", &self.controller)
            .field("verifier", &self.verifier)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Creates the state for a freshly loaded bank with no sessions.
    #[must_use]
    pub fn new(
        config: ServerConfig,
        bank: Arc<QuestionBank>,
        signing_secret: &str,
        responder: Arc<dyn ResponseSender>,
    ) -> Self {
        let controller = QuizController::new(bank, InMemorySessionStore::new());
        Self::with_controller(config, controller, signing_secret, responder)
    }

    /// Creates the state around an existing controller.
    #[must_use]
    pub fn with_controller(
        config: ServerConfig,
        controller: QuizController,
        signing_secret: &str,
        responder: Arc<dyn ResponseSender>,
    ) -> Self {
        let verifier = SignatureVerifier::new(signing_secret, config.max_request_age_secs);
        Self {
            config,
            controller: Arc::new(controller),
            verifier,
            responder,
        }
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Internal error type for API handlers.
#[derive(Debug)]
enum ApiError {
    /// Signature verification failed.
    Unauthorized(SignatureError),
    /// The request body could not be understood.
    BadRequest(String),
    /// Anything that is not the caller's fault.
    Internal(ServerError),
}

impl From<QuizError> for ApiError {
    fn from(err: QuizError) -> Self {
        Self::Internal(ServerError::Quiz(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized(err) => (StatusCode::FORBIDDEN, format!("Unauthorized: {err}")),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(err) => {
                tracing::error!(error = %err, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    let state = Arc::new(state);

    let slack_routes = Router::new()
        .route("/start_quiz", post(handle_start_quiz))
        .route("/slack/events", post(handle_slack_events))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            verify_signature,
        ));

    Router::new()
        .merge(slack_routes)
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Buffers the body, checks the Slack signature, and hands the request on
/// with the body restored.
async fn verify_signature(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read request body: {e}")))?;

    if let Err(err) = state.verifier.verify(&parts.headers, &bytes) {
        warn!(path = %parts.uri.path(), error = %err, "Rejected unsigned request");
        return Err(ApiError::Unauthorized(err));
    }

    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}

// ============================================================================
// Handlers
// ============================================================================

/// Handler for `GET /`.
async fn handle_index() -> &'static str {
    "QuizBot is running!"
}

/// Handler for `GET /health`.
async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        active_sessions: state.controller.store().len(),
        question_count: state.controller.bank().question_count(),
    })
}

/// Handler for `POST /start_quiz`.
///
/// The reply is returned inline, so Slack shows it in the channel the command
/// was run in.
async fn handle_start_quiz(
    State(state): State<Arc<AppState>>,
    Form(command): Form<SlashCommand>,
) -> Result<Json<SlackMessage>, ApiError> {
    let key = command.session_key();
    let action = CommandAction::parse(&command.text);
    info!(key = %key, text = %command.text, action = ?action, "Received slash command");

    let config = &state.config;
    let message = match action {
        CommandAction::Start { count, exam_set } => {
            let request = StartRequest {
                count: config.clamp_count(count.unwrap_or(config.default_question_count)),
                exam_set: exam_set.or_else(|| config.default_exam_set.clone()),
            };
            match state.controller.start(key, request) {
                Ok(instruction) => SlackMessage::from_instruction(&instruction)
                    .with_response_type(config.response_type),
                Err(err) => user_notice(err)?,
            }
        }
        CommandAction::Stop => match state.controller.abandon(&key) {
            Ok(score) => SlackMessage::text(format!(
                "Quiz stopped. You answered {} of {} questions correctly.",
                score.correct, score.total
            ))
            .with_response_type(config.response_type),
            Err(err) => user_notice(err)?,
        },
        CommandAction::ListSets => SlackMessage::notice(exam_set_listing(state.controller.bank())),
        CommandAction::Help => SlackMessage::notice(usage(&command.command)),
    };

    Ok(Json(message))
}

/// Handler for `POST /slack/events`.
///
/// Slack only needs a 200 here. The result of a submission is delivered to
/// the payload's `response_url`, replacing the question message.
async fn handle_slack_events(
    State(state): State<Arc<AppState>>,
    Form(form): Form<InteractionForm>,
) -> Result<StatusCode, ApiError> {
    let payload = InteractionPayload::from_json(&form.payload)
        .map_err(|e| ApiError::BadRequest(format!("Invalid interaction payload: {e}")))?;
    let key = payload.session_key();

    match payload.interaction() {
        Interaction::Select => {
            debug!(key = %key, "Answer selection changed");
        }
        Interaction::Unknown(action_id) => {
            debug!(key = %key, action_id = %action_id, kind = %payload.kind, "Ignoring interaction");
        }
        Interaction::Submit {
            checkpoint,
            choices,
        } => {
            info!(key = %key, selected = choices.len(), "Received answer");
            let submission = Submission {
                key,
                choices,
                checkpoint,
            };
            let message = match state.controller.answer(submission) {
                Ok(instruction) => SlackMessage::from_instruction(&instruction).replacing_original(),
                Err(err) => user_notice(err)?,
            };
            deliver(&state, payload.response_url.clone(), message);
        }
    }

    Ok(StatusCode::OK)
}

/// Turns a user-facing quiz error into an ephemeral notice. Other errors are
/// passed through as server failures.
fn user_notice(err: QuizError) -> Result<SlackMessage, ApiError> {
    if err.is_user_facing() {
        debug!(error = %err, "Reporting quiz error to user");
        Ok(SlackMessage::notice(err.user_message()))
    } else {
        Err(err.into())
    }
}

/// Sends `message` to `response_url` on a background task. Slack expects the
/// interaction to be acknowledged within 3 seconds, and the state change that
/// produced the message has already been committed. Failures are logged.
fn deliver(state: &AppState, response_url: String, message: SlackMessage) {
    let responder = Arc::clone(&state.responder);
    tokio::spawn(async move {
        if let Err(err) = responder.send(&response_url, &message).await {
            warn!(error = %err, "Failed to deliver quiz message");
        }
    });
}

fn exam_set_listing(bank: &QuestionBank) -> String {
    let names = bank.set_names();
    if names.is_empty() {
        return "No exam sets are loaded.".to_string();
    }

    let mut out = String::from("Available exam sets:");
    for name in names {
        let count = bank.get(name).map_or(0, |set| set.len());
        let _ = write!(out, "\n• `{name}` ({count} questions)");
    }
    out
}
