//! End-to-end tests over real HTTP.
//!
//! Spawns the QuizBot server on an ephemeral port next to a stand-in for
//! Slack's `response_url` endpoint, then drives a quiz with signed requests.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::routing::post;
use axum::{Json, Router};
use quizbot_core::QuestionBank;
use quizbot_server::{
    create_router, AppState, ResponseSender, ServerConfig, SignatureVerifier, SlackResponder,
    SIGNATURE_HEADER, TIMESTAMP_HEADER,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

const SECRET: &str = "integration-signing-secret";

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

/// Messages received by the fake `response_url` endpoint.
type Inbox = Arc<Mutex<Vec<Value>>>;

struct TestServers {
    quizbot: String,
    response_url: String,
    inbox: Inbox,
    bank: Arc<QuestionBank>,
    client: reqwest::Client,
}

/// Starts a server that records every JSON body posted to `/hook`.
async fn spawn_hook_server() -> (String, Inbox) {
    let inbox: Inbox = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&inbox);
    let app = Router::new().route(
        "/hook",
        post(move |Json(body): Json<Value>| {
            let recorded = Arc::clone(&recorded);
            async move {
                recorded.lock().expect("inbox poisoned").push(body);
                "ok"
            }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind hook server");
    let addr = listener.local_addr().expect("Failed to get hook address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Hook server failed");
    });

    (format!("http://{addr}/hook"), inbox)
}

async fn spawn_test_servers() -> TestServers {
    let (response_url, inbox) = spawn_hook_server().await;

    let config = ServerConfig::load_from_file(&fixture_path().join("quizbot.json"))
        .expect("Failed to load config");
    let bank = Arc::new(
        QuestionBank::load(fixture_path().join("qa_lookup.json")).expect("Failed to load bank"),
    );
    let responder: Arc<dyn ResponseSender> = Arc::new(
        SlackResponder::new(Duration::from_secs(config.delivery_timeout_secs))
            .expect("Failed to build responder"),
    );
    let state = AppState::new(config, Arc::clone(&bank), SECRET, responder);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind quizbot");
    let addr = listener.local_addr().expect("Failed to get quizbot address");
    tokio::spawn(async move {
        axum::serve(listener, create_router(state))
            .await
            .expect("QuizBot server failed");
    });

    TestServers {
        quizbot: format!("http://{addr}"),
        response_url,
        inbox,
        bank,
        client: reqwest::Client::new(),
    }
}

impl TestServers {
    async fn post_signed(&self, path: &str, body: String) -> reqwest::Response {
        let timestamp = chrono::Utc::now().timestamp();
        let signature = SignatureVerifier::new(SECRET, 300).sign(timestamp, body.as_bytes());
        self.client
            .post(format!("{}{path}", self.quizbot))
            .header("content-type", "application/x-www-form-urlencoded")
            .header(TIMESTAMP_HEADER, timestamp.to_string())
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await
            .expect("Request to quizbot failed")
    }

    async fn slash_command(&self, user: &str, text: &str) -> Value {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("command", "/start_quiz")
            .append_pair("user_id", user)
            .append_pair("channel_id", "C42")
            .append_pair("text", text)
            .append_pair("response_url", &self.response_url)
            .finish();
        let response = self.post_signed("/start_quiz", body).await;
        assert_eq!(response.status(), 200);
        response.json().await.expect("Reply was not JSON")
    }

    async fn submit(&self, user: &str, checkpoint: &str, choices: &[String]) -> u16 {
        let selected: Vec<Value> = choices.iter().map(|c| json!({ "value": c })).collect();
        let payload = json!({
            "type": "block_actions",
            "user": { "id": user },
            "channel": { "id": "C42" },
            "response_url": self.response_url,
            "actions": [{ "action_id": "submit_answer", "block_id": "answer_block", "value": checkpoint }],
            "state": { "values": { "answer_block": { "select_answer_1a2b3c4d": { "selected_options": selected } } } }
        });
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("payload", &payload.to_string())
            .finish();
        self.post_signed("/slack/events", body).await.status().as_u16()
    }

    fn last_delivered(&self) -> Value {
        self.inbox
            .lock()
            .expect("inbox poisoned")
            .last()
            .cloned()
            .expect("Nothing was delivered to response_url")
    }

    fn delivered_count(&self) -> usize {
        self.inbox.lock().expect("inbox poisoned").len()
    }

    /// Waits for the background deliveries to reach the hook server.
    async fn wait_for_deliveries(&self, count: usize) {
        for _ in 0..100 {
            if self.delivered_count() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(self.delivered_count(), count, "deliveries did not arrive");
    }

    /// Returns the correct choice ids for the question shown in `message`.
    fn correct_choices(&self, message: &Value) -> Vec<String> {
        let text = message["text"].as_str().expect("message has no text");
        let (_, prompt) = text.split_once(": ").expect("text has no heading");
        self.bank
            .set_names()
            .into_iter()
            .filter_map(|name| self.bank.get(name))
            .flat_map(|set| set.questions().iter())
            .find(|question| question.text == prompt)
            .map(|question| {
                question
                    .answer_key
                    .iter()
                    .map(|id| id.as_str().to_string())
                    .collect()
            })
            .expect("Shown question is not in the bank")
    }
}

fn checkpoint_of(message: &Value) -> String {
    message["blocks"]
        .as_array()
        .and_then(|blocks| blocks.last())
        .and_then(|actions| actions["elements"][1]["value"].as_str())
        .expect("message has no submit button")
        .to_string()
}

#[tokio::test]
async fn test_health_over_http() {
    let servers = spawn_test_servers().await;
    let health: Value = servers
        .client
        .get(format!("{}/health", servers.quizbot))
        .send()
        .await
        .expect("Health request failed")
        .json()
        .await
        .expect("Health was not JSON");

    assert_eq!(health["status"], "ok");
    assert_eq!(health["questionCount"], 5);
    assert_eq!(health["activeSessions"], 0);
}

#[tokio::test]
async fn test_bad_signature_is_rejected() {
    let servers = spawn_test_servers().await;
    let response = servers
        .client
        .post(format!("{}/start_quiz", servers.quizbot))
        .header("content-type", "application/x-www-form-urlencoded")
        .header(TIMESTAMP_HEADER, chrono::Utc::now().timestamp().to_string())
        .header(SIGNATURE_HEADER, "v0=deadbeef")
        .body("command=%2Fstart_quiz&user_id=U1&channel_id=C42&text=")
        .send()
        .await
        .expect("Request failed");

    assert_eq!(response.status(), 403);
    assert_eq!(servers.delivered_count(), 0);
}

#[tokio::test]
async fn test_complete_quiz_over_http() {
    let servers = spawn_test_servers().await;

    let first = servers.slash_command("U1", "3 practice_exam_a").await;
    assert_eq!(first["response_type"], "in_channel");
    assert!(first["text"]
        .as_str()
        .is_some_and(|t| t.starts_with("Question 1/3")));

    let mut message = first;
    for round in 0..3 {
        let choices = if round == 0 {
            vec!["d".to_string()]
        } else {
            servers.correct_choices(&message)
        };
        let status = servers
            .submit("U1", &checkpoint_of(&message), &choices)
            .await;
        assert_eq!(status, 200);
        servers.wait_for_deliveries(round + 1).await;
        message = servers.last_delivered();
    }

    assert_eq!(message["replace_original"], true);
    assert!(message["blocks"].is_null());
    let text = message["text"].as_str().expect("final text");
    assert!(text.starts_with("That's correct!"));
    assert!(text.ends_with("Quiz completed! Your score is 2/3."));

    let health: Value = servers
        .client
        .get(format!("{}/health", servers.quizbot))
        .send()
        .await
        .expect("Health request failed")
        .json()
        .await
        .expect("Health was not JSON");
    assert_eq!(health["activeSessions"], 0);
}

#[tokio::test]
async fn test_double_submit_gets_stale_notice() {
    let servers = spawn_test_servers().await;
    let first = servers.slash_command("U2", "2 practice_exam_b").await;
    let checkpoint = checkpoint_of(&first);
    let choices = servers.correct_choices(&first);

    assert_eq!(servers.submit("U2", &checkpoint, &choices).await, 200);
    servers.wait_for_deliveries(1).await;
    let second = servers.last_delivered();
    assert!(second["text"]
        .as_str()
        .is_some_and(|t| t.starts_with("Question 2/2")));

    assert_eq!(servers.submit("U2", &checkpoint, &choices).await, 200);
    servers.wait_for_deliveries(2).await;
    let notice = servers.last_delivered();
    assert_eq!(notice["response_type"], "ephemeral");
    assert!(notice["text"]
        .as_str()
        .is_some_and(|t| t.contains("already been answered")));
    assert_eq!(servers.delivered_count(), 2);
}

#[tokio::test]
async fn test_users_in_one_channel_have_separate_quizzes() {
    let servers = spawn_test_servers().await;
    let alice = servers.slash_command("UA", "2 practice_exam_a").await;
    let bob = servers.slash_command("UB", "1 practice_exam_b").await;

    // Bob answers with Alice's checkpoint: his own session does not match it.
    let status = servers
        .submit("UB", &checkpoint_of(&alice), &["a".to_string()])
        .await;
    assert_eq!(status, 200);
    servers.wait_for_deliveries(1).await;
    let notice = servers.last_delivered();
    assert_eq!(notice["response_type"], "ephemeral");

    let choices = servers.correct_choices(&bob);
    servers.submit("UB", &checkpoint_of(&bob), &choices).await;
    servers.wait_for_deliveries(2).await;
    assert!(servers.last_delivered()["text"]
        .as_str()
        .is_some_and(|t| t.ends_with("Your score is 1/1.")));

    let stop = servers.slash_command("UA", "stop").await;
    assert_eq!(
        stop["text"],
        "Quiz stopped. You answered 0 of 0 questions correctly."
    );
}
