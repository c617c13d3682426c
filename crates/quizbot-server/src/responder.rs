//! Delivery of messages to Slack's `response_url`.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};

use crate::blocks::SlackMessage;
use crate::error::{Result, ServerError};

/// Posts messages to a Slack `response_url`.
pub trait ResponseSender: Send + Sync {
    /// Posts `message` to `response_url`.
    fn send<'a>(
        &'a self,
        response_url: &'a str,
        message: &'a SlackMessage,
    ) -> BoxFuture<'a, Result<()>>;
}

/// [`ResponseSender`] backed by an HTTP client.
#[derive(Debug, Clone)]
pub struct SlackResponder {
    client: reqwest::Client,
}

impl SlackResponder {
    /// Creates a responder whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Delivery` if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServerError::delivery(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl ResponseSender for SlackResponder {
    fn send<'a>(
        &'a self,
        response_url: &'a str,
        message: &'a SlackMessage,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            if response_url.is_empty() {
                return Err(ServerError::delivery("request has no response_url"));
            }

            let response = self
                .client
                .post(response_url)
                .json(message)
                .send()
                .await
                .map_err(|e| ServerError::delivery(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ServerError::delivery(format!("Slack returned {status}: {body}")));
            }
            Ok(())
        }
        .boxed()
    }
}

/// Number of messages a [`RecordingResponder`] keeps by default.
pub const DEFAULT_RECORDING_LIMIT: usize = 100;

/// [`ResponseSender`] that keeps the most recent messages in memory instead
/// of sending them. Used by tests and local dry runs.
#[derive(Debug)]
pub struct RecordingResponder {
    sent: Mutex<VecDeque<(String, SlackMessage)>>,
    limit: usize,
}

impl Default for RecordingResponder {
    fn default() -> Self {
        Self::with_limit(DEFAULT_RECORDING_LIMIT)
    }
}

impl RecordingResponder {
    /// Creates an empty recorder keeping [`DEFAULT_RECORDING_LIMIT`] messages.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty recorder keeping at most `limit` messages. Older
    /// messages are dropped first.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            sent: Mutex::new(VecDeque::with_capacity(limit.min(DEFAULT_RECORDING_LIMIT))),
            limit: limit.max(1),
        }
    }

    /// Returns the retained `(response_url, message)` pairs, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<(String, SlackMessage)> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Returns the last message sent.
    #[must_use]
    pub fn last(&self) -> Option<SlackMessage> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .back()
            .map(|(_, message)| message.clone())
    }
}

impl ResponseSender for RecordingResponder {
    fn send<'a>(
        &'a self,
        response_url: &'a str,
        message: &'a SlackMessage,
    ) -> BoxFuture<'a, Result<()>> {
        tracing::info!(response_url, text = %message.text, "Recorded response");
        let mut sent = self.sent.lock().unwrap_or_else(PoisonError::into_inner);
        if sent.len() >= self.limit {
            sent.pop_front();
        }
        sent.push_back((response_url.to_string(), message.clone()));
        drop(sent);
        futures::future::ready(Ok(())).boxed()
    }
}
