//! Slack request signing.
//!
//! Slack signs every request with `v0=` followed by the hex HMAC-SHA256 of
//! `v0:{timestamp}:{body}`, keyed with the app's signing secret. See
//! <https://api.slack.com/authentication/verifying-requests-from-slack>.

use axum::http::HeaderMap;
use ring::hmac;

use crate::error::SignatureError;

/// Header carrying the request timestamp in Unix seconds.
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

/// Header carrying the request signature.
pub const SIGNATURE_HEADER: &str = "x-slack-signature";

const VERSION: &str = "v0";

/// Verifies (and, for tests and tooling, produces) Slack request signatures.
#[derive(Clone)]
pub struct SignatureVerifier {
    key: hmac::Key,
    max_age_secs: u64,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("max_age_secs", &self.max_age_secs)
            .finish_non_exhaustive()
    }
}

impl SignatureVerifier {
    /// Creates a verifier for `signing_secret`.
    #[must_use]
    pub fn new(signing_secret: &str, max_age_secs: u64) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, signing_secret.as_bytes()),
            max_age_secs,
        }
    }

    /// Returns the signature Slack would send for `body` at `timestamp`.
    ///
    /// # Examples
    ///
    /// ```
    /// use quizbot_server::SignatureVerifier;
    ///
    /// let verifier = SignatureVerifier::new("secret", 300);
    /// let signature = verifier.sign(1_700_000_000, b"text=3");
    /// assert!(signature.starts_with("v0="));
    /// assert!(verifier.verify_at("1700000000", &signature, b"text=3", 1_700_000_010).is_ok());
    /// ```
    #[must_use]
    pub fn sign(&self, timestamp: i64, body: &[u8]) -> String {
        let tag = hmac::sign(&self.key, &base_string(&timestamp.to_string(), body));
        format!("{VERSION}={}", hex::encode(tag.as_ref()))
    }

    /// Verifies the signature headers of a request against its raw body.
    ///
    /// # Errors
    ///
    /// Returns the [`SignatureError`] describing why the request is rejected.
    pub fn verify(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), SignatureError> {
        let timestamp = header(headers, TIMESTAMP_HEADER)?;
        let signature = header(headers, SIGNATURE_HEADER)?;
        self.verify_at(timestamp, signature, body, chrono::Utc::now().timestamp())
    }

    /// Verifies a signature as of `now` (Unix seconds).
    ///
    /// # Errors
    ///
    /// Returns the [`SignatureError`] describing why the request is rejected.
    pub fn verify_at(
        &self,
        timestamp: &str,
        signature: &str,
        body: &[u8],
        now: i64,
    ) -> Result<(), SignatureError> {
        let sent_at: i64 = timestamp
            .trim()
            .parse()
            .map_err(|_| SignatureError::InvalidTimestamp(timestamp.to_string()))?;

        let age_secs = now.abs_diff(sent_at);
        if age_secs > self.max_age_secs {
            return Err(SignatureError::Expired {
                age_secs,
                max_age_secs: self.max_age_secs,
            });
        }

        let provided = signature
            .strip_prefix("v0=")
            .and_then(|digest| hex::decode(digest).ok())
            .ok_or(SignatureError::Mismatch)?;

        hmac::verify(&self.key, &base_string(timestamp.trim(), body), &provided)
            .map_err(|_| SignatureError::Mismatch)
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, SignatureError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or(SignatureError::MissingHeader(name))
}

fn base_string(timestamp: &str, body: &[u8]) -> Vec<u8> {
    let mut base = Vec::with_capacity(VERSION.len() + timestamp.len() + body.len() + 2);
    base.extend_from_slice(VERSION.as_bytes());
    base.push(b':');
    base.extend_from_slice(timestamp.as_bytes());
    base.push(b':');
    base.extend_from_slice(body);
    base
}
