//! Expo push provider.
//!
//! [`ExpoPushProvider`] POSTs a JSON array of messages to the Expo push
//! endpoint and returns the per-message receipts from the `data` field of the
//! response. No retries: a failed batch is reported to the dispatcher, which
//! turns it into per-token error tickets.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::ACCEPT;
use serde::Deserialize;

use crate::message::PushMessage;
use crate::provider::{PushError, PushProvider};
use crate::ticket::ProviderReceipt;

/// Default Expo push endpoint.
pub const DEFAULT_PUSH_API_URL: &str = "https://exp.host/--/api/v2/push/send";

/// Expo accepts at most this many messages per request.
pub const EXPO_MAX_BATCH_SIZE: usize = 100;

/// Default HTTP timeout for a single batch request.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Token rule: `ExpoPushToken[...]` or the older `ExponentPushToken[...]`.
const TOKEN_PATTERN: &str = r"^Expo(nent)?PushToken\[[^\]]+\]$";

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(TOKEN_PATTERN).expect("valid regex"));

/// Whether `token` has the Expo push token format.
pub fn is_expo_push_token(token: &str) -> bool {
    TOKEN_RE.is_match(token)
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Expo provider settings.
#[derive(Debug, Clone)]
pub struct ExpoConfig {
    pub api_url: String,
    /// Optional access token sent as a bearer credential.
    pub access_token: Option<String>,
    pub request_timeout: Duration,
}

impl Default for ExpoConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_PUSH_API_URL.to_string(),
            access_token: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ExpoConfig {
    /// Load from environment variables.
    ///
    /// | Env var                   | Default                                  |
    /// |---------------------------|------------------------------------------|
    /// | `PUSH_API_URL`            | `https://exp.host/--/api/v2/push/send`   |
    /// | `PUSH_ACCESS_TOKEN`       | unset                                    |
    /// | `PUSH_CHUNK_TIMEOUT_SECS` | `30`                                     |
    ///
    /// # Panics
    ///
    /// Panics if `PUSH_CHUNK_TIMEOUT_SECS` is not a valid `u64`.
    pub fn from_env() -> Self {
        let api_url =
            std::env::var("PUSH_API_URL").unwrap_or_else(|_| DEFAULT_PUSH_API_URL.to_string());
        let access_token = std::env::var("PUSH_ACCESS_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());
        let timeout_secs: u64 = std::env::var("PUSH_CHUNK_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("PUSH_CHUNK_TIMEOUT_SECS must be a valid u64");

        Self {
            api_url,
            access_token,
            request_timeout: Duration::from_secs(timeout_secs),
        }
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ExpoResponse {
    #[serde(default)]
    data: Vec<ProviderReceipt>,
}

/// HTTP client for the Expo push service.
pub struct ExpoPushProvider {
    client: reqwest::Client,
    config: ExpoConfig,
}

impl ExpoPushProvider {
    pub fn new(config: ExpoConfig) -> Result<Self, PushError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl PushProvider for ExpoPushProvider {
    fn max_batch_size(&self) -> usize {
        EXPO_MAX_BATCH_SIZE
    }

    fn is_valid_token(&self, token: &str) -> bool {
        is_expo_push_token(token)
    }

    async fn send_batch(&self, messages: &[PushMessage]) -> Result<Vec<ProviderReceipt>, PushError> {
        let mut request = self
            .client
            .post(&self.config.api_url)
            .header(ACCEPT, "application/json")
            .json(messages);
        if let Some(token) = &self.config.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(PushError::HttpStatus(response.status().as_u16()));
        }

        let body: ExpoResponse = response.json().await?;
        tracing::debug!(
            messages = messages.len(),
            receipts = body.data.len(),
            "Expo batch accepted"
        );
        Ok(body.data)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
