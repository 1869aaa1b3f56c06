use crate::publish::{PostReceipt, PostingSession, PostingTransport, PublishError, StatusDraft};
use async_trait::async_trait;
use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RESPONSE_SIZE: usize = 1024 * 1024; // 1MB
/// Longest slice of an unstructured error body quoted in an error message
const MAX_ERROR_SNIPPET: usize = 200;

const VERIFY_CREDENTIALS_PATH: &str = "api/v1/accounts/verify_credentials";
const STATUSES_PATH: &str = "api/v1/statuses";

/// Posting backend for Mastodon-compatible servers (Mastodon, GoToSocial, Akkoma, ...).
#[derive(Debug, Clone)]
pub struct MastodonTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl MastodonTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Session bound to one account on one server.
pub struct MastodonSession {
    client: reqwest::Client,
    statuses_url: Url,
    token: SecretString,
    timeout: Duration,
    account: String,
}

impl MastodonSession {
    /// Handle of the authenticated account (`user` or `user@domain`).
    pub fn account(&self) -> &str {
        &self.account
    }
}

impl std::fmt::Debug for MastodonSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MastodonSession")
            .field("statuses_url", &self.statuses_url.as_str())
            .field("account", &self.account)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Deserialize)]
struct Account {
    acct: String,
}

#[derive(Serialize)]
struct NewStatus<'a> {
    status: &'a str,
    visibility: &'a str,
}

#[derive(Deserialize)]
struct ApiError {
    error: String,
}

#[async_trait]
impl PostingTransport for MastodonTransport {
    type Session = MastodonSession;

    async fn authenticate(
        &self,
        endpoint: &Url,
        credential: &SecretString,
    ) -> Result<MastodonSession, PublishError> {
        let verify_url = api_url(endpoint, VERIFY_CREDENTIALS_PATH)?;
        let statuses_url = api_url(endpoint, STATUSES_PATH)?;

        let request = self
            .client
            .get(verify_url)
            .bearer_auth(credential.expose_secret());
        let body = send(request, self.timeout).await?;

        let account: Account = serde_json::from_str(&body)
            .map_err(|e| PublishError::InvalidResponse(format!("account: {}", e)))?;

        tracing::info!(endpoint = %endpoint, account = %account.acct, "Authenticated");

        Ok(MastodonSession {
            client: self.client.clone(),
            statuses_url,
            token: SecretString::from(credential.expose_secret().to_owned()),
            timeout: self.timeout,
            account: account.acct,
        })
    }
}

#[async_trait]
impl PostingSession for MastodonSession {
    async fn post(&self, draft: &StatusDraft) -> Result<PostReceipt, PublishError> {
        let mut request = self
            .client
            .post(self.statuses_url.clone())
            .bearer_auth(self.token.expose_secret())
            .json(&NewStatus {
                status: &draft.text,
                visibility: draft.visibility.as_str(),
            });

        if let Some(key) = &draft.idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let body = send(request, self.timeout).await?;
        tracing::debug!(response = %body, "Status created");

        serde_json::from_str(&body)
            .map_err(|e| PublishError::InvalidResponse(format!("status: {}", e)))
    }
}

/// Resolves an API path under the endpoint, keeping any path prefix the
/// endpoint carries (`https://host/prefix` → `https://host/prefix/api/v1/...`).
fn api_url(endpoint: &Url, path: &str) -> Result<Url, PublishError> {
    let mut base = endpoint.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path).map_err(|e| PublishError::InvalidEndpoint(e.to_string()))
}

/// Sends `request` once and returns the body of a 2xx response.
///
/// `timeout` bounds the request and the body read together.
async fn send(request: reqwest::RequestBuilder, timeout: Duration) -> Result<String, PublishError> {
    tokio::time::timeout(timeout, exchange(request))
        .await
        .map_err(|_| PublishError::Timeout(timeout.as_secs()))?
}

async fn exchange(request: reqwest::RequestBuilder) -> Result<String, PublishError> {
    let response = request.send().await.map_err(PublishError::Network)?;

    let status = response.status();
    let body = read_limited_text(response, MAX_RESPONSE_SIZE).await?;

    if status.is_success() {
        return Ok(body);
    }

    let message = error_message(&body);
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(PublishError::Unauthorized(message));
    }
    Err(PublishError::Rejected {
        status: status.as_u16(),
        message,
    })
}

/// Extracts Mastodon's `{"error": "..."}` message, falling back to a prefix of the raw body.
fn error_message(body: &str) -> String {
    if let Ok(api_error) = serde_json::from_str::<ApiError>(body) {
        return api_error.error;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    trimmed.chars().take(MAX_ERROR_SNIPPET).collect()
}

async fn read_limited_text(
    response: reqwest::Response,
    limit: usize,
) -> Result<String, PublishError> {
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(PublishError::InvalidResponse(format!(
                "response exceeds {} bytes",
                limit
            )));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(PublishError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(PublishError::InvalidResponse(format!(
                "response exceeds {} bytes",
                limit
            )));
        }
        bytes.extend_from_slice(&chunk);
    }

    String::from_utf8(bytes)
        .map_err(|_| PublishError::InvalidResponse("invalid UTF-8 in response".to_string()))
}
