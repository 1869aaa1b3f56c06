//! Publishing feed entries to a social account.
//!
//! The posting backend is abstracted behind two capabilities:
//!
//! - [`PostingTransport`] authenticates once per run and yields a session
//! - [`PostingSession`] submits one status at a time
//!
//! [`MastodonTransport`] is the default backend. The publish loop itself
//! lives in [`publish_entries`] and only depends on the traits.

mod mastodon;
mod publisher;

pub use mastodon::{MastodonSession, MastodonTransport};
pub use publisher::{compose_status, publish_entries, ItemFailure, PublishOutcome};

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Request timed out after {0}s")]
    Timeout(u64),
    /// Credential rejected (HTTP 401/403)
    #[error("Authentication rejected: {0}")]
    Unauthorized(String),
    /// Any other non-2xx response
    #[error("Server rejected request (status {status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Privacy level of a published status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Unlisted,
    Private,
    Direct,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Unlisted => "unlisted",
            Visibility::Private => "private",
            Visibility::Direct => "direct",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("Unknown visibility '{0}' (expected public, unlisted, private or direct)")]
pub struct ParseVisibilityError(String);

impl FromStr for Visibility {
    type Err = ParseVisibilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(Visibility::Public),
            "unlisted" => Ok(Visibility::Unlisted),
            "private" => Ok(Visibility::Private),
            "direct" => Ok(Visibility::Direct),
            _ => Err(ParseVisibilityError(s.to_string())),
        }
    }
}

/// A status ready to be submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusDraft {
    pub text: String,
    pub visibility: Visibility,
    /// Lets the server collapse a resubmission of the same entry
    pub idempotency_key: Option<String>,
}

/// What the server returned for an accepted status.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PostReceipt {
    pub id: String,
    pub url: Option<String>,
}

/// Establishes an authenticated session with the posting service.
#[async_trait]
pub trait PostingTransport: Send + Sync {
    type Session: PostingSession;

    /// Verifies the credential against `endpoint`. Failure is fatal for a run.
    async fn authenticate(
        &self,
        endpoint: &Url,
        credential: &SecretString,
    ) -> Result<Self::Session, PublishError>;
}

/// An authenticated handle able to submit statuses.
#[async_trait]
pub trait PostingSession: Send + Sync {
    async fn post(&self, draft: &StatusDraft) -> Result<PostReceipt, PublishError>;
}
