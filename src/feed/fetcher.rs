use crate::feed::parser::{parse_feed, FeedEntry, ParseResult};
use async_trait::async_trait;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while retrieving or parsing the feed.
///
/// Every variant is fatal for a run: without the feed there is nothing to
/// compare against the cache.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Request timed out after {0}s")]
    Timeout(u64),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    #[error("Unsupported feed location scheme: {0}")]
    UnsupportedScheme(String),
    #[error("Failed to read feed file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Feed document could not be parsed as RSS, Atom or JSON Feed
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Produces the entries of a feed.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Retrieves and parses the feed at `location`, preserving document order.
    async fn fetch(&self, location: &str) -> Result<Vec<FeedEntry>, FetchError>;
}

/// Default feed source: `http(s)://` URLs over HTTP, `file://` URLs and
/// plain paths from the local filesystem.
///
/// A single attempt is made per run; the scheduler re-runs the job anyway.
#[derive(Debug, Clone)]
pub struct HttpFeedSource {
    client: reqwest::Client,
    timeout: Duration,
    max_bytes: usize,
}

impl HttpFeedSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: DEFAULT_TIMEOUT,
            max_bytes: MAX_FEED_SIZE,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// The timeout covers the whole exchange: a server that sends headers and
    /// then stalls the body still fails the fetch.
    async fn fetch_http(&self, url: Url) -> Result<Vec<u8>, FetchError> {
        tokio::time::timeout(self.timeout, self.download(url))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout.as_secs()))?
    }

    async fn download(&self, url: Url) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(FetchError::Network)?;

        if !response.status().is_success() {
            tracing::debug!(feed = %url, status = %response.status(), "Feed request rejected");
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        read_limited_bytes(response, self.max_bytes).await
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, FetchError> {
        let io_err = |source: std::io::Error| FetchError::Io {
            path: path.to_path_buf(),
            source,
        };

        let meta = tokio::fs::metadata(path).await.map_err(io_err)?;
        if meta.len() > self.max_bytes as u64 {
            return Err(FetchError::ResponseTooLarge(self.max_bytes));
        }
        tokio::fs::read(path).await.map_err(io_err)
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, location: &str) -> Result<Vec<FeedEntry>, FetchError> {
        let bytes = match Url::parse(location) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => self.fetch_http(url).await?,
            Ok(url) if url.scheme() == "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| FetchError::UnsupportedScheme(location.to_string()))?;
                self.read_file(&path).await?
            }
            Ok(url) => return Err(FetchError::UnsupportedScheme(url.scheme().to_string())),
            // Not a URL at all: treat as a filesystem path
            Err(_) => self.read_file(Path::new(location)).await?,
        };

        let ParseResult { entries, skipped } = parse_feed(&bytes)?;

        if skipped > 0 {
            tracing::warn!(
                feed = %location,
                skipped = skipped,
                "Feed items without a link skipped"
            );
        }
        tracing::debug!(feed = %location, entries = entries.len(), "Feed fetched");

        Ok(entries)
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
