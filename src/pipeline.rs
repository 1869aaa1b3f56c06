//! One run of the job: fetch, filter, publish, remember.
//!
//! ```text
//! Configuring → Fetching → CacheLoading → Filtering → Authenticating
//!             → Publishing → CacheTruncating → CachePersisting → Done
//! ```
//!
//! A fetch failure ends the run before the cache is loaded, so the cache file
//! is left untouched. An authentication failure happens after the cache is in
//! memory: nothing is published, but the cache is still truncated and written
//! back so storage is left normalized. Individual publish failures are logged
//! and do not fail the run.

use crate::config::Config;
use crate::dedup::filter_unseen;
use crate::feed::{FeedSource, FetchError};
use crate::fingerprint::Fingerprint;
use crate::publish::{publish_entries, ItemFailure, PostingTransport, PublishError};
use crate::storage::{CacheError, CacheStore};
use std::fmt;
use thiserror::Error;

/// Position of a run in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Configuring,
    Fetching,
    CacheLoading,
    Filtering,
    Authenticating,
    Publishing,
    CacheTruncating,
    CachePersisting,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Configuring => "configuring",
            Stage::Fetching => "fetching",
            Stage::CacheLoading => "cache-loading",
            Stage::Filtering => "filtering",
            Stage::Authenticating => "authenticating",
            Stage::Publishing => "publishing",
            Stage::CacheTruncating => "cache-truncating",
            Stage::CachePersisting => "cache-persisting",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Conditions that abort the feed- and auth-dependent part of a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Failed to fetch feed: {0}")]
    Fetch(#[source] FetchError),
    #[error("Failed to authenticate: {0}")]
    Authenticate(#[source] PublishError),
}

/// Everything a run did, for logging and the process exit status.
#[derive(Debug)]
pub struct RunReport {
    /// Entries in the feed
    pub fetched: usize,
    /// Entries not found in the cache
    pub unseen: usize,
    pub published: usize,
    /// Unseen entries repeating a link already published earlier in the run
    pub duplicates: usize,
    pub failures: Vec<ItemFailure>,
    pub fatal: Option<RunError>,
    /// Set when the cache could not be written; the next run may repost
    pub persist_error: Option<CacheError>,
    /// Fingerprints written to the cache file
    pub retained: usize,
    /// Oldest fingerprints dropped by the limit
    pub dropped: usize,
    pub final_stage: Stage,
}

impl RunReport {
    fn new() -> Self {
        Self {
            fetched: 0,
            unseen: 0,
            published: 0,
            duplicates: 0,
            failures: Vec::new(),
            fatal: None,
            persist_error: None,
            retained: 0,
            dropped: 0,
            final_stage: Stage::Configuring,
        }
    }

    /// True unless a fatal error occurred or the cache failed to persist.
    ///
    /// Per-entry publish failures do not count: they are retried naturally on
    /// the next run because their fingerprints were never cached.
    pub fn is_success(&self) -> bool {
        self.fatal.is_none() && self.persist_error.is_none()
    }

    /// Emits the end-of-run summary, fatal conditions first, persistence last.
    pub fn log_summary(&self) {
        if let Some(fatal) = &self.fatal {
            tracing::error!(error = %fatal, "Run aborted");
        }
        if let Some(persist) = &self.persist_error {
            tracing::error!(
                error = %persist,
                published = self.published,
                "Cache not saved; entries published this run may be posted again next run"
            );
        }

        tracing::info!(
            fetched = self.fetched,
            unseen = self.unseen,
            published = self.published,
            duplicates = self.duplicates,
            failed = self.failures.len(),
            cached = self.retained,
            stage = %self.final_stage,
            "Run finished"
        );
    }
}

struct Progress {
    stage: Stage,
}

impl Progress {
    fn enter(&mut self, next: Stage) {
        tracing::debug!(from = %self.stage, to = %next, "Stage transition");
        self.stage = next;
    }
}

/// Executes one run against `config` using the given feed and posting backends.
///
/// Never panics on I/O or network failures: every outcome is captured in the
/// returned [`RunReport`].
pub async fn run<F, T>(config: &Config, source: &F, transport: &T) -> RunReport
where
    F: FeedSource + ?Sized,
    T: PostingTransport + ?Sized,
{
    let mut report = RunReport::new();
    let mut progress = Progress {
        stage: Stage::Configuring,
    };
    let store = CacheStore::new(&config.cache_file);

    progress.enter(Stage::Fetching);
    let entries = match source.fetch(&config.feed_location).await {
        Ok(entries) => entries,
        Err(e) => {
            // No cache in memory yet, nothing to normalize
            report.fatal = Some(RunError::Fetch(e));
            progress.enter(Stage::Failed);
            report.final_stage = progress.stage;
            return report;
        }
    };
    report.fetched = entries.len();

    progress.enter(Stage::CacheLoading);
    let cache = store.load();

    progress.enter(Stage::Filtering);
    if tracing::enabled!(tracing::Level::DEBUG) {
        tracing::debug!(
            entries = %serde_json::to_string(&entries).unwrap_or_default(),
            "Pre-filter feed entries"
        );
    }
    let unseen = filter_unseen(&entries, &cache);
    report.unseen = unseen.len();
    if tracing::enabled!(tracing::Level::DEBUG) {
        tracing::debug!(
            entries = %serde_json::to_string(&unseen).unwrap_or_default(),
            "Post-filter feed entries"
        );
    }
    tracing::info!(
        fetched = report.fetched,
        unseen = report.unseen,
        cached = cache.len(),
        "Feed filtered against cache"
    );

    progress.enter(Stage::Authenticating);
    let cache: Vec<Fingerprint> = match transport
        .authenticate(&config.api_endpoint, &config.api_token)
        .await
    {
        Ok(session) => {
            progress.enter(Stage::Publishing);
            let outcome = publish_entries(&session, &unseen, config.visibility, cache).await;
            report.published = outcome.published;
            report.duplicates = outcome.duplicates;
            report.failures = outcome.failures;
            outcome.cache
        }
        Err(e) => {
            report.fatal = Some(RunError::Authenticate(e));
            cache
        }
    };

    persist(&store, cache, config.cache_limit, &mut report, &mut progress);

    report.final_stage = if report.is_success() {
        Stage::Done
    } else {
        Stage::Failed
    };
    report
}

fn persist(
    store: &CacheStore,
    cache: Vec<Fingerprint>,
    limit: usize,
    report: &mut RunReport,
    progress: &mut Progress,
) {
    // save() truncates before writing
    progress.enter(Stage::CacheTruncating);
    progress.enter(Stage::CachePersisting);
    match store.save(cache, limit) {
        Ok(outcome) => {
            report.retained = outcome.retained;
            report.dropped = outcome.dropped;
        }
        Err(e) => report.persist_error = Some(e),
    }
}
