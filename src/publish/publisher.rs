use crate::feed::FeedEntry;
use crate::fingerprint::{fingerprint, Fingerprint};
use crate::publish::{PostingSession, PublishError, StatusDraft, Visibility};
use std::collections::HashSet;

/// An entry that could not be published this run.
#[derive(Debug)]
pub struct ItemFailure {
    pub title: Option<String>,
    pub link: String,
    pub error: PublishError,
}

/// Result of one pass of the publish loop.
#[derive(Debug, Default)]
pub struct PublishOutcome {
    /// Input cache plus one fingerprint per published entry, in publish order
    pub cache: Vec<Fingerprint>,
    pub published: usize,
    /// Entries repeating a link already published earlier in the same run
    pub duplicates: usize,
    pub failures: Vec<ItemFailure>,
}

/// Text of the status for an entry: `"{title} {link}"`, or the bare link.
pub fn compose_status(entry: &FeedEntry) -> String {
    match entry.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        Some(title) => format!("{} {}", title, entry.link),
        None => entry.link.clone(),
    }
}

/// Posts `entries` one at a time, appending the fingerprint of each accepted
/// entry to `cache`.
///
/// A failed post is recorded in [`PublishOutcome::failures`] and the loop
/// moves on; it never removes fingerprints gathered earlier. The entry's
/// fingerprint doubles as the idempotency key so a server that saw the same
/// submission already can collapse it.
pub async fn publish_entries<S>(
    session: &S,
    entries: &[FeedEntry],
    visibility: Visibility,
    cache: Vec<Fingerprint>,
) -> PublishOutcome
where
    S: PostingSession + ?Sized,
{
    let mut outcome = PublishOutcome {
        cache,
        ..PublishOutcome::default()
    };
    let mut posted_this_run: HashSet<Fingerprint> = HashSet::new();

    for entry in entries {
        let hash = fingerprint(&entry.link);

        if posted_this_run.contains(&hash) {
            tracing::debug!(link = %entry.link, "Link already published this run, skipping");
            outcome.duplicates += 1;
            continue;
        }

        let draft = StatusDraft {
            text: compose_status(entry),
            visibility,
            idempotency_key: Some(hash.to_string()),
        };

        tracing::debug!(
            title = entry.title.as_deref().unwrap_or(""),
            hash = %hash,
            "Posting entry"
        );

        match session.post(&draft).await {
            Ok(receipt) => {
                tracing::info!(
                    link = %entry.link,
                    status_id = %receipt.id,
                    status_url = receipt.url.as_deref().unwrap_or(""),
                    "Published entry"
                );
                posted_this_run.insert(hash.clone());
                outcome.cache.push(hash);
                outcome.published += 1;
            }
            Err(error) => {
                tracing::error!(
                    title = entry.title.as_deref().unwrap_or(""),
                    link = %entry.link,
                    error = %error,
                    "Failed to publish entry, continuing with the next one"
                );
                outcome.failures.push(ItemFailure {
                    title: entry.title.clone(),
                    link: entry.link.clone(),
                    error,
                });
            }
        }
    }

    outcome
}
