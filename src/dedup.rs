//! Filtering of feed entries against the cache of published fingerprints.

use crate::feed::FeedEntry;
use crate::fingerprint::{fingerprint, Fingerprint};
use std::collections::HashSet;

/// Returns, in feed order, the entries whose link fingerprint is not cached.
///
/// Neither input is modified. Membership is exact string equality on the
/// fingerprint.
pub fn filter_unseen(entries: &[FeedEntry], cache: &[Fingerprint]) -> Vec<FeedEntry> {
    if cache.is_empty() {
        return entries.to_vec();
    }

    let seen: HashSet<&str> = cache.iter().map(Fingerprint::as_str).collect();
    entries
        .iter()
        .filter(|entry| !seen.contains(fingerprint(&entry.link).as_str()))
        .cloned()
        .collect()
}
