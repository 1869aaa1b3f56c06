//! Persistent state between runs.
//!
//! The only state this job keeps is the cache: an ordered, size-capped list
//! of fingerprints of entries that were already published.

mod cache;

pub use cache::{truncate_to_limit, CacheError, CacheStore, SaveOutcome};
