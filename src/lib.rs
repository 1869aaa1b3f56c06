//! Posts new RSS/Atom entries to a Mastodon-compatible account.
//!
//! Each run fetches a feed, drops the entries whose link fingerprint is
//! already in the cache, publishes the rest one by one, and writes the cache
//! back capped to a fixed number of fingerprints. See [`pipeline::run`].

pub mod config;
pub mod dedup;
pub mod feed;
pub mod fingerprint;
pub mod pipeline;
pub mod publish;
pub mod storage;
pub mod util;

pub use config::{Config, ConfigError, PartialConfig};
pub use fingerprint::{fingerprint, Fingerprint};
pub use pipeline::{run, RunError, RunReport, Stage};
