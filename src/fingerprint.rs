//! Stable identity for feed entries.
//!
//! An entry is identified solely by its link: the fingerprint is the
//! lowercase hex SHA-256 digest of the link's UTF-8 bytes. Title edits on the
//! publisher's side therefore never cause a repost.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Length of a fingerprint in hex characters (SHA-256 = 32 bytes).
pub const FINGERPRINT_LEN: usize = 64;

/// Hex-encoded SHA-256 digest of an entry link.
///
/// Serializes as a bare JSON string so the cache file stays a flat array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Values read back from the cache file are taken as-is; a malformed value
/// can never equal a computed digest, so it just never matches.
impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Computes the fingerprint of an entry link.
pub fn fingerprint(link: &str) -> Fingerprint {
    let hash = Sha256::digest(link.as_bytes());
    Fingerprint(format!("{:x}", hash))
}
