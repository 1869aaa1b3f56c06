use crate::fingerprint::Fingerprint;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while persisting the cache.
///
/// Loading never fails: a missing or corrupt cache file is the expected
/// first-run state and degrades to an empty cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to create cache directory '{}': {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write cache file '{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize cache: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result of a successful [`CacheStore::save`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOutcome {
    /// Fingerprints written to disk
    pub retained: usize,
    /// Oldest fingerprints dropped to respect the limit
    pub dropped: usize,
}

/// JSON-array file holding the fingerprints of published entries, oldest first.
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Reads the cached fingerprints.
    ///
    /// - Missing file → empty cache (first run)
    /// - Unreadable file or invalid JSON → empty cache, logged as a warning
    pub fn load(&self) -> Vec<Fingerprint> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    path = %self.path.display(),
                    "Cache file not found, a new one will be created"
                );
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Cache file unreadable, starting with an empty cache"
                );
                return Vec::new();
            }
        };

        match serde_json::from_slice::<Vec<Fingerprint>>(&bytes) {
            Ok(cache) => {
                tracing::debug!(path = %self.path.display(), entries = cache.len(), "Loaded cache");
                cache
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Cache file is not a JSON string array, starting with an empty cache"
                );
                Vec::new()
            }
        }
    }

    /// Truncates `cache` to its newest `limit` fingerprints and writes it out.
    ///
    /// The write goes through a temporary file in the same directory followed
    /// by a rename, so an interrupted run leaves either the old or the new
    /// cache on disk, never a partial one.
    pub fn save(&self, cache: Vec<Fingerprint>, limit: usize) -> Result<SaveOutcome, CacheError> {
        let (cache, dropped) = truncate_to_limit(cache, limit);
        if dropped > 0 {
            tracing::info!(
                dropped = dropped,
                limit = limit,
                "Cache limit reached, removed oldest entries"
            );
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| CacheError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let bytes = serde_json::to_vec(&cache)?;
        write_atomic(&self.path, &bytes).map_err(|source| CacheError::Write {
            path: self.path.clone(),
            source,
        })?;

        tracing::debug!(path = %self.path.display(), entries = cache.len(), "Cache written");
        Ok(SaveOutcome {
            retained: cache.len(),
            dropped,
        })
    }
}

/// Keeps the trailing `limit` fingerprints, returning them with the number dropped.
pub fn truncate_to_limit(mut cache: Vec<Fingerprint>, limit: usize) -> (Vec<Fingerprint>, usize) {
    let dropped = cache.len().saturating_sub(limit);
    if dropped > 0 {
        cache.drain(..dropped);
    }
    (cache, dropped)
}

fn write_atomic(dst: &Path, bytes: &[u8]) -> std::io::Result<()> {
    // Unpredictable temp name so a stale or planted file is never reused
    use std::time::{SystemTime, UNIX_EPOCH};
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = dst.with_extension(format!("tmp.{:016x}", random_suffix));

    let result = (|| {
        let mut temp_file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)?;
        temp_file.write_all(bytes)?;
        temp_file.sync_all()?;
        drop(temp_file);

        // Windows rename refuses to replace an existing file
        #[cfg(windows)]
        if dst.exists() {
            std::fs::remove_file(dst)?;
        }

        std::fs::rename(&temp_path, dst)
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&temp_path);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint;
    use pretty_assertions::assert_eq;

    fn fps(links: &[&str]) -> Vec<Fingerprint> {
        links.iter().map(|l| fingerprint(l)).collect()
    }

    #[test]
    fn test_truncate_keeps_newest_in_order() {
        let cache = fps(&["a", "b", "c", "d"]);
        let (kept, dropped) = truncate_to_limit(cache, 2);
        assert_eq!(kept, fps(&["c", "d"]));
        assert_eq!(dropped, 2);
    }

    #[test]
    fn test_truncate_under_limit_is_noop() {
        let cache = fps(&["a", "b"]);
        let (kept, dropped) = truncate_to_limit(cache.clone(), 5);
        assert_eq!(kept, cache);
        assert_eq!(dropped, 0);
    }

    #[test]
    fn test_truncate_exactly_at_limit() {
        let (kept, dropped) = truncate_to_limit(fps(&["a", "b", "c"]), 3);
        assert_eq!(kept.len(), 3);
        assert_eq!(dropped, 0);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("cache.json"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_load_invalid_json_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(CacheStore::new(&path).load().is_empty());
    }

    #[test]
    fn test_load_unreadable_path_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        // A directory exists at the path, so reading fails with something other than NotFound
        let path = dir.path().join("cache.json");
        std::fs::create_dir(&path).unwrap();
        assert!(CacheStore::new(&path).load().is_empty());
    }

    #[test]
    fn test_load_wrapped_object_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, r#"{"items": ["abc"]}"#).unwrap();
        assert!(CacheStore::new(&path).load().is_empty());
    }

    #[test]
    fn test_save_writes_compact_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let store = CacheStore::new(&path);

        let outcome = store.save(fps(&["a", "b"]), 10).unwrap();
        assert_eq!(
            outcome,
            SaveOutcome {
                retained: 2,
                dropped: 0
            }
        );

        let raw = std::fs::read_to_string(&path).unwrap();
        let expected = serde_json::to_string(&fps(&["a", "b"])).unwrap();
        assert_eq!(raw, expected);
        assert_eq!(store.load(), fps(&["a", "b"]));
    }

    #[test]
    fn test_save_truncates_to_limit() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("cache.json"));

        let outcome = store.save(fps(&["a", "b", "c"]), 1).unwrap();
        assert_eq!(outcome.dropped, 2);
        assert_eq!(store.load(), fps(&["c"]));
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state").join("cache.json");
        let store = CacheStore::new(&path);

        store.save(fps(&["a"]), 5).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_save_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("cache.json"));
        store.save(fps(&["a"]), 5).unwrap();
        store.save(fps(&["a", "b"]), 5).unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["cache.json".to_string()]);
    }

    #[test]
    fn test_save_into_directory_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        // The target path is an existing directory, so rename cannot replace it
        let store = CacheStore::new(dir.path());
        let result = store.save(fps(&["a"]), 5);
        assert!(matches!(result, Err(CacheError::Write { .. })));
    }
}
