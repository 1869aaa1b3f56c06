//! Run configuration.
//!
//! Settings come from three layers, highest precedence first: command-line
//! flags, environment variables, and an optional TOML file. Each layer is a
//! [`PartialConfig`]; the binary merges them and calls
//! [`PartialConfig::into_config`] once. The rest of the crate only ever sees
//! the validated [`Config`].
use crate::publish::Visibility;
use crate::util::validate_endpoint;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Missing required setting '{0}'")]
    Missing(&'static str),

    #[error("Invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Validated settings for one run. Immutable once built.
#[derive(Debug)]
pub struct Config {
    /// Feed URL (`http(s)://`, `file://`) or filesystem path
    pub feed_location: String,
    /// Base URL of the posting server, e.g. `https://mastodon.social`
    pub api_endpoint: Url,
    pub api_token: SecretString,
    pub cache_file: PathBuf,
    /// Maximum number of fingerprints kept in the cache file (> 0)
    pub cache_limit: usize,
    pub visibility: Visibility,
}

/// One layer of settings; any subset of keys may be present.
///
/// The token is masked in `Debug` output so it never reaches logs.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct PartialConfig {
    pub rss_feed: Option<String>,
    pub api_endpoint: Option<String>,
    pub api_token: Option<String>,
    pub cache_file: Option<PathBuf>,
    pub cache_limit: Option<usize>,
    pub visibility: Option<Visibility>,
}

impl std::fmt::Debug for PartialConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartialConfig")
            .field("rss_feed", &self.rss_feed)
            .field("api_endpoint", &self.api_endpoint)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("cache_file", &self.cache_file)
            .field("cache_limit", &self.cache_limit)
            .field("visibility", &self.visibility)
            .finish()
    }
}

impl PartialConfig {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 6] = [
        "rss_feed",
        "api_endpoint",
        "api_token",
        "cache_file",
        "cache_limit",
        "visibility",
    ];

    /// Load a settings layer from a TOML file.
    ///
    /// - Missing file → `Ok(PartialConfig::default())`
    /// - Empty file → `Ok(PartialConfig::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to avoid loading a runaway file.
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: PartialConfig = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Fills every unset field from `lower`.
    pub fn merge(self, lower: PartialConfig) -> PartialConfig {
        PartialConfig {
            rss_feed: self.rss_feed.or(lower.rss_feed),
            api_endpoint: self.api_endpoint.or(lower.api_endpoint),
            api_token: self.api_token.or(lower.api_token),
            cache_file: self.cache_file.or(lower.cache_file),
            cache_limit: self.cache_limit.or(lower.cache_limit),
            visibility: self.visibility.or(lower.visibility),
        }
    }

    /// Validates the merged settings.
    pub fn into_config(self) -> Result<Config, ConfigError> {
        let feed_location = non_blank(self.rss_feed, "rss_feed")?;

        let endpoint = non_blank(self.api_endpoint, "api_endpoint")?;
        let api_endpoint = validate_endpoint(&endpoint).map_err(|e| ConfigError::Invalid {
            field: "api_endpoint",
            reason: e.to_string(),
        })?;

        let api_token = SecretString::from(non_blank(self.api_token, "api_token")?);

        let cache_file = self
            .cache_file
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(ConfigError::Missing("cache_file"))?;

        let cache_limit = match self.cache_limit {
            None => return Err(ConfigError::Missing("cache_limit")),
            Some(0) => {
                return Err(ConfigError::Invalid {
                    field: "cache_limit",
                    reason: "must be a positive integer".to_string(),
                })
            }
            Some(n) => n,
        };

        Ok(Config {
            feed_location,
            api_endpoint,
            api_token,
            cache_file,
            cache_limit,
            visibility: self.visibility.unwrap_or_default(),
        })
    }
}

fn non_blank(value: Option<String>, field: &'static str) -> Result<String, ConfigError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(field))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn complete() -> PartialConfig {
        PartialConfig {
            rss_feed: Some("https://example.com/feed.xml".into()),
            api_endpoint: Some("https://mastodon.example".into()),
            api_token: Some("secret-token".into()),
            cache_file: Some(PathBuf::from("cache/cache.json")),
            cache_limit: Some(100),
            visibility: None,
        }
    }

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feedtoot.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_complete_config_validates() {
        let config = complete().into_config().unwrap();
        assert_eq!(config.feed_location, "https://example.com/feed.xml");
        assert_eq!(config.api_endpoint.as_str(), "https://mastodon.example/");
        assert_eq!(config.api_token.expose_secret(), "secret-token");
        assert_eq!(config.cache_limit, 100);
        assert_eq!(config.visibility, Visibility::Public);
    }

    #[test]
    fn test_missing_fields_reported_by_name() {
        let mut partial = complete();
        partial.api_token = None;
        assert!(matches!(
            partial.into_config(),
            Err(ConfigError::Missing("api_token"))
        ));

        let mut partial = complete();
        partial.rss_feed = Some("   ".into());
        assert!(matches!(
            partial.into_config(),
            Err(ConfigError::Missing("rss_feed"))
        ));

        let mut partial = complete();
        partial.cache_limit = None;
        assert!(matches!(
            partial.into_config(),
            Err(ConfigError::Missing("cache_limit"))
        ));
    }

    #[test]
    fn test_zero_cache_limit_rejected() {
        let mut partial = complete();
        partial.cache_limit = Some(0);
        let err = partial.into_config().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "cache_limit",
                ..
            }
        ));
    }

    #[test]
    fn test_insecure_endpoint_rejected() {
        let mut partial = complete();
        partial.api_endpoint = Some("http://mastodon.example".into());
        let err = partial.into_config().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "api_endpoint",
                ..
            }
        ));
    }

    #[test]
    fn test_merge_prefers_upper_layer() {
        let upper = PartialConfig {
            cache_limit: Some(5),
            visibility: Some(Visibility::Unlisted),
            ..Default::default()
        };
        let merged = upper.merge(complete());
        assert_eq!(merged.cache_limit, Some(5));
        assert_eq!(merged.visibility, Some(Visibility::Unlisted));
        assert_eq!(merged.api_token.as_deref(), Some("secret-token"));
    }

    #[test]
    fn test_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let partial = PartialConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert!(partial.rss_feed.is_none());
        assert!(partial.cache_limit.is_none());
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let (_dir, path) = write_config("   \n  \n  ");
        let partial = PartialConfig::load(&path).unwrap();
        assert!(partial.api_endpoint.is_none());
    }

    #[test]
    fn test_full_file() {
        let (_dir, path) = write_config(
            r#"
rss_feed = "https://blog.example.com/index.xml"
api_endpoint = "https://mastodon.example"
api_token = "from-file"
cache_file = "state/cache.json"
cache_limit = 250
visibility = "unlisted"
"#,
        );

        let config = PartialConfig::load(&path).unwrap().into_config().unwrap();
        assert_eq!(config.feed_location, "https://blog.example.com/index.xml");
        assert_eq!(config.cache_file, PathBuf::from("state/cache.json"));
        assert_eq!(config.cache_limit, 250);
        assert_eq!(config.visibility, Visibility::Unlisted);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let (_dir, path) = write_config("this is not [valid toml");
        let err = PartialConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_unknown_visibility_is_parse_error() {
        let (_dir, path) = write_config("visibility = \"followers\"\n");
        assert!(matches!(
            PartialConfig::load(&path),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let (_dir, path) = write_config("cache_limit = 3\ntotally_fake_key = true\n");
        let partial = PartialConfig::load(&path).unwrap();
        assert_eq!(partial.cache_limit, Some(3));
    }

    #[test]
    fn test_too_large_file_rejected() {
        let (_dir, path) = write_config(&"a".repeat(1_048_577));
        let err = PartialConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
    }

    #[test]
    fn test_debug_masks_token() {
        let partial = complete();
        let debug_output = format!("{:?}", partial);
        assert!(!debug_output.contains("secret-token"));
        assert!(debug_output.contains("[REDACTED]"));

        let config = complete().into_config().unwrap();
        assert!(!format!("{:?}", config).contains("secret-token"));
    }
}
