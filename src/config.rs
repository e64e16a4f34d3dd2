//! Mirror configuration: JSON file defaults merged with CLI overrides.
//!
//! The configuration is an explicit value handed to the orchestrator, the
//! fetcher and the path resolver; nothing reads ambient global state.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::mirror::constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_CONCURRENCY, DEFAULT_INDEX_PATH, MAX_CONCURRENCY,
    MIN_CONCURRENCY, READ_TIMEOUT_SECS,
};
use crate::mirror::error::MirrorError;

/// Largest accepted timeout, in seconds.
const MAX_TIMEOUT_SECS: u64 = 3600;

/// Everything a mirror run needs to know.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MirrorConfig {
    /// Base URL every reference is resolved against.
    pub site_url: String,
    /// Page fetched first, relative to `site_url`.
    pub index_path: String,
    /// Directory the mirror is written into.
    pub save_dir: PathBuf,
    /// Proxy URL; when set, requests try the proxy first.
    pub proxy: Option<String>,
    /// Maximum simultaneous fetches.
    pub concurrency: usize,
    /// HTTP connect timeout.
    pub connect_timeout_secs: u64,
    /// HTTP read timeout.
    pub read_timeout_secs: u64,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            site_url: String::new(),
            index_path: DEFAULT_INDEX_PATH.to_string(),
            save_dir: PathBuf::from("mirror"),
            proxy: None,
            concurrency: DEFAULT_CONCURRENCY,
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
        }
    }
}

/// Values given on the command line; `None` keeps the file or default value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub site_url: Option<String>,
    pub index_path: Option<String>,
    pub save_dir: Option<PathBuf>,
    pub proxy: Option<String>,
    pub concurrency: Option<usize>,
    pub connect_timeout_secs: Option<u64>,
    pub read_timeout_secs: Option<u64>,
}

impl MirrorConfig {
    /// Creates a default configuration for `site_url`.
    pub fn for_site(site_url: impl Into<String>) -> Self {
        Self {
            site_url: site_url.into(),
            ..Self::default()
        }
    }

    /// Reads a JSON config file. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Config`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, MirrorError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            MirrorError::config(format!("failed to read config file '{}': {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            MirrorError::config(format!("failed to parse config file '{}': {e}", path.display()))
        })?;
        debug!(path = %path.display(), "config file loaded");
        Ok(config)
    }

    /// Applies command-line values on top of this configuration.
    #[must_use]
    pub fn apply_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(site_url) = overrides.site_url {
            self.site_url = site_url;
        }
        if let Some(index_path) = overrides.index_path {
            self.index_path = index_path;
        }
        if let Some(save_dir) = overrides.save_dir {
            self.save_dir = save_dir;
        }
        if overrides.proxy.is_some() {
            self.proxy = overrides.proxy;
        }
        if let Some(concurrency) = overrides.concurrency {
            self.concurrency = concurrency;
        }
        if let Some(secs) = overrides.connect_timeout_secs {
            self.connect_timeout_secs = secs;
        }
        if let Some(secs) = overrides.read_timeout_secs {
            self.read_timeout_secs = secs;
        }
        self
    }

    /// Checks every field and normalizes `site_url` to end in `/`.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Config`] describing the first invalid field.
    pub fn validate(mut self) -> Result<Self, MirrorError> {
        if self.site_url.trim().is_empty() {
            return Err(MirrorError::config(
                "`site_url` is required (pass SITE_URL or set it in the config file)",
            ));
        }
        let parsed = Url::parse(&self.site_url)
            .map_err(|e| MirrorError::config(format!("invalid `site_url` {}: {e}", self.site_url)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(MirrorError::config(format!(
                "invalid `site_url` {}: scheme must be http or https",
                self.site_url
            )));
        }
        if !self.site_url.ends_with('/') {
            self.site_url.push('/');
        }

        if self.index_path.trim_start_matches('/').is_empty() {
            return Err(MirrorError::config("`index_path` must not be empty"));
        }

        if let Some(proxy) = &self.proxy {
            Url::parse(proxy)
                .map_err(|e| MirrorError::config(format!("invalid `proxy` {proxy}: {e}")))?;
        }

        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&self.concurrency) {
            return Err(MirrorError::config(format!(
                "invalid `concurrency` {}: expected range {MIN_CONCURRENCY}..={MAX_CONCURRENCY}",
                self.concurrency
            )));
        }
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;

        Ok(self)
    }
}

fn validate_timeout_secs(field: &str, value: u64) -> Result<(), MirrorError> {
    if !(1..=MAX_TIMEOUT_SECS).contains(&value) {
        return Err(MirrorError::config(format!(
            "invalid `{field}` {value}: expected range 1..={MAX_TIMEOUT_SECS}"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = MirrorConfig::default();
        assert_eq!(config.index_path, "index.html");
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.connect_timeout_secs, 30);
        assert_eq!(config.read_timeout_secs, 300);
        assert!(config.proxy.is_none());
    }

    #[test]
    fn test_validate_appends_trailing_slash() {
        let config = MirrorConfig::for_site("https://example.com/theme")
            .validate()
            .unwrap();
        assert_eq!(config.site_url, "https://example.com/theme/");
    }

    #[test]
    fn test_validate_requires_site_url() {
        let err = MirrorConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("site_url"), "got: {err}");
    }

    #[test]
    fn test_validate_rejects_non_http_scheme() {
        let err = MirrorConfig::for_site("ftp://example.com/")
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("http or https"), "got: {err}");
    }

    #[test]
    fn test_validate_rejects_bad_concurrency() {
        for value in [0, 101] {
            let config = MirrorConfig {
                concurrency: value,
                ..MirrorConfig::for_site("https://example.com/")
            };
            assert!(matches!(config.validate(), Err(MirrorError::Config { .. })));
        }
    }

    #[test]
    fn test_validate_rejects_bad_timeout_and_proxy() {
        let config = MirrorConfig {
            read_timeout_secs: 0,
            ..MirrorConfig::for_site("https://example.com/")
        };
        assert!(config.validate().unwrap_err().to_string().contains("read_timeout_secs"));

        let config = MirrorConfig {
            proxy: Some("not a proxy".to_string()),
            ..MirrorConfig::for_site("https://example.com/")
        };
        assert!(config.validate().unwrap_err().to_string().contains("proxy"));
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("mirror.json");
        std::fs::write(
            &path,
            r#"{ "site_url": "http://example.com/", "proxy": "http://127.0.0.1:8080" }"#,
        )
        .unwrap();

        let config = MirrorConfig::load(&path).unwrap();
        assert_eq!(config.site_url, "http://example.com/");
        assert_eq!(config.proxy.as_deref(), Some("http://127.0.0.1:8080"));
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.index_path, "index.html");
    }

    #[test]
    fn test_load_rejects_unknown_keys() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("mirror.json");
        std::fs::write(&path, r#"{ "site_url": "http://example.com/", "threads": 4 }"#).unwrap();

        let err = MirrorConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("threads"), "got: {err}");
    }

    #[test]
    fn test_load_missing_file() {
        let err = MirrorConfig::load(Path::new("/nonexistent/mirror.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read"), "got: {err}");
    }

    #[test]
    fn test_overrides_win_over_file_values() {
        let base = MirrorConfig {
            concurrency: 8,
            save_dir: PathBuf::from("from-file"),
            ..MirrorConfig::for_site("http://file.example/")
        };
        let merged = base.apply_overrides(ConfigOverrides {
            site_url: Some("http://cli.example/".to_string()),
            concurrency: Some(2),
            ..ConfigOverrides::default()
        });

        assert_eq!(merged.site_url, "http://cli.example/");
        assert_eq!(merged.concurrency, 2);
        assert_eq!(merged.save_dir, PathBuf::from("from-file"));
    }
}
