//! Error types for the mirror module.
//!
//! Fetch failures and local failures are kept apart so that callers can
//! decide per task role whether a failure is fatal (pages) or only logged
//! (assets).

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by a [`Fetch`](super::Fetch) implementation.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, DNS, TLS or proxy failure.
    #[error("transport error fetching {url}: {source}")]
    Transport {
        /// The URL that failed.
        url: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The request timed out before a response was read.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// The server answered with something other than 200.
    #[error("HTTP {status} fetching {url}")]
    BadStatus {
        /// The URL that returned the status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The URL could not be parsed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },
}

impl FetchError {
    /// Creates a transport error from a reqwest error, promoting timeouts.
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: url.into() }
        } else {
            Self::Transport {
                url: url.into(),
                source,
            }
        }
    }

    /// Creates a bad-status error.
    pub fn bad_status(url: impl Into<String>, status: u16) -> Self {
        Self::BadStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Returns the HTTP status for [`FetchError::BadStatus`].
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::BadStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors surfaced by the mirroring engine.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// A fetch failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Creating a directory or writing a file failed.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Invalid concurrency value provided.
    #[error("invalid concurrency value {value}: must be between 1 and 100")]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Configuration is missing a value or holds an invalid one.
    #[error("invalid configuration: {message}")]
    Config {
        /// What is wrong.
        message: String,
    },
}

impl MirrorError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_status_display() {
        let error = FetchError::bad_status("https://example.com/about.html", 404);
        let msg = error.to_string();
        assert!(msg.contains("404"), "Expected '404' in: {msg}");
        assert!(
            msg.contains("https://example.com/about.html"),
            "Expected URL in: {msg}"
        );
        assert_eq!(error.status(), Some(404));
    }

    #[test]
    fn test_timeout_has_no_status() {
        let error = FetchError::Timeout {
            url: "https://example.com/".to_string(),
        };
        assert!(error.to_string().contains("timeout"));
        assert_eq!(error.status(), None);
    }

    #[test]
    fn test_mirror_error_wraps_fetch_transparently() {
        let error: MirrorError = FetchError::invalid_url("not-a-url").into();
        assert_eq!(error.to_string(), "invalid URL: not-a-url");
        assert!(matches!(error, MirrorError::Fetch(FetchError::InvalidUrl { .. })));
    }

    #[test]
    fn test_io_error_display_contains_path() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let error = MirrorError::io(PathBuf::from("/tmp/mirror/style.css"), io_error);
        let msg = error.to_string();
        assert!(msg.contains("/tmp/mirror/style.css"), "Expected path in: {msg}");
    }

    #[test]
    fn test_invalid_concurrency_display() {
        let msg = MirrorError::InvalidConcurrency { value: 0 }.to_string();
        assert!(msg.contains("invalid concurrency"));
        assert!(msg.contains("100"));
    }
}
