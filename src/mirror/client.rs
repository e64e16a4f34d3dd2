//! HTTP fetching for the mirror.
//!
//! The engine only sees the [`Fetch`] trait. [`HttpFetcher`] is the reqwest
//! implementation: an optional proxied client with a direct fallback.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Proxy};
use tracing::{debug, instrument, warn};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::error::{FetchError, MirrorError};
use super::extract::PageDocument;
use crate::config::MirrorConfig;
use crate::user_agent;

/// Status, body and URL of one GET.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The requested URL.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Full response body.
    pub body: Bytes,
}

impl FetchResponse {
    /// True for a 200 response.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Turns a non-200 response into [`FetchError::BadStatus`].
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::BadStatus`] when the status is not 200.
    pub fn ensure_ok(self) -> Result<Self, FetchError> {
        if self.is_ok() {
            Ok(self)
        } else {
            Err(FetchError::bad_status(self.url, self.status))
        }
    }
}

/// An HTML page fetched for traversal.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// The page URL.
    pub url: String,
    /// Raw bytes as served; this is what gets saved.
    pub body: Bytes,
}

impl FetchedPage {
    /// Parses the body into a queryable document.
    #[must_use]
    pub fn document(&self) -> PageDocument {
        PageDocument::from_bytes(&self.body)
    }
}

/// One HTTP GET against the mirrored site.
///
/// Implementations report any received response through `fetch`, whatever
/// its status; the provided methods narrow that to 200-only results.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Performs a GET.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when no response could be obtained.
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError>;

    /// Fetches raw bytes for content that is saved untouched.
    ///
    /// # Errors
    ///
    /// Fails on transport errors and on any status other than 200.
    async fn fetch_bytes(&self, url: &str) -> Result<Bytes, FetchError> {
        Ok(self.fetch(url).await?.ensure_ok()?.body)
    }

    /// Fetches an HTML page for traversal.
    ///
    /// # Errors
    ///
    /// Fails on transport errors and on any status other than 200.
    async fn fetch_page(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let response = self.fetch(url).await?.ensure_ok()?;
        Ok(FetchedPage {
            url: response.url,
            body: response.body,
        })
    }
}

/// reqwest-backed [`Fetch`] with optional proxy routing.
///
/// When a proxy is configured every request goes through it first; a
/// transport failure on the proxied attempt is logged and the same URL is
/// fetched again without the proxy.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    direct: Client,
    proxied: Option<Client>,
}

impl HttpFetcher {
    /// Creates a direct fetcher with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Config`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, MirrorError> {
        Self::with_options(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS, None)
    }

    /// Creates a fetcher from the mirror configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Config`] if the proxy URL is invalid or the
    /// HTTP client cannot be built.
    pub fn from_config(config: &MirrorConfig) -> Result<Self, MirrorError> {
        Self::with_options(
            config.connect_timeout_secs,
            config.read_timeout_secs,
            config.proxy.as_deref(),
        )
    }

    /// Creates a fetcher with explicit timeouts and an optional proxy URL.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Config`] if the proxy URL is invalid or the
    /// HTTP client cannot be built.
    #[instrument(level = "debug")]
    pub fn with_options(
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
        proxy: Option<&str>,
    ) -> Result<Self, MirrorError> {
        let direct = build_client(connect_timeout_secs, read_timeout_secs, None)?;
        let proxied = proxy
            .map(|proxy_url| build_client(connect_timeout_secs, read_timeout_secs, Some(proxy_url)))
            .transpose()?;

        debug!(proxy_enabled = proxied.is_some(), "created HTTP fetcher");
        Ok(Self { direct, proxied })
    }

    /// True when requests are routed through a proxy first.
    #[must_use]
    pub fn uses_proxy(&self) -> bool {
        self.proxied.is_some()
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    #[instrument(skip(self), fields(url = %url))]
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;

        if let Some(proxied) = &self.proxied {
            match send(proxied, url).await {
                Ok(response) => return Ok(response),
                Err(e @ (FetchError::Transport { .. } | FetchError::Timeout { .. })) => {
                    warn!(error = %e, "proxied fetch failed, falling back to direct fetch");
                }
                Err(e) => return Err(e),
            }
        }

        send(&self.direct, url).await
    }
}

async fn send(client: &Client, url: &str) -> Result<FetchResponse, FetchError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| FetchError::transport(url, e))?;

    let status = response.status().as_u16();
    let body = response
        .bytes()
        .await
        .map_err(|e| FetchError::transport(url, e))?;

    debug!(status, bytes = body.len(), "fetched");
    Ok(FetchResponse {
        url: url.to_string(),
        status,
        body,
    })
}

fn build_client(
    connect_timeout_secs: u64,
    read_timeout_secs: u64,
    proxy: Option<&str>,
) -> Result<Client, MirrorError> {
    let mut builder = Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .timeout(Duration::from_secs(read_timeout_secs))
        .gzip(true)
        .user_agent(user_agent::default_user_agent());

    if let Some(proxy_url) = proxy {
        let resolved = Proxy::all(proxy_url)
            .map_err(|e| MirrorError::config(format!("invalid proxy URL {proxy_url}: {e}")))?;
        builder = builder.proxy(resolved);
    }

    builder
        .build()
        .map_err(|e| MirrorError::config(format!("failed to build HTTP client: {e}")))
}
