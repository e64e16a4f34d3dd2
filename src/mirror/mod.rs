//! Mirror engine.
//!
//! # Architecture
//!
//! - [`path`] - reference resolution and on-disk existence checks
//! - [`client`] - the [`Fetch`] trait and its reqwest implementation
//! - [`extract`] - HTML selector queries and CSS `url(...)` scanning
//! - [`dispatcher`] - bounded task pool with completion tracking
//! - [`orchestrator`] - the crawl itself, tying the above together
//!
//! # Example
//!
//! ```
//! use site_mirror::mirror::{PathResolver, Reference, ReferenceKind};
//!
//! let resolver = PathResolver::new("https://example.com/theme", "out");
//! let reference = Reference::new("index.html", ReferenceKind::Image, "img/logo.png?v=2");
//! let target = resolver.resolve(&reference).unwrap();
//!
//! assert_eq!(target.remote_url, "https://example.com/theme/img/logo.png");
//! assert_eq!(target.local_path, std::path::Path::new("out/img/logo.png"));
//! ```

pub mod client;
pub mod constants;
pub mod dispatcher;
pub mod error;
pub mod extract;
pub mod orchestrator;
pub mod path;

pub use client::{Fetch, FetchResponse, FetchedPage, HttpFetcher};
pub use constants::{DEFAULT_CONCURRENCY, MAX_CONCURRENCY, MIN_CONCURRENCY};
pub use dispatcher::{DownloadDispatcher, DownloadStats, DownloadTask, MirrorSummary, TaskOutcome};
pub use error::{FetchError, MirrorError};
pub use extract::{
    PageAssets, PageDocument, extract_from_css, extract_from_html, is_external,
    is_followable_page,
};
pub use orchestrator::Mirror;
pub use path::{
    PathResolver, Reference, ReferenceKind, ResolvedTarget, css_relative_path, should_skip,
    strip_suffix, write_file,
};
