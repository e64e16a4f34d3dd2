//! Site Mirror Library
//!
//! Copies a website's index page, the pages it links to, and their
//! stylesheets, scripts and images into a local directory that mirrors
//! the site's URL layout.
//!
//! # Architecture
//!
//! - [`config`] - run configuration (JSON file plus command-line overrides)
//! - [`mirror`] - fetching, extraction, dispatch and the crawl itself

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod mirror;
mod user_agent;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::{ConfigOverrides, MirrorConfig};
pub use mirror::{
    DEFAULT_CONCURRENCY, DownloadDispatcher, DownloadStats, Fetch, FetchError, HttpFetcher,
    Mirror, MirrorError, MirrorSummary,
};
