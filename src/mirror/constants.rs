//! Constants for the mirror module (timeouts, concurrency bounds).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large assets).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Minimum allowed concurrency value.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 100;

/// Default number of simultaneous fetches.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Default page fetched first.
pub const DEFAULT_INDEX_PATH: &str = "index.html";
