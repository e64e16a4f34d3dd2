//! Bounded-concurrency task dispatch with completion tracking.
//!
//! # Concurrency Model
//!
//! - Each submitted task runs in its own Tokio task
//! - The pending counter is incremented inside [`DownloadDispatcher::submit`]
//!   before the task is spawned, so a parent that submits children while it
//!   runs always keeps the counter above zero until they are registered
//! - A semaphore permit is acquired inside the spawned task; submitting
//!   never blocks, even from a task that holds a permit
//! - Permit release and counter decrement happen in drop guards and so run
//!   on every exit path, panics included
//! - A failed page task records the run's fatal error and wakes
//!   [`DownloadDispatcher::wait_all`]; failed assets are only counted

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Notify, Semaphore};
use tracing::{debug, error, info, instrument, warn};

use super::constants::{MAX_CONCURRENCY, MIN_CONCURRENCY};
use super::error::MirrorError;
use super::path::{ReferenceKind, ResolvedTarget, should_skip};

/// A unit of work: where to fetch from, where to save, and what it is.
#[derive(Debug, Clone)]
pub struct DownloadTask {
    /// Remote URL and local path.
    pub target: ResolvedTarget,
    /// Resource kind; [`ReferenceKind::Html`] marks a page task.
    pub kind: ReferenceKind,
}

impl DownloadTask {
    /// Creates a task.
    #[must_use]
    pub fn new(target: ResolvedTarget, kind: ReferenceKind) -> Self {
        Self { target, kind }
    }
}

/// How a task that did not fail ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Bytes were fetched and written.
    Saved {
        /// Where they were written.
        path: PathBuf,
        /// How many.
        bytes: usize,
    },
    /// The target already existed.
    Skipped {
        /// The existing path.
        path: PathBuf,
    },
}

/// Live counters for a mirror run.
///
/// Uses atomic counters for thread-safe updates from concurrent tasks.
#[derive(Debug, Default)]
pub struct DownloadStats {
    saved: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
}

impl DownloadStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of files written.
    #[must_use]
    pub fn saved(&self) -> usize {
        self.saved.load(Ordering::SeqCst)
    }

    /// Returns the number of tasks whose target already existed.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }

    /// Returns the number of failed tasks.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Returns a point-in-time copy of the counters.
    #[must_use]
    pub fn summary(&self) -> MirrorSummary {
        MirrorSummary {
            saved: self.saved(),
            skipped: self.skipped(),
            failed: self.failed(),
        }
    }
}

/// Final counts of a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorSummary {
    /// Files written.
    pub saved: usize,
    /// Targets already present.
    pub skipped: usize,
    /// Failed tasks.
    pub failed: usize,
}

impl MirrorSummary {
    /// Returns the number of tasks that reached done.
    #[must_use]
    pub fn total(&self) -> usize {
        self.saved + self.skipped + self.failed
    }
}

#[derive(Debug)]
struct DispatcherState {
    semaphore: Semaphore,
    concurrency: usize,
    pending: AtomicUsize,
    idle: Notify,
    fatal: Mutex<Option<MirrorError>>,
    stats: DownloadStats,
}

impl DispatcherState {
    fn record(&self, task: &DownloadTask, result: Result<TaskOutcome, MirrorError>) {
        let url = task.target.remote_url.as_str();
        match result {
            Ok(TaskOutcome::Saved { path, bytes }) => {
                info!(kind = %task.kind, url, path = %path.display(), bytes, "saved");
                self.stats.saved.fetch_add(1, Ordering::SeqCst);
            }
            Ok(TaskOutcome::Skipped { path }) => {
                info!(kind = %task.kind, url, path = %path.display(), "already present, skipped");
                self.stats.skipped.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) if task.kind.is_page() => {
                error!(kind = %task.kind, url, error = %e, "page failed, aborting mirror");
                self.stats.failed.fetch_add(1, Ordering::SeqCst);
                let mut fatal = self.fatal.lock().unwrap_or_else(PoisonError::into_inner);
                if fatal.is_none() {
                    *fatal = Some(e);
                }
                drop(fatal);
                self.idle.notify_waiters();
            }
            Err(e) => {
                warn!(kind = %task.kind, url, error = %e, "asset failed, skipping");
                self.stats.failed.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

/// Decrements the pending counter when a task ends, however it ends.
struct CompletionGuard {
    state: Arc<DispatcherState>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        let remaining = self.state.pending.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining == 0 {
            self.state.idle.notify_waiters();
        }
    }
}

/// Runs download tasks under a fixed concurrency cap.
///
/// Cheap to clone; clones share the same pool, counter and statistics, so
/// a running task can hold a clone and submit the references it discovers.
#[derive(Debug, Clone)]
pub struct DownloadDispatcher {
    state: Arc<DispatcherState>,
}

impl DownloadDispatcher {
    /// Creates a dispatcher allowing `concurrency` tasks in flight.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::InvalidConcurrency`] if the value is outside
    /// 1..=100.
    #[instrument(level = "debug")]
    pub fn new(concurrency: usize) -> Result<Self, MirrorError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(MirrorError::InvalidConcurrency { value: concurrency });
        }

        Ok(Self {
            state: Arc::new(DispatcherState {
                semaphore: Semaphore::new(concurrency),
                concurrency,
                pending: AtomicUsize::new(0),
                idle: Notify::new(),
                fatal: Mutex::new(None),
                stats: DownloadStats::new(),
            }),
        })
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.state.concurrency
    }

    /// Returns the number of submitted tasks not yet done.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.pending.load(Ordering::SeqCst)
    }

    /// Returns the live statistics.
    #[must_use]
    pub fn stats(&self) -> &DownloadStats {
        &self.state.stats
    }

    /// Schedules `work` for `task`.
    ///
    /// Once a slot is free the target path is checked first; if a file is
    /// already there the task ends as skipped and `work` is dropped without
    /// being polled. Must be called from within a Tokio runtime.
    pub fn submit<F>(&self, task: DownloadTask, work: F)
    where
        F: Future<Output = Result<TaskOutcome, MirrorError>> + Send + 'static,
    {
        self.state.pending.fetch_add(1, Ordering::SeqCst);
        let guard = CompletionGuard {
            state: Arc::clone(&self.state),
        };
        debug!(kind = %task.kind, url = %task.target.remote_url, "task submitted");

        tokio::spawn(async move {
            let state = Arc::clone(&guard.state);
            let Ok(permit) = state.semaphore.acquire().await else {
                warn!(url = %task.target.remote_url, "semaphore closed, task dropped");
                return;
            };

            let path = &task.target.local_path;
            let result = if should_skip(path).await {
                Ok(TaskOutcome::Skipped { path: path.clone() })
            } else {
                work.await
            };
            state.record(&task, result);

            drop(permit);
            drop(guard);
        });
    }

    /// Waits until every submitted task is done, including tasks submitted
    /// while waiting.
    ///
    /// # Errors
    ///
    /// Returns the first page failure as soon as it is recorded, without
    /// waiting for the remaining tasks.
    pub async fn wait_all(&self) -> Result<MirrorSummary, MirrorError> {
        loop {
            let notified = self.state.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let fatal = self
                .state
                .fatal
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some(e) = fatal {
                return Err(e);
            }
            if self.pending() == 0 {
                return Ok(self.state.stats.summary());
            }

            notified.await;
        }
    }
}
