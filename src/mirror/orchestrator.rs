//! Crawl orchestration: index first, then assets and pages as tasks.
//!
//! # Overview
//!
//! [`Mirror::run`] fetches and saves the index page, then dispatches one
//! task per stylesheet, script and image reference it contains, plus one
//! page task per followable link. Page tasks repeat the same sequence for
//! their own page; stylesheet tasks dispatch the images their CSS points
//! at. The run ends when the dispatcher has drained.
//!
//! Failure handling is split by role: an index or page that cannot be
//! fetched or saved aborts the run, a broken asset is logged and dropped.
//!
//! # Example
//!
//! ```no_run
//! use site_mirror::{Mirror, MirrorConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MirrorConfig::for_site("https://example.com/theme/");
//! let summary = Mirror::with_http(config)?.run().await?;
//! println!("saved {} files", summary.saved);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use tracing::{debug, info, instrument, trace, warn};

use super::client::{Fetch, FetchedPage, HttpFetcher};
use super::dispatcher::{DownloadDispatcher, DownloadTask, MirrorSummary, TaskOutcome};
use super::error::MirrorError;
use super::extract::{extract_from_css, extract_from_html, is_external};
use super::path::{PathResolver, Reference, ReferenceKind, should_skip, write_file};
use crate::config::MirrorConfig;

/// One mirror run over one site.
///
/// Cheap to clone: tasks carry a clone so they can dispatch what they find.
#[derive(Clone)]
pub struct Mirror {
    config: Arc<MirrorConfig>,
    resolver: Arc<PathResolver>,
    fetcher: Arc<dyn Fetch>,
    dispatcher: DownloadDispatcher,
}

impl Mirror {
    /// Creates a mirror run with a caller-supplied fetcher.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Config`] or [`MirrorError::InvalidConcurrency`]
    /// if the configuration does not validate.
    pub fn new(config: MirrorConfig, fetcher: Arc<dyn Fetch>) -> Result<Self, MirrorError> {
        let config = config.validate()?;
        let resolver = PathResolver::new(config.site_url.clone(), config.save_dir.clone());
        let dispatcher = DownloadDispatcher::new(config.concurrency)?;

        debug!(
            site = %config.site_url,
            save_dir = %config.save_dir.display(),
            concurrency = config.concurrency,
            proxy = config.proxy.is_some(),
            "creating mirror"
        );

        Ok(Self {
            config: Arc::new(config),
            resolver: Arc::new(resolver),
            fetcher,
            dispatcher,
        })
    }

    /// Creates a mirror run backed by [`HttpFetcher`].
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Config`] if the configuration does not
    /// validate or the HTTP client cannot be built.
    pub fn with_http(config: MirrorConfig) -> Result<Self, MirrorError> {
        let config = config.validate()?;
        let fetcher = HttpFetcher::from_config(&config)?;
        debug!(via_proxy = fetcher.uses_proxy(), "HTTP fetcher ready");
        Self::new(config, Arc::new(fetcher))
    }

    /// Returns the validated configuration.
    #[must_use]
    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// Mirrors the site and waits for every task.
    ///
    /// # Errors
    ///
    /// Returns the error of the index fetch or save, or of the first page
    /// task that failed. Asset failures only show up in the summary.
    #[instrument(skip(self), fields(site = %self.config.site_url))]
    pub async fn run(&self) -> Result<MirrorSummary, MirrorError> {
        info!(save_dir = %self.config.save_dir.display(), "mirror starting");

        let index = self
            .resolver
            .resolve_raw(&self.config.index_path)
            .ok_or_else(|| MirrorError::config("`index_path` resolves to nothing"))?;

        let page = self.fetcher.fetch_page(&index.remote_url).await?;
        write_file(&index.local_path, &page.body).await?;
        info!(url = %index.remote_url, path = %index.local_path.display(), "index saved");

        self.dispatch_page(&index.relative_path, &page).await;

        debug!(pending = self.dispatcher.pending(), "waiting for tasks");
        let summary = self.dispatcher.wait_all().await?;
        info!(
            saved = summary.saved,
            skipped = summary.skipped,
            failed = summary.failed,
            "mirror complete"
        );
        Ok(summary)
    }

    /// Extracts a page's references and submits a task for each.
    async fn dispatch_page(&self, page_path: &str, page: &FetchedPage) {
        let assets = extract_from_html(&page.document());
        debug!(
            page = page_path,
            assets = assets.asset_count(),
            pages = assets.page_links.len(),
            "page references extracted"
        );

        for raw in assets.css {
            let reference = Reference::new(page_path, ReferenceKind::Css, raw);
            if let Some(task) = self.checked_task(&reference).await {
                self.dispatcher.submit(task.clone(), self.clone().save_stylesheet(task));
            }
        }

        for raw in assets.js {
            let reference = Reference::new(page_path, ReferenceKind::Js, raw);
            if let Some(task) = self.checked_task(&reference).await {
                self.dispatcher.submit(task.clone(), self.clone().save_asset(task));
            }
        }

        for raw in assets.img {
            let reference = Reference::new(page_path, ReferenceKind::Image, raw);
            if let Some(task) = self.task_for(&reference) {
                self.dispatcher.submit(task.clone(), self.clone().save_asset(task));
            }
        }

        for raw in assets.page_links {
            let reference = Reference::new(page_path, ReferenceKind::Html, raw);
            if let Some(task) = self.task_for(&reference) {
                self.dispatcher.submit(task.clone(), self.clone().mirror_page(task));
            }
        }
    }

    /// Resolves a reference into a task, dropping external and malformed
    /// ones.
    fn task_for(&self, reference: &Reference) -> Option<DownloadTask> {
        if is_external(&reference.raw_value) {
            warn!(
                kind = %reference.kind,
                page = %reference.source,
                reference = %reference.raw_value,
                "external reference, not mirrored"
            );
            return None;
        }

        let Some(target) = self.resolver.resolve(reference) else {
            trace!(reference = %reference.raw_value, "malformed reference skipped");
            return None;
        };
        Some(DownloadTask::new(target, reference.kind))
    }

    /// Like [`Self::task_for`], and also drops targets already on disk.
    async fn checked_task(&self, reference: &Reference) -> Option<DownloadTask> {
        let task = self.task_for(reference)?;
        if should_skip(&task.target.local_path).await {
            warn!(
                kind = %reference.kind,
                path = %task.target.local_path.display(),
                "already present, not dispatched"
            );
            return None;
        }
        Some(task)
    }

    /// Fetches an opaque asset and writes it untouched.
    async fn save_asset(self, task: DownloadTask) -> Result<TaskOutcome, MirrorError> {
        let body = self.fetcher.fetch_bytes(&task.target.remote_url).await?;
        write_file(&task.target.local_path, &body).await?;
        Ok(TaskOutcome::Saved {
            path: task.target.local_path,
            bytes: body.len(),
        })
    }

    /// Saves a stylesheet, then dispatches the images its CSS refers to.
    async fn save_stylesheet(self, task: DownloadTask) -> Result<TaskOutcome, MirrorError> {
        let body = self.fetcher.fetch_bytes(&task.target.remote_url).await?;
        write_file(&task.target.local_path, &body).await?;

        match std::str::from_utf8(&body) {
            Ok(css) => {
                let css_path = task.target.relative_path.as_str();
                for image in extract_from_css(css_path, css) {
                    let reference = Reference::new(css_path, ReferenceKind::CssImage, image);
                    if let Some(image_task) = self.task_for(&reference) {
                        self.dispatcher
                            .submit(image_task.clone(), self.clone().save_asset(image_task));
                    }
                }
            }
            Err(_) => trace!(path = %task.target.local_path.display(), "not UTF-8, no css scan"),
        }

        Ok(TaskOutcome::Saved {
            path: task.target.local_path,
            bytes: body.len(),
        })
    }

    /// Fetches and saves a page, then dispatches its references.
    ///
    /// The file is written before the page's own links are dispatched, so
    /// a link back to this page finds it on disk and stops there.
    fn mirror_page(
        self,
        task: DownloadTask,
    ) -> BoxFuture<'static, Result<TaskOutcome, MirrorError>> {
        async move {
            let page = self.fetcher.fetch_page(&task.target.remote_url).await?;
            write_file(&task.target.local_path, &page.body).await?;
            self.dispatch_page(&task.target.relative_path, &page)
                .await;

            Ok(TaskOutcome::Saved {
                path: task.target.local_path,
                bytes: page.body.len(),
            })
        }
        .boxed()
    }
}
