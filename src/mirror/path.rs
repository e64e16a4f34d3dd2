//! Reference-to-path resolution and the on-disk existence guard.
//!
//! Every discovered reference is a site-relative string. Resolution strips
//! the query and fragment, then joins the remainder onto the save root for
//! the local path and onto the site base URL for the remote URL. The same
//! cleaned string always yields the same pair.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use super::error::MirrorError;

/// What kind of resource a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    /// `<link href>`, normally a stylesheet.
    Css,
    /// `<script src>`.
    Js,
    /// `<img src>`.
    Image,
    /// `<a href>` to another page of the site.
    Html,
    /// `url(...)` inside a downloaded stylesheet.
    CssImage,
}

impl ReferenceKind {
    /// Returns the stable lowercase label used in log fields.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Css => "css",
            Self::Js => "js",
            Self::Image => "image",
            Self::Html => "html",
            Self::CssImage => "css_image",
        }
    }

    /// Pages abort the run on failure; everything else is an asset.
    #[must_use]
    pub fn is_page(self) -> bool {
        matches!(self, Self::Html)
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource mention discovered in a page or stylesheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Site-relative path of the page or stylesheet the mention came from.
    pub source: String,
    /// Resource kind.
    pub kind: ReferenceKind,
    /// The raw value as found. For [`ReferenceKind::CssImage`] this is
    /// already joined onto the stylesheet's directory.
    pub raw_value: String,
}

impl Reference {
    /// Creates a reference.
    pub fn new(source: impl Into<String>, kind: ReferenceKind, raw_value: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            kind,
            raw_value: raw_value.into(),
        }
    }
}

/// Concrete remote URL and local path for a reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Absolute URL to fetch.
    pub remote_url: String,
    /// Site-relative path after suffix stripping.
    pub relative_path: String,
    /// Where the bytes are written.
    pub local_path: PathBuf,
}

/// Maps references onto the configured site URL and save root.
#[derive(Debug, Clone)]
pub struct PathResolver {
    base_url: String,
    save_root: PathBuf,
}

impl PathResolver {
    /// Creates a resolver. `base_url` gets a trailing `/` if it lacks one.
    pub fn new(base_url: impl Into<String>, save_root: impl Into<PathBuf>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            base_url,
            save_root: save_root.into(),
        }
    }

    /// Returns the site base URL (always ends in `/`).
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the save root directory.
    #[must_use]
    pub fn save_root(&self) -> &Path {
        &self.save_root
    }

    /// Resolves a reference into its remote URL and local path.
    ///
    /// Returns `None` when nothing is left after stripping the suffix and
    /// leading slashes, or when `..` segments climb above the save root;
    /// such references are malformed and get skipped. `..` segments that
    /// stay inside the root are kept as written.
    #[must_use]
    pub fn resolve(&self, reference: &Reference) -> Option<ResolvedTarget> {
        self.resolve_raw(&reference.raw_value)
    }

    /// Resolves a raw site-relative string.
    #[must_use]
    pub fn resolve_raw(&self, raw: &str) -> Option<ResolvedTarget> {
        let relative = strip_suffix(raw).trim_start_matches('/');
        if relative.is_empty() {
            trace!(raw, "reference is empty after stripping");
            return None;
        }
        if escapes_root(relative) {
            trace!(raw, "reference climbs above the save root");
            return None;
        }

        Some(ResolvedTarget {
            remote_url: format!("{}{relative}", self.base_url),
            relative_path: relative.to_string(),
            local_path: self.save_root.join(relative),
        })
    }
}

/// Cuts a reference at its first `?` or `#`.
#[must_use]
pub fn strip_suffix(raw: &str) -> &str {
    match raw.find(['?', '#']) {
        Some(index) => &raw[..index],
        None => raw,
    }
}

/// True when `..` segments take `relative` above its starting directory.
fn escapes_root(relative: &str) -> bool {
    let mut depth = 0usize;
    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => match depth.checked_sub(1) {
                Some(up) => depth = up,
                None => return true,
            },
            _ => depth += 1,
        }
    }
    false
}

/// Joins an image path found inside a stylesheet onto the stylesheet's
/// directory. A stylesheet without a slash lives at the site root.
///
/// Leading slashes on `image_path` are dropped, so `/img/x.png` inside
/// `css/site.css` becomes `css/img/x.png`.
#[must_use]
pub fn css_relative_path(css_path: &str, image_path: &str) -> String {
    let css_path = strip_suffix(css_path);
    let image_path = image_path.trim_start_matches('/');
    match css_path.rfind('/') {
        Some(index) => format!("{}/{image_path}", &css_path[..index]),
        None => image_path.to_string(),
    }
}

/// Returns true if a file is already present at `path`.
///
/// This is the only dedup and cycle-breaking mechanism. Two tasks for the
/// same path can both observe `false` before either writes; the later write
/// wins.
pub async fn should_skip(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_file())
}

/// Writes `bytes` to `path`, creating parent directories first.
///
/// # Errors
///
/// Returns [`MirrorError::Io`] if a directory cannot be created or the file
/// cannot be written.
pub async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), MirrorError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| MirrorError::io(parent, e))?;
    }

    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| MirrorError::io(path, e))?;

    debug!(path = %path.display(), bytes = bytes.len(), "file written");
    Ok(())
}
