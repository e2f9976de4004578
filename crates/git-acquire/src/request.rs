// Copyright 2026 Oxide Computer Company

//! Acquisition requests and path resolution.

use camino::{Utf8Path, Utf8PathBuf};
use url::Url;

/// The refspec checked out when none is given.
pub const DEFAULT_REFSPEC: &str = "main";

/// A request to acquire a working copy of a single git reference.
///
/// Construct with [`AcquisitionRequest::new`] and the `with_*` methods. A
/// request is plain data: nothing touches the filesystem until it is turned
/// into an [`Acquisition`](crate::Acquisition).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionRequest {
    source: String,
    refspec: String,
    local_path: Option<Utf8PathBuf>,
    patches: Vec<Utf8PathBuf>,
    mirror_root: Option<Utf8PathBuf>,
}

impl AcquisitionRequest {
    /// Creates a request for `source` with the default refspec, a derived
    /// local path, no patches and no mirror root.
    pub fn new(source: impl Into<String>) -> Self {
        AcquisitionRequest {
            source: source.into(),
            refspec: DEFAULT_REFSPEC.to_owned(),
            local_path: None,
            patches: Vec::new(),
            mirror_root: None,
        }
    }

    /// Sets the branch, tag or commit to check out.
    pub fn with_refspec(mut self, refspec: impl Into<String>) -> Self {
        self.refspec = refspec.into();
        self
    }

    /// Sets the path of the working copy.
    pub fn with_local_path(
        mut self,
        local_path: impl Into<Utf8PathBuf>,
    ) -> Self {
        self.local_path = Some(local_path.into());
        self
    }

    /// Appends a patch to apply after checkout.
    pub fn with_patch(mut self, patch: impl Into<Utf8PathBuf>) -> Self {
        self.patches.push(patch.into());
        self
    }

    /// Appends several patches, preserving their order.
    pub fn with_patches<I, P>(mut self, patches: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Utf8PathBuf>,
    {
        self.patches.extend(patches.into_iter().map(Into::into));
        self
    }

    /// Sets the root directory of local mirrors, keyed by host and path.
    pub fn with_mirror_root(
        mut self,
        mirror_root: impl Into<Utf8PathBuf>,
    ) -> Self {
        self.mirror_root = Some(mirror_root.into());
        self
    }

    /// Returns the source URI.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the refspec to check out.
    pub fn refspec(&self) -> &str {
        &self.refspec
    }

    /// Returns the explicitly requested local path, if any.
    pub fn local_path(&self) -> Option<&Utf8Path> {
        self.local_path.as_deref()
    }

    /// Returns the patches, in application order.
    pub fn patches(&self) -> &[Utf8PathBuf] {
        &self.patches
    }

    /// Returns the mirror root, if any.
    pub fn mirror_root(&self) -> Option<&Utf8Path> {
        self.mirror_root.as_deref()
    }

    /// Returns the explicit local path, or the one derived from the source.
    pub(crate) fn resolve_local_path(&self) -> Utf8PathBuf {
        match &self.local_path {
            Some(path) => path.clone(),
            None => default_local_path(&self.source),
        }
    }

    /// Returns the mirror for the source if a mirror root is set and the
    /// mirror exists as a directory right now.
    pub(crate) fn resolve_mirror(&self) -> Option<Utf8PathBuf> {
        let mirror_root = self.mirror_root.as_deref()?;
        let mirror =
            mirror_path_for(&absolute_or_given(mirror_root), &self.source);
        mirror.is_dir().then_some(mirror)
    }
}

/// Returns the default working copy path for `source`.
///
/// This is the last path segment of `source`, with a `.git` suffix
/// stripped. Trailing slashes are ignored.
///
/// # Examples
///
/// ```
/// use git_acquire::default_local_path;
///
/// assert_eq!(default_local_path("https://example.com/foo.git"), "foo");
/// assert_eq!(default_local_path("https://example.com/foo"), "foo");
/// ```
pub fn default_local_path(source: &str) -> Utf8PathBuf {
    let trimmed = source.trim_end_matches('/');
    let basename = trimmed.rsplit('/').next().unwrap_or(trimmed);
    Utf8PathBuf::from(basename.strip_suffix(".git").unwrap_or(basename))
}

/// Returns where a mirror of `source` would live under `mirror_root`.
///
/// The mirror path is `mirror_root/<host>/<path>`. A `source` that does not
/// parse as a URI contributes an empty host and path, so the result is
/// `mirror_root` itself. This never fails and does not check that the path
/// exists.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use git_acquire::mirror_path_for;
///
/// let root = Utf8Path::new("/srv/mirrors");
/// assert_eq!(
///     mirror_path_for(root, "https://example.com/org/foo.git"),
///     "/srv/mirrors/example.com/org/foo.git",
/// );
/// ```
pub fn mirror_path_for(mirror_root: &Utf8Path, source: &str) -> Utf8PathBuf {
    let (host, path) = match Url::parse(source) {
        Ok(url) => {
            let host = url.host_str().unwrap_or_default().to_owned();
            let path = url.path();
            let path = path.strip_prefix('/').unwrap_or(path).to_owned();
            (host, path)
        }
        Err(_) => (String::new(), String::new()),
    };

    let mut mirror = mirror_root.to_owned();
    for component in [host, path] {
        if !component.is_empty() {
            mirror.push(component);
        }
    }
    mirror
}

/// Makes `path` absolute against the current directory, falling back to
/// `path` unchanged.
///
/// The mirror URL is stored in the repository config and used from inside
/// the working copy, so it must not be relative to the caller's directory.
fn absolute_or_given(path: &Utf8Path) -> Utf8PathBuf {
    std::path::absolute(path)
        .ok()
        .and_then(|p| Utf8PathBuf::from_path_buf(p).ok())
        .unwrap_or_else(|| path.to_owned())
}
