// Copyright 2026 Oxide Computer Company

//! Error types for acquisition and the git commands it runs.

use camino::Utf8PathBuf;
use std::{ffi::OsString, fmt, io};
use thiserror::Error;

// ---- Git command errors ----

/// An error from reading the git binary path from the environment.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GitEnvError {
    /// The environment variable is set but is not valid UTF-8.
    #[error(
        "${var} environment variable is not valid \
         UTF-8: {value:?}"
    )]
    NonUtf8 {
        /// The environment variable name.
        var: &'static str,
        /// The non-UTF-8 value.
        value: OsString,
    },
}

/// An error from running a single git command.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GitCommandError {
    /// Failed to spawn the git process.
    #[error("failed to run `git {command}` using {binary_path:?}")]
    SpawnFailed {
        /// The path to the git executable.
        binary_path: String,
        /// The arguments passed to git, joined by spaces.
        command: String,
        /// The working directory the command was run in, if any.
        working_dir: Option<Utf8PathBuf>,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The git command exited unsuccessfully.
    #[error("`git {command}` failed ({exit_status}): {stderr}")]
    Failed {
        /// The arguments passed to git, joined by spaces.
        command: String,
        /// A human-readable description of the exit status (e.g.,
        /// "exit code 128" or "terminated by signal").
        exit_status: String,
        /// The stderr output from git, trimmed.
        stderr: String,
    },
}

// ---- Acquisition errors ----

/// The phase of an acquisition in which an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Phase {
    /// Resolving the local path, mirror path and git binary.
    Resolve,
    /// Initializing the repository, configuring remotes and fetching.
    Fetch,
    /// Checking out the requested refspec.
    Checkout,
    /// Applying patches.
    Patch,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Resolve => write!(f, "resolve"),
            Phase::Fetch => write!(f, "fetch"),
            Phase::Checkout => write!(f, "checkout"),
            Phase::Patch => write!(f, "patch"),
        }
    }
}

/// Errors that abort an acquisition.
///
/// Every error is fatal: the remaining phases are not run, and the working
/// copy is left as the last successful git command produced it.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AcquireError {
    /// The `$GIT` environment variable could not be read.
    #[error(transparent)]
    Env(#[from] GitEnvError),

    /// Checking whether the working copy exists failed.
    #[error("failed to check for an existing working copy at {local_path}")]
    LocalPath {
        /// The working copy path.
        local_path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        error: io::Error,
    },

    /// The local path exists but is not the top level of a git working
    /// copy.
    ///
    /// This covers a plain directory, including one nested inside some other
    /// repository, which git would otherwise operate on instead.
    #[error("{local_path} exists but is not a git working copy")]
    NotWorkingCopy {
        /// The working copy path.
        local_path: Utf8PathBuf,
        /// The top level git reported for the path, if it is inside a
        /// working copy at all.
        toplevel: Option<Utf8PathBuf>,
    },

    /// Git could not be run to find the top level of the working copy.
    #[error("failed to inspect working copy at {local_path}")]
    Toplevel {
        /// The working copy path.
        local_path: Utf8PathBuf,
        /// The underlying git error.
        #[source]
        error: GitCommandError,
    },

    /// `git init` failed.
    #[error("failed to initialize repository at {local_path}")]
    Init {
        /// The working copy path.
        local_path: Utf8PathBuf,
        /// The underlying git error.
        #[source]
        error: GitCommandError,
    },

    /// Adding a remote failed.
    #[error("failed to add remote {remote} ({url}) in {local_path}")]
    AddRemote {
        /// The working copy path.
        local_path: Utf8PathBuf,
        /// The remote name.
        remote: &'static str,
        /// The URL the remote was to point at.
        url: String,
        /// The underlying git error.
        #[source]
        error: GitCommandError,
    },

    /// Reading a remote's configured URL failed.
    #[error("failed to read URL of remote {remote} in {local_path}")]
    GetRemoteUrl {
        /// The working copy path.
        local_path: Utf8PathBuf,
        /// The remote name.
        remote: &'static str,
        /// The underlying git error.
        #[source]
        error: GitCommandError,
    },

    /// Rewriting a remote's URL failed.
    #[error("failed to set URL of remote {remote} to {url} in {local_path}")]
    SetRemoteUrl {
        /// The working copy path.
        local_path: Utf8PathBuf,
        /// The remote name.
        remote: &'static str,
        /// The new URL.
        url: String,
        /// The underlying git error.
        #[source]
        error: GitCommandError,
    },

    /// Fetching a remote failed.
    #[error("failed to fetch remote {remote} in {local_path}")]
    Fetch {
        /// The working copy path.
        local_path: Utf8PathBuf,
        /// The remote name.
        remote: &'static str,
        /// The underlying git error.
        #[source]
        error: GitCommandError,
    },

    /// Git could not be run to check for a remote-tracking branch.
    ///
    /// A missing reference is not an error; this only covers failures to
    /// run git at all.
    #[error("failed to look up {reference} in {local_path}")]
    VerifyRef {
        /// The working copy path.
        local_path: Utf8PathBuf,
        /// The fully-qualified reference that was looked up.
        reference: String,
        /// The underlying git error.
        #[source]
        error: GitCommandError,
    },

    /// Checking out the refspec failed.
    #[error("failed to check out {refspec} in {local_path}")]
    Checkout {
        /// The working copy path.
        local_path: Utf8PathBuf,
        /// The requested refspec.
        refspec: String,
        /// Whether a detached checkout was attempted.
        detached: bool,
        /// The underlying git error.
        #[source]
        error: GitCommandError,
    },

    /// A patch path could not be made absolute.
    #[error("failed to resolve absolute path of patch {patch}")]
    PatchPath {
        /// The patch path as supplied.
        patch: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        error: io::Error,
    },

    /// Applying a patch failed.
    ///
    /// Patches before `index` remain applied. The failed `git am` session is
    /// aborted, and later patches were not attempted.
    #[error("failed to apply patch {patch} in {local_path}")]
    ApplyPatch {
        /// The working copy path.
        local_path: Utf8PathBuf,
        /// The absolute path of the patch.
        patch: Utf8PathBuf,
        /// The zero-based position of the patch in the request.
        index: usize,
        /// The underlying git error.
        #[source]
        error: GitCommandError,
    },
}

impl AcquireError {
    /// Returns the phase in which this error occurred.
    pub fn phase(&self) -> Phase {
        match self {
            AcquireError::Env(_) => Phase::Resolve,
            AcquireError::LocalPath { .. }
            | AcquireError::NotWorkingCopy { .. }
            | AcquireError::Toplevel { .. }
            | AcquireError::Init { .. }
            | AcquireError::AddRemote { .. }
            | AcquireError::GetRemoteUrl { .. }
            | AcquireError::SetRemoteUrl { .. }
            | AcquireError::Fetch { .. } => Phase::Fetch,
            AcquireError::VerifyRef { .. } | AcquireError::Checkout { .. } => {
                Phase::Checkout
            }
            AcquireError::PatchPath { .. }
            | AcquireError::ApplyPatch { .. } => Phase::Patch,
        }
    }
}
