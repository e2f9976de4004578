// Copyright 2026 Oxide Computer Company

//! Progress reporting for acquisitions.

use camino::Utf8Path;
use std::fmt;
use tracing::{debug, info, warn};

/// A step taken by an acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum AcquireEvent<'a> {
    /// The acquisition has started.
    Acquiring {
        /// The source URI.
        source: &'a str,
    },
    /// No working copy exists; a fresh repository is being set up.
    Cloning {
        /// The working copy path.
        local_path: &'a Utf8Path,
    },
    /// A working copy exists and is being updated.
    Fetching {
        /// The working copy path.
        local_path: &'a Utf8Path,
    },
    /// A remote was added.
    RemoteAdded {
        /// The remote name.
        remote: &'a str,
        /// The remote URL.
        url: &'a str,
    },
    /// A remote's URL differed from the requested one and was rewritten.
    RemoteUrlReplaced {
        /// The remote name.
        remote: &'a str,
        /// The previously configured URL.
        previous: &'a str,
        /// The new URL.
        url: &'a str,
    },
    /// A remote was fetched.
    RemoteFetched {
        /// The remote name.
        remote: &'a str,
    },
    /// The refspec is being checked out.
    CheckingOut {
        /// The requested refspec.
        refspec: &'a str,
    },
    /// The refspec names a remote-tracking branch.
    FoundRemoteBranch {
        /// The fully-qualified remote-tracking reference.
        reference: &'a str,
    },
    /// The refspec does not name a remote branch and is checked out
    /// detached.
    DetachedCheckout {
        /// The requested refspec.
        refspec: &'a str,
    },
    /// A patch is being applied.
    ApplyingPatch {
        /// The absolute patch path.
        patch: &'a Utf8Path,
    },
    /// A patch failed to apply and its `git am` session was aborted.
    PatchAborted {
        /// The absolute patch path.
        patch: &'a Utf8Path,
    },
    /// All phases completed.
    Acquired {
        /// The working copy path.
        local_path: &'a Utf8Path,
    },
}

impl fmt::Display for AcquireEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquireEvent::Acquiring { source } => {
                write!(f, "acquiring '{source}'")
            }
            AcquireEvent::Cloning { local_path } => {
                write!(f, "cloning into '{local_path}'")
            }
            AcquireEvent::Fetching { local_path } => {
                write!(f, "fetching in '{local_path}'")
            }
            AcquireEvent::RemoteAdded { remote, url } => {
                write!(f, "added remote {remote} at '{url}'")
            }
            AcquireEvent::RemoteUrlReplaced { remote, previous, url } => {
                write!(
                    f,
                    "replaced URL of remote {remote}, was '{previous}', \
                     now '{url}'"
                )
            }
            AcquireEvent::RemoteFetched { remote } => {
                write!(f, "fetched remote {remote}")
            }
            AcquireEvent::CheckingOut { refspec } => {
                write!(f, "checking out '{refspec}'")
            }
            AcquireEvent::FoundRemoteBranch { reference } => {
                write!(f, "found '{reference}'")
            }
            AcquireEvent::DetachedCheckout { refspec } => {
                write!(f, "assuming '{refspec}' is a tag or commit")
            }
            AcquireEvent::ApplyingPatch { patch } => {
                write!(f, "applying patch '{patch}'")
            }
            AcquireEvent::PatchAborted { patch } => {
                write!(f, "aborted patch '{patch}'")
            }
            AcquireEvent::Acquired { local_path } => {
                write!(f, "acquired '{local_path}'")
            }
        }
    }
}

/// Receives [`AcquireEvent`]s as an acquisition progresses.
pub trait AcquireObserver {
    /// Called once per event, in order.
    fn on_event(&self, event: &AcquireEvent<'_>);
}

impl<T: AcquireObserver + ?Sized> AcquireObserver for &T {
    fn on_event(&self, event: &AcquireEvent<'_>) {
        (**self).on_event(event)
    }
}

/// Forwards events to [`tracing`].
///
/// Progress is logged at `info`; remote bookkeeping and checkout decisions
/// at `debug`. An aborted patch is logged at `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl AcquireObserver for TracingObserver {
    fn on_event(&self, event: &AcquireEvent<'_>) {
        match *event {
            AcquireEvent::Acquiring { source } => {
                info!(source, "{event}");
            }
            AcquireEvent::Cloning { local_path }
            | AcquireEvent::Fetching { local_path }
            | AcquireEvent::Acquired { local_path } => {
                info!(%local_path, "{event}");
            }
            AcquireEvent::RemoteUrlReplaced { remote, previous, url } => {
                info!(remote, previous, url, "{event}");
            }
            AcquireEvent::CheckingOut { refspec } => {
                info!(refspec, "{event}");
            }
            AcquireEvent::ApplyingPatch { patch } => {
                info!(%patch, "{event}");
            }
            AcquireEvent::PatchAborted { patch } => {
                warn!(%patch, "{event}");
            }
            AcquireEvent::RemoteAdded { remote, url } => {
                debug!(remote, url, "{event}");
            }
            AcquireEvent::RemoteFetched { remote } => {
                debug!(remote, "{event}");
            }
            AcquireEvent::FoundRemoteBranch { reference } => {
                debug!(reference, "{event}");
            }
            AcquireEvent::DetachedCheckout { refspec } => {
                debug!(refspec, "{event}");
            }
        }
    }
}
