// Copyright 2026 Oxide Computer Company

//! Efficient acquisition of a single git branch, tag or commit.
//!
//! An *acquisition* brings a working copy at a local path to the state named
//! by a refspec. It runs four phases, strictly in order:
//!
//! 1. Resolve the local path (derived from the source URI if not given) and
//!    an optional local mirror under a mirror root.
//! 2. Clone into a fresh repository, or reuse an existing one, reconciling
//!    the `origin` (and `mirror`) remote URLs and fetching.
//! 3. Check out the refspec: as a local branch reset to
//!    `refs/remotes/origin/<refspec>` if that exists, or detached otherwise.
//! 4. Apply mailbox-style patches in order with `git am`.
//!
//! Running the same acquisition twice is safe: the second run takes the fetch
//! path and ends in the same state.
//!
//! # Examples
//!
//! ```no_run
//! use git_acquire::{Acquisition, AcquisitionRequest};
//!
//! let request =
//!     AcquisitionRequest::new("https://example.com/widgets.git")
//!         .with_refspec("v1.2.3")
//!         .with_patch("fixes/0001-build.patch");
//!
//! // Uses `$GIT` (or `git`) and reports progress through `tracing`.
//! let acquisition = Acquisition::standard(request).expect("$GIT is valid");
//! assert_eq!(acquisition.local_path().as_str(), "widgets");
//! acquisition.acquire().expect("acquired successfully");
//! ```

#![deny(missing_docs)]

mod acquire;
mod errors;
mod observer;
mod request;
mod vcs;

pub use acquire::Acquisition;
pub use errors::{AcquireError, GitCommandError, GitEnvError, Phase};
pub use observer::{AcquireEvent, AcquireObserver, TracingObserver};
pub use request::{
    AcquisitionRequest, DEFAULT_REFSPEC, default_local_path, mirror_path_for,
};
pub use vcs::{Git, GitOutput, GitRunner};
