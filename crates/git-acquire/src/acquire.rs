// Copyright 2026 Oxide Computer Company

//! The acquisition state machine.

use crate::{
    AcquireError, AcquireEvent, AcquireObserver, AcquisitionRequest,
    GitCommandError, GitOutput, GitRunner, TracingObserver, vcs::Git,
};
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use std::io;

const ORIGIN: &str = "origin";
const MIRROR: &str = "mirror";

/// Acquires a working copy of a single git reference.
///
/// The local path and mirror are resolved once, at construction. In
/// particular, a mirror that appears or disappears afterwards does not affect
/// [`acquire`](Self::acquire).
///
/// At most one acquisition may operate on a given local path at a time;
/// nothing here locks the working copy.
#[derive(Debug, Clone)]
pub struct Acquisition<R = Git, O = TracingObserver> {
    request: AcquisitionRequest,
    local_path: Utf8PathBuf,
    mirror: Option<Utf8PathBuf>,
    git: R,
    observer: O,
}

impl Acquisition {
    /// Creates an acquisition that runs `$GIT` (or `git`) and reports
    /// progress through `tracing`.
    ///
    /// Returns an error if the `$GIT` environment variable is set but is not
    /// valid UTF-8.
    pub fn standard(
        request: AcquisitionRequest,
    ) -> Result<Self, AcquireError> {
        let git = Git::from_env()?;
        Ok(Acquisition::new(request, git))
    }
}

impl<R: GitRunner> Acquisition<R, TracingObserver> {
    /// Creates an acquisition that runs git commands through `git`.
    pub fn new(request: AcquisitionRequest, git: R) -> Self {
        let local_path = request.resolve_local_path();
        let mirror = request.resolve_mirror();
        Acquisition {
            request,
            local_path,
            mirror,
            git,
            observer: TracingObserver,
        }
    }
}

impl<R: GitRunner, O: AcquireObserver> Acquisition<R, O> {
    /// Replaces the observer that receives progress events.
    pub fn with_observer<O2: AcquireObserver>(
        self,
        observer: O2,
    ) -> Acquisition<R, O2> {
        Acquisition {
            request: self.request,
            local_path: self.local_path,
            mirror: self.mirror,
            git: self.git,
            observer,
        }
    }

    /// Returns the request this acquisition was created from.
    pub fn request(&self) -> &AcquisitionRequest {
        &self.request
    }

    /// Returns the path of the working copy.
    pub fn local_path(&self) -> &Utf8Path {
        &self.local_path
    }

    /// Returns the mirror resolved at construction, if any.
    pub fn mirror_path(&self) -> Option<&Utf8Path> {
        self.mirror.as_deref()
    }

    /// Runs every phase: clone or fetch, checkout, then patches.
    ///
    /// Returns on the first failure. The working copy is left as the last
    /// successful git command produced it, and running the acquisition
    /// again is safe.
    pub fn acquire(&self) -> Result<(), AcquireError> {
        self.emit(AcquireEvent::Acquiring { source: self.request.source() });

        if self.working_copy_exists()? {
            self.update_existing()?;
        } else {
            self.clone_fresh()?;
        }
        self.checkout()?;
        self.apply_patches()?;

        self.emit(AcquireEvent::Acquired { local_path: &self.local_path });
        Ok(())
    }

    fn working_copy_exists(&self) -> Result<bool, AcquireError> {
        match fs::metadata(&self.local_path) {
            Ok(_) => Ok(true),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(AcquireError::LocalPath {
                local_path: self.local_path.clone(),
                error,
            }),
        }
    }

    // ---- Fetcher ----

    /// Sets up a new repository. Remotes are added unconditionally, the
    /// mirror first so that fetching origin only transfers what the mirror
    /// lacks.
    fn clone_fresh(&self) -> Result<(), AcquireError> {
        self.emit(AcquireEvent::Cloning { local_path: &self.local_path });

        run_checked(&self.git, &["init", "-q", self.local_path.as_str()], None)
            .map_err(|error| AcquireError::Init {
                local_path: self.local_path.clone(),
                error,
            })?;

        if let Some(mirror) = &self.mirror {
            self.add_remote(MIRROR, mirror.as_str())?;
        }
        self.add_remote(ORIGIN, self.request.source())
    }

    fn update_existing(&self) -> Result<(), AcquireError> {
        self.emit(AcquireEvent::Fetching { local_path: &self.local_path });
        self.verify_working_copy()?;

        if let Some(mirror) = &self.mirror {
            self.reconcile_remote(MIRROR, mirror.as_str())?;
        }
        self.reconcile_remote(ORIGIN, self.request.source())
    }

    /// Checks that the local path is the top level of its own working copy.
    ///
    /// Git run inside a plain directory walks up to any enclosing
    /// repository, and every later command would then modify that one.
    fn verify_working_copy(&self) -> Result<(), AcquireError> {
        let output = self
            .git
            .execute(
                &["rev-parse", "--show-toplevel"],
                Some(self.local_path.as_path()),
            )
            .map_err(|error| AcquireError::Toplevel {
                local_path: self.local_path.clone(),
                error,
            })?;
        let canonical = fs::canonicalize(&self.local_path).map_err(|error| {
            AcquireError::LocalPath {
                local_path: self.local_path.clone(),
                error,
            }
        })?;

        let toplevel = output
            .success()
            .then(|| Utf8PathBuf::from(output.stdout.trim()));
        let is_toplevel = toplevel.as_deref().is_some_and(|toplevel| {
            fs::canonicalize(toplevel).is_ok_and(|t| t == canonical)
        });
        if is_toplevel {
            Ok(())
        } else {
            Err(AcquireError::NotWorkingCopy {
                local_path: self.local_path.clone(),
                toplevel,
            })
        }
    }

    fn add_remote(
        &self,
        remote: &'static str,
        url: &str,
    ) -> Result<(), AcquireError> {
        self.run(&["remote", "add", remote, url]).map_err(|error| {
            AcquireError::AddRemote {
                local_path: self.local_path.clone(),
                remote,
                url: url.to_owned(),
                error,
            }
        })?;
        self.emit(AcquireEvent::RemoteAdded { remote, url });
        self.fetch_remote(remote)
    }

    /// Makes `remote` point at `url` and fetches it.
    fn reconcile_remote(
        &self,
        remote: &'static str,
        url: &str,
    ) -> Result<(), AcquireError> {
        let key = format!("remote.{remote}.url");
        let args = ["config", "--get", key.as_str()];
        let get_url_error = |error: GitCommandError| {
            AcquireError::GetRemoteUrl {
                local_path: self.local_path.clone(),
                remote,
                error,
            }
        };

        let output = self
            .git
            .execute(&args, Some(self.local_path.as_path()))
            .map_err(get_url_error)?;
        match output.code {
            Some(0) => {}
            // `git config --get` exits with 1 when the key is missing.
            Some(1) => return self.add_remote(remote, url),
            _ => return Err(get_url_error(failed(&args, &output))),
        }

        let current = output.stdout.trim();
        if current != url {
            self.run(&["remote", "set-url", remote, url]).map_err(|error| {
                AcquireError::SetRemoteUrl {
                    local_path: self.local_path.clone(),
                    remote,
                    url: url.to_owned(),
                    error,
                }
            })?;
            self.emit(AcquireEvent::RemoteUrlReplaced {
                remote,
                previous: current,
                url,
            });
        }
        self.fetch_remote(remote)
    }

    fn fetch_remote(&self, remote: &'static str) -> Result<(), AcquireError> {
        self.run(&["fetch", "-q", remote]).map_err(|error| {
            AcquireError::Fetch {
                local_path: self.local_path.clone(),
                remote,
                error,
            }
        })?;
        self.emit(AcquireEvent::RemoteFetched { remote });
        Ok(())
    }

    // ---- Checkout resolver ----

    /// Checks out the refspec as a branch if origin has one by that name,
    /// and detached otherwise. Tags and commits are both immutable, so they
    /// need no further distinction.
    fn checkout(&self) -> Result<(), AcquireError> {
        let refspec = self.request.refspec();
        self.emit(AcquireEvent::CheckingOut { refspec });

        let reference = format!("refs/remotes/{ORIGIN}/{refspec}");
        let verified = self
            .git
            .execute(
                &["rev-parse", "--verify", "--quiet", &reference],
                Some(self.local_path.as_path()),
            )
            .map_err(|error| AcquireError::VerifyRef {
                local_path: self.local_path.clone(),
                reference: reference.clone(),
                error,
            })?
            .success();

        let result = if verified {
            self.emit(AcquireEvent::FoundRemoteBranch {
                reference: &reference,
            });
            self.run(&["checkout", "-q", "-B", refspec, &reference])
        } else {
            self.emit(AcquireEvent::DetachedCheckout { refspec });
            self.run(&["checkout", "-q", "--detach", refspec])
        };
        result.map_err(|error| AcquireError::Checkout {
            local_path: self.local_path.clone(),
            refspec: refspec.to_owned(),
            detached: !verified,
            error,
        })?;
        Ok(())
    }

    // ---- Patch applier ----

    /// Applies each patch in its own `git am` session. A failed session is
    /// aborted, leaving the earlier patches applied and no `am` state behind
    /// for the next acquisition to trip over.
    fn apply_patches(&self) -> Result<(), AcquireError> {
        for (index, patch) in self.request.patches().iter().enumerate() {
            let patch = absolute_patch_path(patch)?;
            self.emit(AcquireEvent::ApplyingPatch { patch: &patch });
            if let Err(error) = self.run(&["am", "-q", patch.as_str()]) {
                // Fails harmlessly if git rejected the patch before starting
                // a session.
                if self.run(&["am", "--abort"]).is_ok() {
                    self.emit(AcquireEvent::PatchAborted { patch: &patch });
                }
                return Err(AcquireError::ApplyPatch {
                    local_path: self.local_path.clone(),
                    patch,
                    index,
                    error,
                });
            }
        }
        Ok(())
    }

    // ---- Helpers ----

    /// Runs git in the working copy, failing on a nonzero exit.
    fn run(&self, args: &[&str]) -> Result<GitOutput, GitCommandError> {
        run_checked(&self.git, args, Some(self.local_path.as_path()))
    }

    fn emit(&self, event: AcquireEvent<'_>) {
        self.observer.on_event(&event);
    }
}

fn run_checked<R: GitRunner>(
    git: &R,
    args: &[&str],
    working_dir: Option<&Utf8Path>,
) -> Result<GitOutput, GitCommandError> {
    let output = git.execute(args, working_dir)?;
    if output.success() { Ok(output) } else { Err(failed(args, &output)) }
}

fn failed(args: &[&str], output: &GitOutput) -> GitCommandError {
    GitCommandError::Failed {
        command: args.join(" "),
        exit_status: output.exit_status(),
        stderr: output.stderr.trim().to_owned(),
    }
}

/// Resolves `patch` against the current directory, not the working copy.
fn absolute_patch_path(patch: &Utf8Path) -> Result<Utf8PathBuf, AcquireError> {
    let patch_error = |error: io::Error| AcquireError::PatchPath {
        patch: patch.to_owned(),
        error,
    };
    let absolute = std::path::absolute(patch).map_err(patch_error)?;
    Utf8PathBuf::try_from(absolute)
        .map_err(|error| patch_error(error.into_io_error()))
}
