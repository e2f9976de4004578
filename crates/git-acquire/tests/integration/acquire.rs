// Copyright 2026 Oxide Computer Company

//! End-to-end acquisitions against local upstream repositories.

use anyhow::{Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::Utf8TempDir;
use git_acquire::{
    AcquireError, Acquisition, AcquisitionRequest, Git, Phase,
};
use std::{fs, process::Command};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

const IDENTITY: [(&str, &str); 4] = [
    ("GIT_AUTHOR_NAME", "Test User"),
    ("GIT_AUTHOR_EMAIL", "test@example.com"),
    ("GIT_COMMITTER_NAME", "Test User"),
    ("GIT_COMMITTER_EMAIL", "test@example.com"),
];

/// Returns the git binary, respecting the `$GIT` environment variable.
fn git_binary() -> String {
    std::env::var("GIT").unwrap_or_else(|_| "git".to_string())
}

/// Runs git in `dir` with a fixed identity, returning trimmed stdout.
fn git(dir: &Utf8Path, args: &[&str]) -> Result<String> {
    let output = Command::new(git_binary())
        .args(args)
        .envs(IDENTITY)
        .current_dir(dir)
        .output()?;
    if !output.status.success() {
        bail!(
            "git {} failed ({}): {}",
            args.join(" "),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim(),
        );
    }
    Ok(String::from_utf8(output.stdout)?.trim().to_string())
}

/// Returns a runner for acquisitions that can create commits with `git am`.
fn runner() -> Result<Git> {
    let mut git = Git::from_env()?;
    for (key, value) in IDENTITY {
        git = git.env(key, value);
    }
    Ok(git)
}

fn acquire(request: AcquisitionRequest) -> Result<(), AcquireError> {
    let git = runner().expect("$GIT is valid UTF-8");
    Acquisition::new(request, git).acquire()
}

/// Commits `contents` to `README` in `repo`. Returns the commit hash.
fn commit_readme(repo: &Utf8Path, contents: &str) -> Result<String> {
    fs::write(repo.join("README"), contents)?;
    git(repo, &["add", "README"])?;
    git(repo, &["commit", "-q", "-m", contents])?;
    git(repo, &["rev-parse", "HEAD"])
}

/// An upstream repository with a `main` branch and a `v1.0.0` tag.
struct Upstream {
    temp: Utf8TempDir,
    repo: Utf8PathBuf,
    v1: String,
    v2: String,
}

impl Upstream {
    /// Creates `main` with two commits, tagging the first as `v1.0.0`.
    fn new() -> Result<Self> {
        let temp = Utf8TempDir::with_prefix("git-acquire-it-")?;
        let repo = temp.path().join("upstream");
        fs::create_dir(&repo)?;

        git(&repo, &["init", "-q"])?;
        git(&repo, &["symbolic-ref", "HEAD", "refs/heads/main"])?;
        let v1 = commit_readme(&repo, "v1")?;
        git(&repo, &["tag", "v1.0.0"])?;
        let v2 = commit_readme(&repo, "v2")?;

        Ok(Upstream { temp, repo, v1, v2 })
    }

    fn source(&self) -> &str {
        self.repo.as_str()
    }

    /// Returns a path in the test directory that does not exist yet.
    fn path(&self, name: &str) -> Utf8PathBuf {
        self.temp.path().join(name)
    }

    /// Writes a one-commit mailbox patch that adds `file`, without changing
    /// upstream `main`. Returns the patch path.
    fn make_patch(&self, name: &str, file: &str) -> Result<Utf8PathBuf> {
        git(&self.repo, &["checkout", "-q", "-b", "make-patch"])?;
        fs::write(self.repo.join(file), format!("{file}\n"))?;
        git(&self.repo, &["add", file])?;
        git(&self.repo, &["commit", "-q", "-m", &format!("Add {file}")])?;
        let patch = git(&self.repo, &["format-patch", "-1", "--stdout"])?;
        git(&self.repo, &["checkout", "-q", "main"])?;
        git(&self.repo, &["branch", "-q", "-D", "make-patch"])?;

        let path = self.path(name);
        fs::write(&path, format!("{patch}\n"))?;
        Ok(path)
    }
}

fn head(work: &Utf8Path) -> Result<String> {
    git(work, &["rev-parse", "HEAD"])
}

fn current_branch(work: &Utf8Path) -> Result<String> {
    git(work, &["rev-parse", "--abbrev-ref", "HEAD"])
}

fn remote_url(work: &Utf8Path, remote: &str) -> Result<String> {
    git(work, &["config", "--get", &format!("remote.{remote}.url")])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn test_clone_checks_out_branch() -> Result<()> {
    let upstream = Upstream::new()?;
    let work = upstream.path("work");

    acquire(AcquisitionRequest::new(upstream.source()).with_local_path(&work))?;

    assert_eq!(current_branch(&work)?, "main");
    assert_eq!(head(&work)?, upstream.v2);
    assert_eq!(remote_url(&work, "origin")?, upstream.source());
    assert_eq!(fs::read_to_string(work.join("README"))?, "v2");
    Ok(())
}

#[test]
fn test_tag_is_checked_out_detached() -> Result<()> {
    let upstream = Upstream::new()?;
    let work = upstream.path("work");

    acquire(
        AcquisitionRequest::new(upstream.source())
            .with_local_path(&work)
            .with_refspec("v1.0.0"),
    )?;

    assert_eq!(current_branch(&work)?, "HEAD", "HEAD should be detached");
    assert_eq!(head(&work)?, upstream.v1);
    Ok(())
}

#[test]
fn test_commit_is_checked_out_detached() -> Result<()> {
    let upstream = Upstream::new()?;
    let work = upstream.path("work");

    acquire(
        AcquisitionRequest::new(upstream.source())
            .with_local_path(&work)
            .with_refspec(&upstream.v1),
    )?;

    assert_eq!(current_branch(&work)?, "HEAD", "HEAD should be detached");
    assert_eq!(head(&work)?, upstream.v1);
    Ok(())
}

#[test]
fn test_reacquire_is_idempotent() -> Result<()> {
    let upstream = Upstream::new()?;
    let work = upstream.path("work");
    let request =
        AcquisitionRequest::new(upstream.source()).with_local_path(&work);

    acquire(request.clone())?;
    let first = (head(&work)?, current_branch(&work)?);
    acquire(request)?;
    let second = (head(&work)?, current_branch(&work)?);

    assert_eq!(first, second);
    assert_eq!(git(&work, &["status", "--porcelain"])?, "");
    Ok(())
}

#[test]
fn test_reacquire_moves_branch_to_new_upstream_commit() -> Result<()> {
    let upstream = Upstream::new()?;
    let work = upstream.path("work");
    let request =
        AcquisitionRequest::new(upstream.source()).with_local_path(&work);

    acquire(request.clone())?;
    let v3 = commit_readme(&upstream.repo, "v3")?;
    acquire(request)?;

    assert_eq!(current_branch(&work)?, "main");
    assert_eq!(head(&work)?, v3);
    Ok(())
}

#[test]
fn test_origin_url_is_rewritten() -> Result<()> {
    let upstream = Upstream::new()?;
    let work = upstream.path("work");
    acquire(AcquisitionRequest::new(upstream.source()).with_local_path(&work))?;

    let moved = upstream.path("moved.git");
    git(
        upstream.temp.path(),
        &["clone", "-q", "--bare", upstream.source(), moved.as_str()],
    )?;
    acquire(AcquisitionRequest::new(moved.as_str()).with_local_path(&work))?;

    assert_eq!(remote_url(&work, "origin")?, moved.as_str());
    assert_eq!(head(&work)?, upstream.v2);
    Ok(())
}

#[test]
fn test_mirror_is_fetched() -> Result<()> {
    let upstream = Upstream::new()?;
    let work = upstream.path("work");
    let mirror_root = upstream.path("mirrors");
    let source = format!("file://{}", upstream.source());
    let mirror = git_acquire::mirror_path_for(&mirror_root, &source);
    fs::create_dir_all(mirror.parent().expect("mirror has a parent"))?;
    git(
        upstream.temp.path(),
        &["clone", "-q", "--mirror", upstream.source(), mirror.as_str()],
    )?;

    acquire(
        AcquisitionRequest::new(&source)
            .with_local_path(&work)
            .with_mirror_root(&mirror_root),
    )?;

    assert_eq!(remote_url(&work, "mirror")?, mirror.as_str());
    assert_eq!(remote_url(&work, "origin")?, source);
    assert_eq!(
        git(&work, &["rev-parse", "refs/remotes/mirror/main"])?,
        upstream.v2
    );
    assert_eq!(current_branch(&work)?, "main");
    Ok(())
}

#[test]
fn test_patches_are_applied_in_order() -> Result<()> {
    let upstream = Upstream::new()?;
    let work = upstream.path("work");
    let first = upstream.make_patch("0001.patch", "FIRST")?;
    let second = upstream.make_patch("0002.patch", "SECOND")?;

    acquire(
        AcquisitionRequest::new(upstream.source())
            .with_local_path(&work)
            .with_patches([&first, &second]),
    )?;

    assert_eq!(
        git(&work, &["log", "-3", "--format=%s"])?,
        "Add SECOND\nAdd FIRST\nv2"
    );
    assert!(work.join("FIRST").exists());
    assert!(work.join("SECOND").exists());
    Ok(())
}

#[test]
fn test_failed_patch_stops_the_sequence() -> Result<()> {
    let upstream = Upstream::new()?;
    let work = upstream.path("work");
    let first = upstream.make_patch("0001.patch", "FIRST")?;
    let broken = upstream.path("0002.patch");
    fs::write(&broken, "this is not a patch\n")?;
    let third = upstream.make_patch("0003.patch", "THIRD")?;

    let err = acquire(
        AcquisitionRequest::new(upstream.source())
            .with_local_path(&work)
            .with_patches([&first, &broken, &third]),
    )
    .unwrap_err();

    assert_eq!(err.phase(), Phase::Patch);
    match err {
        AcquireError::ApplyPatch { patch, index, .. } => {
            assert_eq!(patch, broken);
            assert_eq!(index, 1);
        }
        other => panic!("expected ApplyPatch, got {other:?}"),
    }
    assert!(work.join("FIRST").exists(), "first patch stays applied");
    assert!(!work.join("THIRD").exists(), "third patch is never attempted");
    Ok(())
}

#[test]
fn test_failed_patch_session_is_aborted() -> Result<()> {
    let upstream = Upstream::new()?;
    let work = upstream.path("work");
    let first = upstream.make_patch("0001.patch", "FIRST")?;
    // A well-formed mailbox that fails inside `git am`, since FIRST already
    // exists once the first patch is applied.
    let repeated = upstream.path("0002.patch");
    fs::copy(&first, &repeated)?;
    let request =
        AcquisitionRequest::new(upstream.source()).with_local_path(&work);

    let err = acquire(request.clone().with_patches([&first, &repeated]))
        .unwrap_err();

    assert!(
        matches!(err, AcquireError::ApplyPatch { index: 1, .. }),
        "expected ApplyPatch for the second patch, got {err:?}"
    );
    assert!(
        !work.join(".git/rebase-apply").exists(),
        "no `git am` session is left behind"
    );
    assert_eq!(git(&work, &["log", "-2", "--format=%s"])?, "Add FIRST\nv2");
    assert_eq!(git(&work, &["status", "--porcelain"])?, "");

    // A corrected request succeeds on the same working copy.
    acquire(request.with_patch(&first))?;
    assert_eq!(git(&work, &["log", "-2", "--format=%s"])?, "Add FIRST\nv2");
    assert_eq!(current_branch(&work)?, "main");
    Ok(())
}

#[test]
fn test_unknown_refspec_fails_checkout() -> Result<()> {
    let upstream = Upstream::new()?;
    let work = upstream.path("work");

    let err = acquire(
        AcquisitionRequest::new(upstream.source())
            .with_local_path(&work)
            .with_refspec("no-such-ref"),
    )
    .unwrap_err();

    assert!(
        matches!(
            &err,
            AcquireError::Checkout { refspec, detached: true, .. }
                if refspec == "no-such-ref"
        ),
        "expected detached Checkout error, got {err:?}"
    );
    Ok(())
}

#[test]
fn test_unreachable_source_fails_fetch() -> Result<()> {
    let upstream = Upstream::new()?;
    let work = upstream.path("work");
    let missing = upstream.path("missing.git");

    let err = acquire(
        AcquisitionRequest::new(missing.as_str()).with_local_path(&work),
    )
    .unwrap_err();

    assert_eq!(err.phase(), Phase::Fetch);
    assert!(
        matches!(err, AcquireError::Fetch { remote: "origin", .. }),
        "expected Fetch error, got {err:?}"
    );
    // The repository and its remote were set up before the fetch failed.
    assert_eq!(remote_url(&work, "origin")?, missing.as_str());
    Ok(())
}

#[test]
fn test_directory_inside_other_repository_is_rejected() -> Result<()> {
    let upstream = Upstream::new()?;
    let project = upstream.path("project");
    fs::create_dir(&project)?;
    git(&project, &["init", "-q"])?;
    git(
        &project,
        &["remote", "add", "origin", "https://example.com/project.git"],
    )?;
    let vendor = project.join("vendor");
    fs::create_dir(&vendor)?;

    let err = acquire(
        AcquisitionRequest::new(upstream.source()).with_local_path(&vendor),
    )
    .unwrap_err();

    assert_eq!(err.phase(), Phase::Fetch);
    assert!(
        matches!(&err, AcquireError::NotWorkingCopy { local_path, .. }
            if *local_path == vendor),
        "expected NotWorkingCopy, got {err:?}"
    );
    assert_eq!(
        remote_url(&project, "origin")?,
        "https://example.com/project.git",
        "enclosing repository is untouched"
    );
    assert!(!vendor.join(".git").exists());
    Ok(())
}
