// Copyright 2026 Oxide Computer Company

//! The git command interface used by an acquisition.

use crate::{GitCommandError, GitEnvError};
use camino::Utf8Path;
use std::process::{Command, Output};

/// Reads the git binary path from an environment variable, falling back
/// to `default` if the variable is unset or empty.
///
/// The value is trimmed of leading and trailing whitespace.
///
/// Returns an error if the variable is set but is not valid UTF-8.
fn read_git_env(
    var: &'static str,
    default: &str,
) -> Result<String, GitEnvError> {
    match std::env::var(var) {
        Ok(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Ok(default.to_string())
            } else {
                Ok(trimmed.to_string())
            }
        }
        Err(std::env::VarError::NotPresent) => Ok(default.to_string()),
        Err(std::env::VarError::NotUnicode(value)) => {
            Err(GitEnvError::NonUtf8 { var, value })
        }
    }
}

/// The captured result of a git invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitOutput {
    /// The exit code, or `None` if the process was terminated by a signal.
    pub code: Option<i32>,
    /// Standard output, decoded lossily as UTF-8.
    pub stdout: String,
    /// Standard error, decoded lossily as UTF-8.
    pub stderr: String,
}

impl GitOutput {
    /// Creates an output for a process that exited with `code`.
    pub fn exited(
        code: i32,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        GitOutput {
            code: Some(code),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Returns true if the process exited with code 0.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Returns a human-readable description of the exit status.
    pub fn exit_status(&self) -> String {
        match self.code {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

impl From<Output> for GitOutput {
    fn from(output: Output) -> Self {
        GitOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Runs git commands on behalf of an acquisition.
///
/// Only a failure to run git at all is an `Err`; a nonzero exit is reported
/// through [`GitOutput::code`] so that callers can treat some failures (such
/// as a missing reference) as answers rather than errors.
pub trait GitRunner {
    /// Runs git with `args`, in `working_dir` if given or in the current
    /// directory otherwise, and captures its output.
    fn execute(
        &self,
        args: &[&str],
        working_dir: Option<&Utf8Path>,
    ) -> Result<GitOutput, GitCommandError>;
}

impl<T: GitRunner + ?Sized> GitRunner for &T {
    fn execute(
        &self,
        args: &[&str],
        working_dir: Option<&Utf8Path>,
    ) -> Result<GitOutput, GitCommandError> {
        (**self).execute(args, working_dir)
    }
}

/// Runs the git binary as a subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Git {
    binary: String,
    envs: Vec<(String, String)>,
}

impl Git {
    /// Creates a runner using the `$GIT` environment variable or `"git"`.
    ///
    /// Returns an error if the `$GIT` environment variable is set but is not
    /// valid UTF-8.
    pub fn from_env() -> Result<Self, GitEnvError> {
        let binary = read_git_env("GIT", "git")?;
        Ok(Git::with_binary(binary))
    }

    /// Creates a runner for the given git binary.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Git { binary: binary.into(), envs: Vec::new() }
    }

    /// Sets an environment variable for every git invocation.
    pub fn env(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Returns the path to the git binary.
    pub fn binary(&self) -> &str {
        &self.binary
    }
}

impl GitRunner for Git {
    fn execute(
        &self,
        args: &[&str],
        working_dir: Option<&Utf8Path>,
    ) -> Result<GitOutput, GitCommandError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args);
        cmd.envs(self.envs.iter().map(|(k, v)| (k, v)));
        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        let output =
            cmd.output().map_err(|source| GitCommandError::SpawnFailed {
                binary_path: self.binary.clone(),
                command: args.join(" "),
                working_dir: working_dir.map(ToOwned::to_owned),
                source,
            })?;
        Ok(output.into())
    }
}
