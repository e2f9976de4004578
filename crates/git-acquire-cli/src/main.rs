// Copyright 2026 Oxide Computer Company

//! Command-line entry point for git-acquire.

use anyhow::Result;
use camino::Utf8PathBuf;
use clap::Parser;
use git_acquire::{Acquisition, AcquisitionRequest, DEFAULT_REFSPEC};
use std::process::exit;
use tracing::error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Efficient acquisition of a git branch, tag or commit.
#[derive(Debug, Clone, Parser)]
#[command(name = "git-acquire", about, version)]
struct Cli {
    /// Source URI to clone or fetch from.
    #[arg(value_name = "SOURCE")]
    source: String,

    /// Refspec (branch, tag or commit) to check out.
    #[arg(short, long, default_value = DEFAULT_REFSPEC)]
    refspec: String,

    /// Local path in which to perform the checkout.
    ///
    /// Defaults to the last path segment of SOURCE, without a `.git`
    /// suffix.
    #[arg(short, long, value_name = "PATH")]
    local_path: Option<Utf8PathBuf>,

    /// Patch to apply with `git am` after checkout. May be repeated; patches
    /// are applied in the order given.
    #[arg(short, long = "patch", value_name = "PATCH")]
    patches: Vec<Utf8PathBuf>,

    /// Root directory of local mirrors, laid out as <ROOT>/<host>/<path>.
    #[arg(
        short,
        long,
        value_name = "ROOT",
        env = "GIT_ACQUIRE_MIRROR_ROOT"
    )]
    mirror_root: Option<Utf8PathBuf>,

    /// Log at debug level unless RUST_LOG is set.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn request(&self) -> AcquisitionRequest {
        let mut request = AcquisitionRequest::new(&self.source)
            .with_refspec(&self.refspec)
            .with_patches(&self.patches);
        if let Some(local_path) = &self.local_path {
            request = request.with_local_path(local_path);
        }
        if let Some(mirror_root) = &self.mirror_root {
            request = request.with_mirror_root(mirror_root);
        }
        request
    }

    fn run(self) -> Result<()> {
        Acquisition::standard(self.request())?.acquire()?;
        Ok(())
    }
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let layer = fmt::layer().compact();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry().with(layer).with(filter).init();

    if let Err(error) = cli.run() {
        error!("{error:?}");
        exit(1);
    }
}
