//! `corral up`: create the project or converge it onto the manifest.

use anyhow::Context;
use clap::Args;

use super::{ConnectionArgs, ManifestArgs};
use crate::output;

/// Arguments for the `up` command.
#[derive(Args, Debug)]
pub struct UpArgs {
    /// Accepted for compatibility; corral never attaches to logs.
    #[arg(short = 'd', long)]
    pub detach: bool,

    /// Resolve and apply against an in-memory API instead of the server.
    #[arg(long)]
    pub dry_run: bool,
}

/// Executes the `up` command.
///
/// # Errors
///
/// Returns an error if the manifest is invalid or an API call fails.
pub fn execute(
    args: &UpArgs,
    manifest_args: &ManifestArgs,
    connection: &ConnectionArgs,
) -> anyhow::Result<()> {
    if args.detach {
        tracing::debug!("-d has no effect, corral does not attach");
    }
    let loaded = manifest_args.load()?;
    let name = manifest_args.project_name(&loaded.base_dir)?;
    let engine = super::engine(connection, args.dry_run)?;

    let project = engine
        .up(&name, &loaded.manifest)
        .with_context(|| format!("bringing up project {name}"))?;
    output::print_changes(&project);
    Ok(())
}
