//! `corral create`: create the project, failing if it already exists.

use anyhow::Context;
use clap::Args;

use super::{ConnectionArgs, ManifestArgs};
use crate::output;

/// Arguments for the `create` command.
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Resolve and apply against an in-memory API instead of the server.
    #[arg(long)]
    pub dry_run: bool,
}

/// Executes the `create` command.
///
/// # Errors
///
/// Returns an error if the manifest is invalid, the project exists, or an
/// API call fails.
pub fn execute(
    args: &CreateArgs,
    manifest_args: &ManifestArgs,
    connection: &ConnectionArgs,
) -> anyhow::Result<()> {
    let loaded = manifest_args.load()?;
    let name = manifest_args.project_name(&loaded.base_dir)?;
    let engine = super::engine(connection, args.dry_run)?;

    let project = engine
        .create(&name, &loaded.manifest)
        .with_context(|| format!("creating project {name}"))?;
    output::print_changes(&project);
    Ok(())
}
