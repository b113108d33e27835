//! `corral plan`: print the resolved services and links.

use anyhow::Context;
use clap::Args;

use super::ManifestArgs;
use crate::output;

/// Arguments for the `plan` command.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Print one JSON line instead of indented output.
    #[arg(long)]
    pub compact: bool,
}

/// Executes the `plan` command.
///
/// Resolves the manifest exactly as `create` and `up` would and prints the
/// result as JSON, without contacting the API.
///
/// # Errors
///
/// Returns an error if the manifest is invalid.
pub fn execute(args: &PlanArgs, manifest_args: &ManifestArgs) -> anyhow::Result<()> {
    let loaded = manifest_args.load()?;
    let resolved = corral_engine::plan(&loaded.manifest).context("resolving manifest")?;
    output::print_plan(&resolved, args.compact)?;
    Ok(())
}
