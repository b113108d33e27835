//! `corral rm`: delete the project.

use anyhow::Context;

use super::{ConnectionArgs, ManifestArgs};
use crate::output;

/// Executes the `rm` command.
///
/// The manifest is only read to derive the project name when `-p` is not
/// given.
///
/// # Errors
///
/// Returns an error if the project does not exist or the API call fails.
pub fn execute(manifest_args: &ManifestArgs, connection: &ConnectionArgs) -> anyhow::Result<()> {
    let name = match &manifest_args.project_name {
        Some(name) => name.clone(),
        None => {
            let loaded = manifest_args.load()?;
            manifest_args.project_name(&loaded.base_dir)?
        }
    };
    let engine = super::engine(connection, false)?;
    let id = engine
        .teardown(&name)
        .with_context(|| format!("removing project {name}"))?;
    output::print_removed(&name, &id);
    Ok(())
}
