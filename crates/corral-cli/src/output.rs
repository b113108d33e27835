//! Formatted output helpers for CLI commands.
//!
//! Results go to stdout; logs go to stderr through `tracing`.

use corral_common::types::EnvironmentId;
use corral_compose::ResolvedProject;
use corral_engine::{Change, Project};
use serde_json::json;

const BOLD: &str = "\x1b[1m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

/// One-character marker and color for a change.
#[must_use]
pub const fn change_marker(change: &Change) -> (&'static str, &'static str) {
    match change {
        Change::CreatedEnvironment { .. }
        | Change::CreatedService { .. }
        | Change::CreatedLink(_) => ("+", GREEN),
        Change::UpdatedService { .. } => ("~", CYAN),
        Change::KindKept { .. } => ("!", YELLOW),
        Change::DeletedLink(_) => ("-", RED),
    }
}

/// Prints every change of a reconciliation, then a summary line.
#[allow(clippy::print_stdout)]
pub fn print_changes(project: &Project) {
    for change in &project.changes {
        let (marker, color) = change_marker(change);
        println!("  {color}{marker}{RESET} {change}");
    }
    println!(
        "{BOLD}{}{RESET}: {} service(s), {} link(s), {} change(s)",
        project.name,
        project.service_ids.len(),
        project.edges.len(),
        project.changes.len()
    );
}

/// Prints the outcome of `rm`.
#[allow(clippy::print_stdout)]
pub fn print_removed(name: &str, id: &EnvironmentId) {
    println!("  {RED}-{RESET} removed project {BOLD}{name}{RESET} ({id})");
}

/// JSON document describing a resolved manifest.
///
/// # Errors
///
/// Returns an error if a service cannot be serialized.
pub fn plan_json(resolved: &ResolvedProject, compact: bool) -> anyhow::Result<String> {
    let document = json!({
        "services": resolved.services,
        "links": resolved.edges,
    });
    let text = if compact {
        serde_json::to_string(&document)?
    } else {
        serde_json::to_string_pretty(&document)?
    };
    Ok(text)
}

/// Prints [`plan_json`].
///
/// # Errors
///
/// Returns an error if a service cannot be serialized.
#[allow(clippy::print_stdout)]
pub fn print_plan(resolved: &ResolvedProject, compact: bool) -> anyhow::Result<()> {
    println!("{}", plan_json(resolved, compact)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use corral_compose::{ConsumeMapEdge, Manifest, ServiceKind, resolve_manifest};

    use super::*;

    #[test]
    fn markers_follow_change_kind() {
        let edge = ConsumeMapEdge {
            source: "a".into(),
            target: "b".into(),
            alias: "b".into(),
        };
        assert_eq!(change_marker(&Change::CreatedLink(edge.clone())).0, "+");
        assert_eq!(change_marker(&Change::DeletedLink(edge)).0, "-");
        let kept = Change::KindKept {
            name: "lb".into(),
            kept: "loadBalancerService".into(),
            requested: ServiceKind::Standard,
        };
        assert_eq!(change_marker(&kept).0, "!");
    }

    #[test]
    fn plan_json_lists_services_and_links() {
        let manifest = Manifest::parse(
            "web:\n  image: nginx\n  links: [\"db:database\"]\ndb:\n  image: mysql\n",
            Path::new("."),
        )
        .expect("valid manifest");
        let resolved = resolve_manifest(&manifest).expect("resolve");
        let text = plan_json(&resolved, true).expect("json");
        let value: serde_json::Value = serde_json::from_str(&text).expect("parse back");
        assert_eq!(value["services"][0]["name"], "web");
        assert_eq!(value["services"][0]["launchConfig"]["imageUuid"], "docker:nginx");
        assert_eq!(
            value["links"][0],
            json!({"source": "web", "target": "db", "alias": "database"})
        );
        assert!(!text.contains('\n'));
    }
}
