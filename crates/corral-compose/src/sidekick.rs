//! Sidekick grouping.
//!
//! A primary lists its sidekicks in the `io.rancher.sidekicks` label. Each
//! sidekick leaves the top level and becomes a secondary launch config of
//! its primary, in label order.

use std::collections::HashMap;

use corral_common::constants::SIDEKICKS_LABEL;
use corral_common::error::{CorralError, Result};
use indexmap::IndexMap;

use crate::classifier::classify;
use crate::model::ServiceKind;
use crate::parser::Manifest;

/// Primaries with their sidekicks, and the reverse ownership index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SidekickGroups {
    primaries: IndexMap<String, Vec<String>>,
    owners: HashMap<String, String>,
}

impl SidekickGroups {
    /// Top-level services in manifest order, with their sidekicks.
    pub fn primaries(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.primaries
            .iter()
            .map(|(name, sidekicks)| (name.as_str(), sidekicks.as_slice()))
    }

    /// Sidekicks of `primary`, empty if it has none or is unknown.
    #[must_use]
    pub fn sidekicks_of(&self, primary: &str) -> &[String] {
        self.primaries.get(primary).map_or(&[], Vec::as_slice)
    }

    /// The primary owning `sidekick`.
    #[must_use]
    pub fn owner_of(&self, sidekick: &str) -> Option<&str> {
        self.owners.get(sidekick).map(String::as_str)
    }

    /// Whether `name` is a top-level service.
    #[must_use]
    pub fn is_primary(&self, name: &str) -> bool {
        self.primaries.contains_key(name)
    }
}

/// Splits a sidekicks label: comma-separated, trimmed, empty items dropped.
#[must_use]
pub fn parse_sidekick_label(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn sidekicks_declared(manifest: &Manifest, name: &str) -> Vec<String> {
    manifest
        .get(name)
        .and_then(|spec| spec.label(SIDEKICKS_LABEL))
        .map(parse_sidekick_label)
        .unwrap_or_default()
}

/// Groups sidekicks under their primaries.
///
/// # Errors
///
/// Returns [`CorralError::InvalidSidekick`] when a sidekick is claimed by
/// two primaries, is not defined, is the primary itself, declares its own
/// sidekicks, or when either side is an external service.
pub fn group(manifest: &Manifest) -> Result<SidekickGroups> {
    let mut owners: HashMap<String, String> = HashMap::new();
    let mut declared: HashMap<String, Vec<String>> = HashMap::new();

    for (name, spec) in manifest.services() {
        let sidekicks = sidekicks_declared(manifest, name);
        if sidekicks.is_empty() {
            continue;
        }
        if classify(spec) == ServiceKind::External {
            return Err(CorralError::sidekick(
                name,
                "an external service cannot have sidekicks",
            ));
        }

        let mut members = Vec::with_capacity(sidekicks.len());
        for sidekick in sidekicks {
            if &sidekick == name {
                return Err(CorralError::sidekick(name, "a service cannot be its own sidekick"));
            }
            let Some(sidekick_spec) = manifest.get(&sidekick) else {
                return Err(CorralError::sidekick(
                    name,
                    format!("sidekick \"{sidekick}\" is not defined"),
                ));
            };
            if classify(sidekick_spec) == ServiceKind::External {
                return Err(CorralError::sidekick(
                    name,
                    format!("sidekick \"{sidekick}\" is an external service"),
                ));
            }
            if !sidekicks_declared(manifest, &sidekick).is_empty() {
                return Err(CorralError::sidekick(
                    name,
                    format!("sidekick \"{sidekick}\" declares its own sidekicks"),
                ));
            }
            match owners.get(&sidekick) {
                Some(owner) if owner == name => continue,
                Some(owner) => {
                    return Err(CorralError::sidekick(
                        &sidekick,
                        format!("claimed as a sidekick by both \"{owner}\" and \"{name}\""),
                    ));
                }
                None => {}
            }
            let _ = owners.insert(sidekick.clone(), name.clone());
            members.push(sidekick);
        }
        tracing::debug!(service = %name, sidekicks = ?members, "grouped sidekicks");
        let _ = declared.insert(name.clone(), members);
    }

    let primaries = manifest
        .names()
        .filter(|name| !owners.contains_key(*name))
        .map(|name| (name.to_string(), declared.remove(name).unwrap_or_default()))
        .collect();

    Ok(SidekickGroups { primaries, owners })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn manifest(text: &str) -> Manifest {
        Manifest::parse(text, Path::new(".")).expect("valid manifest")
    }

    #[test]
    fn label_parsing_trims_and_skips_empty_items() {
        assert_eq!(parse_sidekick_label(" a, b ,,c ,"), ["a", "b", "c"]);
        assert!(parse_sidekick_label(" , ").is_empty());
    }

    #[test]
    fn sidekicks_leave_the_top_level_in_label_order() {
        let groups = group(&manifest(
            "web:\n  image: nginx\n  labels:\n    io.rancher.sidekicks: log, data\n\
             data:\n  image: busybox\nlog:\n  image: busybox\ndb:\n  image: mysql\n",
        ))
        .expect("should group");
        let primaries: Vec<_> = groups.primaries().map(|(name, _)| name).collect();
        assert_eq!(primaries, ["web", "db"]);
        assert_eq!(groups.sidekicks_of("web"), ["log", "data"]);
        assert_eq!(groups.owner_of("data"), Some("web"));
        assert!(groups.sidekicks_of("db").is_empty());
    }

    #[test]
    fn sidekick_claimed_twice_is_rejected() {
        let err = group(&manifest(
            "a:\n  image: x\n  labels: {io.rancher.sidekicks: s}\n\
             b:\n  image: x\n  labels: {io.rancher.sidekicks: s}\ns:\n  image: x\n",
        ))
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("\"a\"") && msg.contains("\"b\""), "got: {msg}");
    }

    #[test]
    fn undefined_sidekick_is_rejected() {
        let err = group(&manifest(
            "a:\n  image: x\n  labels: {io.rancher.sidekicks: ghost}\n",
        ))
        .unwrap_err();
        assert!(err.to_string().contains("ghost"), "got: {err}");
    }

    #[test]
    fn self_sidekick_is_rejected() {
        assert!(
            group(&manifest("a:\n  image: x\n  labels: {io.rancher.sidekicks: a}\n")).is_err()
        );
    }

    #[test]
    fn nested_sidekicks_are_rejected() {
        let err = group(&manifest(
            "a:\n  image: x\n  labels: {io.rancher.sidekicks: b}\n\
             b:\n  image: x\n  labels: {io.rancher.sidekicks: c}\nc:\n  image: x\n",
        ))
        .unwrap_err();
        assert!(err.to_string().contains("own sidekicks"), "got: {err}");
    }

    #[test]
    fn external_services_cannot_take_part() {
        assert!(group(&manifest(
            "a:\n  image: x\n  labels: {io.rancher.sidekicks: ext}\n\
             ext:\n  image: rancher/external-service\n  external_ips: [1.1.1.1]\n",
        ))
        .is_err());
        assert!(group(&manifest(
            "ext:\n  image: rancher/external-service\n  labels: {io.rancher.sidekicks: a}\n\
             a:\n  image: x\n",
        ))
        .is_err());
    }
}
