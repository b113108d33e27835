//! Resolution context shared by the resolution stages.
//!
//! Knows every service name of the project, its kind and sidekick
//! membership, plus services that already exist server-side during `up`.

use std::collections::BTreeSet;

use corral_common::error::Result;
use indexmap::IndexMap;

use crate::classifier::classify;
use crate::model::ServiceKind;
use crate::parser::Manifest;
use crate::sidekick::{self, SidekickGroups};

/// Name lookups available to every resolution stage.
#[derive(Debug, Clone, Default)]
pub struct ResolutionContext {
    kinds: IndexMap<String, ServiceKind>,
    groups: SidekickGroups,
    existing: BTreeSet<String>,
}

impl ResolutionContext {
    /// Classifies and groups the services of a manifest.
    ///
    /// # Errors
    ///
    /// Returns [`corral_common::error::CorralError::InvalidSidekick`] if
    /// sidekick grouping fails.
    pub fn from_manifest(manifest: &Manifest) -> Result<Self> {
        let kinds = manifest
            .services()
            .iter()
            .map(|(name, spec)| (name.clone(), classify(spec)))
            .collect();
        let groups = sidekick::group(manifest)?;
        Ok(Self {
            kinds,
            groups,
            existing: BTreeSet::new(),
        })
    }

    /// Adds services that already exist in the project.
    #[must_use]
    pub fn with_existing_services<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.existing.extend(names.into_iter().map(Into::into));
        self
    }

    /// Logical services of the manifest, in manifest order.
    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.groups.primaries().map(|(name, _)| name)
    }

    /// Kind of a manifest service, sidekicks included.
    #[must_use]
    pub fn kind_of(&self, name: &str) -> Option<ServiceKind> {
        self.kinds.get(name).copied()
    }

    /// Sidekicks of a logical service.
    #[must_use]
    pub fn sidekicks_of(&self, primary: &str) -> &[String] {
        self.groups.sidekicks_of(primary)
    }

    /// Names of every launch config of a logical service, primary first.
    #[must_use]
    pub fn launch_config_names(&self, primary: &str) -> Vec<String> {
        std::iter::once(primary.to_string())
            .chain(self.sidekicks_of(primary).iter().cloned())
            .collect()
    }

    /// Whether a link may point at `name`.
    ///
    /// Sidekicks are never link targets, even if a service of the same
    /// name exists server-side.
    #[must_use]
    pub fn is_link_target(&self, name: &str) -> bool {
        if self.groups.owner_of(name).is_some() {
            return false;
        }
        self.groups.is_primary(name) || self.existing.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn context(text: &str) -> ResolutionContext {
        let manifest = Manifest::parse(text, Path::new(".")).expect("valid manifest");
        ResolutionContext::from_manifest(&manifest).expect("valid context")
    }

    #[test]
    fn sidekicks_are_not_link_targets() {
        let ctx = context(
            "web:\n  image: x\n  labels: {io.rancher.sidekicks: helper}\nhelper:\n  image: x\n",
        )
        .with_existing_services(["helper"]);
        assert!(ctx.is_link_target("web"));
        assert!(!ctx.is_link_target("helper"));
        assert_eq!(ctx.launch_config_names("web"), ["web", "helper"]);
    }

    #[test]
    fn existing_services_are_link_targets() {
        let ctx = context("web:\n  image: x\n").with_existing_services(["legacy"]);
        assert!(ctx.is_link_target("legacy"));
        assert!(!ctx.is_link_target("ghost"));
    }

    #[test]
    fn kinds_are_recorded_for_every_service() {
        let ctx = context("lb:\n  image: rancher/load-balancer-service\nweb:\n  image: nginx\n");
        assert_eq!(ctx.kind_of("lb"), Some(ServiceKind::LoadBalancer));
        assert_eq!(ctx.kind_of("web"), Some(ServiceKind::Standard));
        assert_eq!(ctx.services().collect::<Vec<_>>(), ["lb", "web"]);
    }
}
