//! Manifest to service graph resolution.
//!
//! Runs classification, sidekick grouping, launch config building and link
//! resolution. Every validation error surfaces here, before any API call.

use corral_common::error::{CorralError, Result};

use crate::context::ResolutionContext;
use crate::launch_config;
use crate::links::{collect_links, resolve_links};
use crate::model::{ConsumeMapEdge, LogicalService, ServiceKind};
use crate::parser::Manifest;

/// Fully resolved services and consume-map edges of one manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedProject {
    /// Logical services in manifest order.
    pub services: Vec<LogicalService>,
    /// Consume-map edges in source service order.
    pub edges: Vec<ConsumeMapEdge>,
}

impl ResolvedProject {
    /// Looks up a resolved service.
    #[must_use]
    pub fn service(&self, name: &str) -> Option<&LogicalService> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Edges whose source is `name`.
    pub fn edges_from<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ConsumeMapEdge> {
        self.edges.iter().filter(move |e| e.source == name)
    }
}

/// Resolves a manifest on its own.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn resolve_manifest(manifest: &Manifest) -> Result<ResolvedProject> {
    resolve_with_existing(manifest, std::iter::empty::<String>())
}

/// Resolves a manifest; links may also target `existing` services.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn resolve_with_existing<I, S>(manifest: &Manifest, existing: I) -> Result<ResolvedProject>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let context = ResolutionContext::from_manifest(manifest)?.with_existing_services(existing);
    let services = context
        .services()
        .map(|name| build_service(name, manifest, &context))
        .collect::<Result<Vec<_>>>()?;
    let edges = resolve_links(&services, &context)?;
    tracing::debug!(
        services = services.len(),
        edges = edges.len(),
        "manifest resolved"
    );
    Ok(ResolvedProject { services, edges })
}

fn build_service(
    name: &str,
    manifest: &Manifest,
    context: &ResolutionContext,
) -> Result<LogicalService> {
    let spec = manifest
        .get(name)
        .ok_or_else(|| CorralError::parse(name, "service is not defined"))?;
    let kind = context.kind_of(name).unwrap_or(ServiceKind::Standard);
    if spec.load_balancer_config.is_some() && kind != ServiceKind::LoadBalancer {
        return Err(CorralError::parse(
            format!("{name}.load_balancer_config"),
            "only valid on a load balancer service",
        ));
    }

    let mut service = LogicalService::new(name, kind);
    service.scale = spec.scale;
    service.load_balancer_config.clone_from(&spec.load_balancer_config);
    collect_links(name, &spec.links, &mut service.consumed_services)?;

    if kind == ServiceKind::External {
        service.external_ip_addresses.clone_from(&spec.external_ips);
        tracing::debug!(service = %name, kind = %kind, "resolved external service");
        return Ok(service);
    }

    let siblings = context.launch_config_names(name);
    service.launch_config = Some(launch_config::build(name, spec, &siblings)?);
    for sidekick in context.sidekicks_of(name) {
        let sidekick_spec = manifest.get(sidekick).ok_or_else(|| {
            CorralError::sidekick(name, format!("sidekick \"{sidekick}\" is not defined"))
        })?;
        if sidekick_spec.load_balancer_config.is_some() {
            return Err(CorralError::parse(
                format!("{sidekick}.load_balancer_config"),
                "only valid on a load balancer service",
            ));
        }
        if sidekick_spec.scale.is_some() {
            tracing::warn!(service = %name, sidekick = %sidekick, "scale on a sidekick is ignored");
        }
        let mut secondary = launch_config::build(sidekick, sidekick_spec, &siblings)?;
        secondary.name = Some(sidekick.clone());
        service.secondary_launch_configs.push(secondary);
        collect_links(sidekick, &sidekick_spec.links, &mut service.consumed_services)?;
    }

    tracing::debug!(
        service = %name,
        kind = %kind,
        sidekicks = service.secondary_launch_configs.len(),
        links = service.consumed_services.len(),
        "resolved service"
    );
    Ok(service)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::model::NetworkMode;

    fn resolve(text: &str) -> Result<ResolvedProject> {
        resolve_manifest(&Manifest::parse(text, Path::new(".")).expect("valid manifest"))
    }

    #[test]
    fn sidekicks_become_secondaries() {
        let project = resolve(
            "web:\n  image: nginx\n  labels: {io.rancher.sidekicks: helper}\n  links: [db]\n\
             helper:\n  image: busybox\n  net: container:web\
             \n  volumes_from: [web]\n  links: [cache]\n\
             db:\n  image: mysql\ncache:\n  image: redis\n",
        )
        .expect("should resolve");

        let names: Vec<_> = project.services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["web", "db", "cache"]);

        let web = project.service("web").expect("web");
        let primary = web.launch_config.as_ref().expect("primary");
        assert_eq!(primary.name, None);
        let helper = web.secondary("helper").expect("helper");
        assert_eq!(helper.network, NetworkMode::Container("web".into()));
        assert_eq!(helper.data_volumes_from_launch_configs, ["web"]);

        let targets: Vec<_> = project.edges_from("web").map(|e| e.target.as_str()).collect();
        assert_eq!(targets, ["db", "cache"]);
    }

    #[test]
    fn external_service_has_only_addresses() {
        let project = resolve(
            "ext:\n  image: rancher/external-service\n  external_ips: [1.1.1.1, 2.2.2.2]\n",
        )
        .expect("should resolve");
        let ext = project.service("ext").expect("ext");
        assert_eq!(ext.kind, ServiceKind::External);
        assert!(ext.launch_config.is_none());
        assert_eq!(ext.external_ip_addresses, ["1.1.1.1", "2.2.2.2"]);
    }

    #[test]
    fn load_balancer_config_needs_a_load_balancer() {
        let err = resolve("web:\n  image: nginx\n  load_balancer_config: {name: x}\n").unwrap_err();
        assert!(err.to_string().contains("load_balancer_config"), "got: {err}");
    }

    #[test]
    fn unknown_link_target_is_rejected() {
        let err = resolve("web:\n  image: nginx\n  links: [ghost]\n").unwrap_err();
        assert!(
            matches!(err, CorralError::UnknownLinkTarget { ref target, .. } if target == "ghost"),
            "got: {err}"
        );
    }

    #[test]
    fn existing_services_satisfy_links() {
        let manifest = Manifest::parse("web:\n  image: nginx\n  links: [legacy]\n", Path::new("."))
            .expect("valid manifest");
        let project = resolve_with_existing(&manifest, ["legacy"]).expect("should resolve");
        assert_eq!(project.edges.len(), 1);
    }

    #[test]
    fn resolution_is_deterministic() {
        let text = "lb:\n  image: rancher/load-balancer-service\n  links: [web:web, api]\n\
                    web:\n  image: nginx\napi:\n  image: api\n  links: {web: frontend}\n";
        let first = resolve(text).expect("first");
        let second = resolve(text).expect("second");
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first.services).expect("serialize"),
            serde_json::to_string(&second.services).expect("serialize")
        );
    }
}
