//! Link parsing and consume-map edge resolution.

use corral_common::error::{CorralError, Result};

use crate::context::ResolutionContext;
use crate::model::{ConsumeMapEdge, LogicalService, ServiceLink};

/// Parses one link entry: `svc`, `svc:alias` or `svc: alias`.
///
/// # Errors
///
/// Returns [`CorralError::Parse`] if the target is empty.
pub fn parse_link(location: &str, entry: &str) -> Result<ServiceLink> {
    let (target, alias) = match entry.split_once(':') {
        Some((target, alias)) => (target.trim(), alias.trim()),
        None => (entry.trim(), ""),
    };
    if target.is_empty() {
        return Err(CorralError::parse(
            location,
            format!("link \"{entry}\" names no service"),
        ));
    }
    Ok(if alias.is_empty() {
        ServiceLink::new(target)
    } else {
        ServiceLink::with_alias(target, alias)
    })
}

/// Parses the link entries of `service` and appends them to `links`.
///
/// A target already present keeps its first alias.
///
/// # Errors
///
/// Returns [`CorralError::Parse`] for a malformed entry.
pub fn collect_links(
    service: &str,
    entries: &[String],
    links: &mut Vec<ServiceLink>,
) -> Result<()> {
    let location = format!("{service}.links");
    for entry in entries {
        let link = parse_link(&location, entry)?;
        if let Some(existing) = links.iter().find(|l| l.target == link.target) {
            if existing.alias != link.alias {
                tracing::warn!(
                    service,
                    target = %link.target,
                    kept = %existing.alias,
                    dropped = %link.alias,
                    "duplicate link, keeping first alias"
                );
            }
            continue;
        }
        links.push(link);
    }
    Ok(())
}

/// Builds one edge per consumed service, in service order.
///
/// # Errors
///
/// Returns [`CorralError::SelfLink`] for a link back to its own service and
/// [`CorralError::UnknownLinkTarget`] for a target that is not a service of
/// the context.
pub fn resolve_links(
    services: &[LogicalService],
    context: &ResolutionContext,
) -> Result<Vec<ConsumeMapEdge>> {
    let mut edges = Vec::new();
    for service in services {
        for link in &service.consumed_services {
            if link.target == service.name {
                return Err(CorralError::SelfLink {
                    service: service.name.clone(),
                });
            }
            if !context.is_link_target(&link.target) {
                return Err(CorralError::UnknownLinkTarget {
                    service: service.name.clone(),
                    target: link.target.clone(),
                });
            }
            edges.push(ConsumeMapEdge {
                source: service.name.clone(),
                target: link.target.clone(),
                alias: link.alias.clone(),
            });
        }
    }
    Ok(edges)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::model::ServiceKind;
    use crate::parser::Manifest;

    #[test]
    fn link_forms_are_equivalent() {
        let expected = ServiceLink::with_alias("db", "database");
        for entry in ["db:database", "db: database", " db : database "] {
            assert_eq!(parse_link("web.links", entry).expect(entry), expected);
        }
        assert_eq!(parse_link("web.links", "db").expect("bare"), ServiceLink::new("db"));
        assert_eq!(parse_link("web.links", "db:").expect("empty alias"), ServiceLink::new("db"));
    }

    #[test]
    fn empty_target_is_rejected() {
        assert!(parse_link("web.links", ":alias").is_err());
    }

    #[test]
    fn duplicate_target_keeps_first_alias() {
        let mut links = Vec::new();
        collect_links(
            "web",
            &["db:first".to_string(), "cache".to_string(), "db:second".to_string()],
            &mut links,
        )
        .expect("collect");
        assert_eq!(
            links,
            [ServiceLink::with_alias("db", "first"), ServiceLink::new("cache")]
        );
    }

    fn context() -> ResolutionContext {
        let manifest = Manifest::parse(
            "web:\n  image: x\n  labels: {io.rancher.sidekicks: helper}\nhelper:\n  image: x\n\
             db:\n  image: x\n",
            Path::new("."),
        )
        .expect("valid manifest");
        ResolutionContext::from_manifest(&manifest).expect("valid context")
    }

    fn service(name: &str, links: &[ServiceLink]) -> LogicalService {
        let mut service = LogicalService::new(name, ServiceKind::Standard);
        service.consumed_services = links.to_vec();
        service
    }

    #[test]
    fn edges_follow_service_order() {
        let services = [
            service("web", &[ServiceLink::with_alias("db", "database")]),
            service("db", &[]),
        ];
        let edges = resolve_links(&services, &context()).expect("resolve");
        assert_eq!(
            edges,
            [ConsumeMapEdge {
                source: "web".into(),
                target: "db".into(),
                alias: "database".into(),
            }]
        );
    }

    #[test]
    fn self_link_is_rejected() {
        let services = [service("web", &[ServiceLink::new("web")])];
        let err = resolve_links(&services, &context()).unwrap_err();
        assert!(matches!(err, CorralError::SelfLink { .. }), "got: {err}");
    }

    #[test]
    fn link_to_sidekick_is_unknown() {
        let services = [service("db", &[ServiceLink::new("helper")])];
        let err = resolve_links(&services, &context()).unwrap_err();
        assert!(
            matches!(err, CorralError::UnknownLinkTarget { ref target, .. } if target == "helper"),
            "got: {err}"
        );
    }
}
