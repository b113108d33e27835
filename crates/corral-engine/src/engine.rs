//! Project reconciler.
//!
//! Turns a manifest into API calls against a named project. Everything is
//! resolved and validated before the first mutating call; after that the
//! call order is environment, service creates and updates, link creates,
//! link deletes. Services missing from the manifest are never deleted.

use std::collections::{HashMap, HashSet};
use std::fmt;

use corral_common::error::{CorralError, Result};
use corral_common::types::{ConsumeMapId, EnvironmentId, ServiceId};
use corral_compose::{
    ConsumeMapEdge, LogicalService, Manifest, ResolvedProject, ServiceKind, resolve_manifest,
    resolve_with_existing,
};
use indexmap::IndexMap;

use crate::api::{ConsumeMap, Environment, OrchestrationApi, ServiceRecord};

/// How [`Engine::reconcile`] treats a project that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Fail if the project exists.
    Create,
    /// Converge an existing project onto the manifest, or create it.
    Up,
}

/// One change applied to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// The project environment was created.
    CreatedEnvironment {
        /// Project name.
        name: String,
    },
    /// A service was created.
    CreatedService {
        /// Service name.
        name: String,
        /// Service kind.
        kind: ServiceKind,
    },
    /// An existing service had its configuration replaced.
    UpdatedService {
        /// Service name.
        name: String,
    },
    /// An existing service kept its server-side type instead of the
    /// manifest's.
    KindKept {
        /// Service name.
        name: String,
        /// API type on the server.
        kept: String,
        /// Kind the manifest asked for.
        requested: ServiceKind,
    },
    /// A link was created.
    CreatedLink(ConsumeMapEdge),
    /// A stale or duplicate link was deleted.
    DeletedLink(ConsumeMapEdge),
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreatedEnvironment { name } => write!(f, "created project {name}"),
            Self::CreatedService { name, kind } => write!(f, "created {kind} service {name}"),
            Self::UpdatedService { name } => write!(f, "updated service {name}"),
            Self::KindKept {
                name,
                kept,
                requested,
            } => write!(f, "kept type {kept} of service {name} (manifest asks for {requested})"),
            Self::CreatedLink(edge) => write!(f, "linked {edge}"),
            Self::DeletedLink(edge) => write!(f, "unlinked {edge}"),
        }
    }
}

/// Outcome of a reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    /// Project name.
    pub name: String,
    /// Environment backing the project.
    pub environment_id: EnvironmentId,
    /// Services of the manifest as submitted.
    pub services: Vec<LogicalService>,
    /// Server-side IDs of the manifest services, in manifest order.
    pub service_ids: IndexMap<String, ServiceId>,
    /// Links the manifest asks for.
    pub edges: Vec<ConsumeMapEdge>,
    /// Changes applied, in call order.
    pub changes: Vec<Change>,
}

/// Link key as the server sees it: consumed service and alias.
type LinkKey = (ServiceId, String);

/// A link missing on the server.
struct LinkCreate {
    edge: ConsumeMapEdge,
    source: ServiceId,
    consumed: ServiceId,
}

/// A server-side link the manifest no longer asks for.
struct LinkDelete {
    edge: ConsumeMapEdge,
    id: ConsumeMapId,
}

/// Reconciles manifests against an orchestration API.
pub struct Engine {
    api: Box<dyn OrchestrationApi>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

impl Engine {
    /// Creates an engine talking to `api`.
    #[must_use]
    pub fn new(api: Box<dyn OrchestrationApi>) -> Self {
        Self { api }
    }

    /// Creates the project; fails if it already exists.
    ///
    /// # Errors
    ///
    /// See [`Engine::reconcile`].
    pub fn create(&self, name: &str, manifest: &Manifest) -> Result<Project> {
        self.reconcile(name, manifest, Mode::Create)
    }

    /// Creates the project or converges it onto the manifest.
    ///
    /// # Errors
    ///
    /// See [`Engine::reconcile`].
    pub fn up(&self, name: &str, manifest: &Manifest) -> Result<Project> {
        self.reconcile(name, manifest, Mode::Up)
    }

    /// Reconciles project `name` with `manifest`.
    ///
    /// # Errors
    ///
    /// Returns [`CorralError::ProjectExists`] in [`Mode::Create`] when the
    /// project exists, any validation error of the manifest before a single
    /// mutating call, and [`CorralError::Transport`] if an API call fails.
    /// A transport failure leaves the changes made so far in place; running
    /// `up` again converges.
    pub fn reconcile(&self, name: &str, manifest: &Manifest, mode: Mode) -> Result<Project> {
        tracing::info!(project = %name, ?mode, services = manifest.len(), "reconciling project");

        let environment = self.find_environment(name)?;
        if mode == Mode::Create && environment.is_some() {
            return Err(CorralError::ProjectExists {
                name: name.to_string(),
            });
        }
        let existing: Vec<ServiceRecord> = match &environment {
            Some(env) => self
                .api
                .list_services(&env.id)?
                .into_iter()
                .filter(ServiceRecord::is_active)
                .collect(),
            None => Vec::new(),
        };
        let resolved = resolve_with_existing(manifest, existing.iter().map(|s| s.name.clone()))?;
        let current_links = self.current_links(&resolved, &existing)?;

        let mut changes = Vec::new();
        let environment_id = match environment {
            Some(env) => {
                tracing::debug!(project = %name, id = %env.id, "project exists");
                env.id
            }
            None => {
                let env = self.api.create_environment(name)?;
                tracing::info!(project = %name, id = %env.id, "created project");
                changes.push(Change::CreatedEnvironment {
                    name: name.to_string(),
                });
                env.id
            }
        };

        let mut known: HashMap<String, ServiceId> = existing
            .iter()
            .map(|s| (s.name.clone(), s.id.clone()))
            .collect();
        let mut services = Vec::with_capacity(resolved.services.len());
        let mut service_ids = IndexMap::with_capacity(resolved.services.len());
        for service in &resolved.services {
            let record = existing.iter().find(|s| s.name == service.name);
            let (id, submitted) = match record {
                Some(record) => self.update(record, service, &mut changes)?,
                None => {
                    let created = self.api.create_service(&environment_id, service)?;
                    tracing::info!(
                        service = %service.name,
                        kind = %service.kind,
                        id = %created.id,
                        "created service"
                    );
                    changes.push(Change::CreatedService {
                        name: service.name.clone(),
                        kind: service.kind,
                    });
                    (created.id, service.clone())
                }
            };
            let _ = known.insert(service.name.clone(), id.clone());
            let _ = service_ids.insert(service.name.clone(), id);
            services.push(submitted);
        }

        let (creates, deletes) = diff_links(&resolved, &known, &existing, &current_links)?;
        for op in creates {
            let _ = self
                .api
                .create_consume_map(&op.source, &op.consumed, &op.edge.alias)?;
            tracing::debug!(link = %op.edge, "created link");
            changes.push(Change::CreatedLink(op.edge));
        }
        for op in deletes {
            self.api.delete_consume_map(&op.id)?;
            tracing::debug!(link = %op.edge, id = %op.id, "deleted link");
            changes.push(Change::DeletedLink(op.edge));
        }

        tracing::info!(project = %name, changes = changes.len(), "project reconciled");
        Ok(Project {
            name: name.to_string(),
            environment_id,
            services,
            service_ids,
            edges: resolved.edges,
            changes,
        })
    }

    /// Deletes project `name` and everything in it.
    ///
    /// # Errors
    ///
    /// Returns [`CorralError::NotFound`] if the project does not exist and
    /// [`CorralError::Transport`] if an API call fails.
    pub fn teardown(&self, name: &str) -> Result<EnvironmentId> {
        let env = self
            .find_environment(name)?
            .ok_or_else(|| CorralError::NotFound {
                kind: "project",
                id: name.to_string(),
            })?;
        self.api.delete_environment(&env.id)?;
        tracing::info!(project = %name, id = %env.id, "deleted project");
        Ok(env.id)
    }

    fn find_environment(&self, name: &str) -> Result<Option<Environment>> {
        Ok(self
            .api
            .list_environments(Some(name))?
            .into_iter()
            .find(|e| e.name == name && e.is_active()))
    }

    /// Active consume maps of every manifest service that already exists.
    fn current_links(
        &self,
        resolved: &ResolvedProject,
        existing: &[ServiceRecord],
    ) -> Result<HashMap<ServiceId, Vec<ConsumeMap>>> {
        let mut links = HashMap::new();
        for service in &resolved.services {
            let Some(record) = existing.iter().find(|s| s.name == service.name) else {
                continue;
            };
            let maps: Vec<_> = self
                .api
                .list_consume_maps(&record.id)?
                .into_iter()
                .filter(ConsumeMap::is_active)
                .collect();
            let _ = links.insert(record.id.clone(), maps);
        }
        Ok(links)
    }

    fn update(
        &self,
        record: &ServiceRecord,
        service: &LogicalService,
        changes: &mut Vec<Change>,
    ) -> Result<(ServiceId, LogicalService)> {
        let mut submitted = service.clone();
        match record.service_kind() {
            Some(kind) if kind == service.kind => {}
            server_kind => {
                tracing::warn!(
                    service = %service.name,
                    kept = %record.kind,
                    requested = %service.kind,
                    "service type cannot change, keeping the existing one"
                );
                changes.push(Change::KindKept {
                    name: service.name.clone(),
                    kept: record.kind.clone(),
                    requested: service.kind,
                });
                if let Some(kind) = server_kind {
                    submitted.kind = kind;
                }
            }
        }
        let updated = self.api.update_service(&record.id, &submitted)?;
        tracing::info!(service = %service.name, id = %updated.id, "updated service");
        changes.push(Change::UpdatedService {
            name: service.name.clone(),
        });
        Ok((updated.id, submitted))
    }
}

/// Splits the wanted links into creates and deletes against what the server
/// has. Matching links are left alone; server-side duplicates of one key
/// keep their first entry.
fn diff_links(
    resolved: &ResolvedProject,
    known: &HashMap<String, ServiceId>,
    existing: &[ServiceRecord],
    current: &HashMap<ServiceId, Vec<ConsumeMap>>,
) -> Result<(Vec<LinkCreate>, Vec<LinkDelete>)> {
    let name_of: HashMap<&ServiceId, &str> =
        existing.iter().map(|s| (&s.id, s.name.as_str())).collect();
    let id_of = |name: &str| {
        known.get(name).cloned().ok_or_else(|| CorralError::NotFound {
            kind: "service",
            id: name.to_string(),
        })
    };

    let mut creates = Vec::new();
    let mut deletes = Vec::new();
    for service in &resolved.services {
        let source = id_of(&service.name)?;
        let mut wanted: IndexMap<LinkKey, &ConsumeMapEdge> = IndexMap::new();
        for edge in resolved.edges_from(&service.name) {
            let _ = wanted.insert((id_of(&edge.target)?, edge.alias.clone()), edge);
        }

        let mut kept: HashSet<LinkKey> = HashSet::new();
        for map in current.get(&source).map_or(&[][..], Vec::as_slice) {
            let target = name_of
                .get(&map.consumed_service_id)
                .map_or_else(|| map.consumed_service_id.to_string(), |n| (*n).to_string());
            let alias = map
                .name
                .clone()
                .filter(|a| !a.is_empty())
                .unwrap_or_else(|| target.clone());
            let key = (map.consumed_service_id.clone(), alias.clone());
            if wanted.contains_key(&key) && kept.insert(key) {
                continue;
            }
            deletes.push(LinkDelete {
                edge: ConsumeMapEdge {
                    source: service.name.clone(),
                    target,
                    alias,
                },
                id: map.id.clone(),
            });
        }

        for (key, edge) in wanted {
            if kept.contains(&key) {
                continue;
            }
            creates.push(LinkCreate {
                edge: edge.clone(),
                source: source.clone(),
                consumed: key.0,
            });
        }
    }
    Ok((creates, deletes))
}

/// Resolves `manifest` without any API call.
///
/// # Errors
///
/// Returns the first validation error of the manifest.
pub fn plan(manifest: &Manifest) -> Result<ResolvedProject> {
    let resolved = resolve_manifest(manifest)?;
    tracing::info!(
        services = resolved.services.len(),
        links = resolved.edges.len(),
        "planned project"
    );
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::api::Operation;
    use crate::api::memory::InMemoryApi;

    fn manifest(text: &str) -> Manifest {
        Manifest::parse(text, Path::new(".")).expect("valid manifest")
    }

    #[test]
    fn change_display() {
        let edge = ConsumeMapEdge {
            source: "lb".into(),
            target: "web".into(),
            alias: "front".into(),
        };
        assert_eq!(Change::CreatedLink(edge).to_string(), "linked lb -> web (as front)");
        let kept = Change::KindKept {
            name: "lb".into(),
            kept: "loadBalancerService".into(),
            requested: ServiceKind::Standard,
        };
        assert!(kept.to_string().starts_with("kept type loadBalancerService of service lb"));
    }

    #[test]
    fn plan_makes_no_calls() {
        let resolved = plan(&manifest("web:\n  image: nginx\n  links: [db]\ndb:\n  image: mysql\n"))
            .expect("plan");
        assert_eq!(resolved.services.len(), 2);
        assert_eq!(resolved.edges.len(), 1);
    }

    #[test]
    fn create_orders_environment_services_links() {
        let api = InMemoryApi::new();
        let engine = Engine::new(Box::new(api.clone()));
        let project = engine
            .create(
                "demo",
                &manifest("web:\n  image: nginx\n  links: [db]\ndb:\n  image: mysql\n"),
            )
            .expect("create");

        let ops: Vec<_> = api.mutations().iter().map(|c| c.operation).collect();
        assert_eq!(
            ops,
            [
                Operation::CreateEnvironment,
                Operation::CreateService,
                Operation::CreateService,
                Operation::CreateConsumeMap,
            ]
        );
        assert_eq!(project.service_ids.keys().collect::<Vec<_>>(), ["web", "db"]);
        assert_eq!(api.links(), ["web -> db as db"]);
    }

    #[test]
    fn server_link_without_name_matches_target_name() {
        let api = InMemoryApi::new();
        let engine = Engine::new(Box::new(api.clone()));
        let text = "web:\n  image: nginx\n  links: [db]\ndb:\n  image: mysql\n";
        let _ = engine.create("demo", &manifest(text)).expect("create");

        let mut map = api.consume_maps().remove(0);
        api.delete_consume_map(&map.id).expect("delete");
        map.id = corral_common::types::ConsumeMapId::new("1sc-unnamed");
        map.name = None;
        api.insert_consume_map(map);
        api.clear_calls();

        let project = engine.up("demo", &manifest(text)).expect("up");
        assert!(
            !project
                .changes
                .iter()
                .any(|c| matches!(c, Change::CreatedLink(_) | Change::DeletedLink(_))),
            "changes: {:?}",
            project.changes
        );
    }
}
