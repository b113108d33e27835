//! In-memory implementation of [`OrchestrationApi`].
//!
//! Keeps environments, services and consume maps in process and records
//! every call, so tests and dry runs can assert on what would have been
//! sent. Clones share the same state.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use corral_common::error::{CorralError, Result};
use corral_common::types::{ConsumeMapId, EnvironmentId, ServiceId};
use corral_compose::LogicalService;

use super::{ConsumeMap, Environment, OrchestrationApi, Operation, ServiceRecord};

const ACTIVE: &str = "active";
const REMOVED: &str = "removed";

/// One recorded API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Operation invoked.
    pub operation: Operation,
    /// Name or identifier the call was about.
    pub target: String,
}

#[derive(Debug, Default)]
struct State {
    environments: Vec<Environment>,
    services: Vec<ServiceRecord>,
    consume_maps: Vec<ConsumeMap>,
    calls: Vec<Call>,
    fail_on: HashSet<Operation>,
}

impl State {
    fn record(&mut self, operation: Operation, target: impl Into<String>) -> Result<()> {
        let target = target.into();
        tracing::debug!(operation = %operation, target = %target, "in-memory API call");
        self.calls.push(Call { operation, target });
        if self.fail_on.contains(&operation) {
            return Err(CorralError::transport(operation.as_str(), "injected failure"));
        }
        Ok(())
    }
}

/// Orchestration API backed by process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryApi {
    state: Arc<Mutex<State>>,
}

impl InMemoryApi {
    /// Creates an empty API.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every later call of `operation` fail with a transport error.
    pub fn fail_on(&self, operation: Operation) {
        let _ = self.state().fail_on.insert(operation);
    }

    /// Lifts every injected failure.
    pub fn clear_failures(&self) {
        self.state().fail_on.clear();
    }

    /// Every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Calls that changed state, in order.
    #[must_use]
    pub fn mutations(&self) -> Vec<Call> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.operation.is_mutation())
            .cloned()
            .collect()
    }

    /// Forgets the recorded calls.
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Active environments.
    #[must_use]
    pub fn environments(&self) -> Vec<Environment> {
        self.state()
            .environments
            .iter()
            .filter(|e| e.is_active())
            .cloned()
            .collect()
    }

    /// Active service called `name`, in any environment.
    #[must_use]
    pub fn service(&self, name: &str) -> Option<ServiceRecord> {
        self.state()
            .services
            .iter()
            .find(|s| s.name == name && s.is_active())
            .cloned()
    }

    /// Active consume maps.
    #[must_use]
    pub fn consume_maps(&self) -> Vec<ConsumeMap> {
        self.state()
            .consume_maps
            .iter()
            .filter(|m| m.is_active())
            .cloned()
            .collect()
    }

    /// Active links as `source -> target as alias`, resolved by service name.
    #[must_use]
    pub fn links(&self) -> Vec<String> {
        let state = self.state();
        let name_of = |id: &ServiceId| {
            state
                .services
                .iter()
                .find(|s| &s.id == id)
                .map_or_else(|| id.to_string(), |s| s.name.clone())
        };
        state
            .consume_maps
            .iter()
            .filter(|m| m.is_active())
            .map(|m| {
                let consumed = name_of(&m.consumed_service_id);
                let alias = m.name.clone().unwrap_or_else(|| consumed.clone());
                format!("{} -> {consumed} as {alias}", name_of(&m.service_id))
            })
            .collect()
    }

    /// Stores a consume map as is, bypassing the call log.
    ///
    /// Lets tests seed server-side state the engine would never create,
    /// such as duplicate or half-removed links.
    pub fn insert_consume_map(&self, map: ConsumeMap) {
        self.state().consume_maps.push(map);
    }
}

impl OrchestrationApi for InMemoryApi {
    fn create_environment(&self, name: &str) -> Result<Environment> {
        let mut state = self.state();
        state.record(Operation::CreateEnvironment, name)?;
        let environment = Environment {
            id: EnvironmentId::generate(),
            name: name.to_string(),
            state: ACTIVE.to_string(),
        };
        state.environments.push(environment.clone());
        Ok(environment)
    }

    fn list_environments(&self, name: Option<&str>) -> Result<Vec<Environment>> {
        let mut state = self.state();
        state.record(Operation::ListEnvironments, name.unwrap_or("*"))?;
        Ok(state
            .environments
            .iter()
            .filter(|e| name.is_none_or(|n| e.name == n))
            .cloned()
            .collect())
    }

    fn create_service(
        &self,
        environment: &EnvironmentId,
        service: &LogicalService,
    ) -> Result<ServiceRecord> {
        let mut state = self.state();
        state.record(Operation::CreateService, &service.name)?;
        if !state.environments.iter().any(|e| &e.id == environment) {
            return Err(CorralError::NotFound {
                kind: "environment",
                id: environment.to_string(),
            });
        }
        let record = ServiceRecord {
            id: ServiceId::generate(),
            name: service.name.clone(),
            kind: service.kind.api_type().to_string(),
            environment_id: environment.clone(),
            state: ACTIVE.to_string(),
            launch_config: service
                .launch_config
                .as_ref()
                .map(serde_json::to_value)
                .transpose()?,
        };
        state.services.push(record.clone());
        Ok(record)
    }

    fn update_service(&self, id: &ServiceId, service: &LogicalService) -> Result<ServiceRecord> {
        let mut state = self.state();
        state.record(Operation::UpdateService, id.as_str())?;
        let launch_config = service
            .launch_config
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;
        let record = state
            .services
            .iter_mut()
            .find(|s| &s.id == id)
            .ok_or_else(|| CorralError::NotFound {
                kind: "service",
                id: id.to_string(),
            })?;
        record.launch_config = launch_config;
        Ok(record.clone())
    }

    fn list_services(&self, environment: &EnvironmentId) -> Result<Vec<ServiceRecord>> {
        let mut state = self.state();
        state.record(Operation::ListServices, environment.as_str())?;
        Ok(state
            .services
            .iter()
            .filter(|s| &s.environment_id == environment)
            .cloned()
            .collect())
    }

    fn create_consume_map(
        &self,
        service: &ServiceId,
        consumed: &ServiceId,
        alias: &str,
    ) -> Result<ConsumeMap> {
        let mut state = self.state();
        state.record(
            Operation::CreateConsumeMap,
            format!("{service} -> {consumed} as {alias}"),
        )?;
        let map = ConsumeMap {
            id: ConsumeMapId::generate(),
            service_id: service.clone(),
            consumed_service_id: consumed.clone(),
            name: Some(alias.to_string()),
            state: ACTIVE.to_string(),
        };
        state.consume_maps.push(map.clone());
        Ok(map)
    }

    fn list_consume_maps(&self, service: &ServiceId) -> Result<Vec<ConsumeMap>> {
        let mut state = self.state();
        state.record(Operation::ListConsumeMaps, service.as_str())?;
        Ok(state
            .consume_maps
            .iter()
            .filter(|m| &m.service_id == service)
            .cloned()
            .collect())
    }

    fn delete_consume_map(&self, id: &ConsumeMapId) -> Result<()> {
        let mut state = self.state();
        state.record(Operation::DeleteConsumeMap, id.as_str())?;
        let map = state
            .consume_maps
            .iter_mut()
            .find(|m| &m.id == id)
            .ok_or_else(|| CorralError::NotFound {
                kind: "consume map",
                id: id.to_string(),
            })?;
        REMOVED.clone_into(&mut map.state);
        Ok(())
    }

    fn delete_environment(&self, id: &EnvironmentId) -> Result<()> {
        let mut state = self.state();
        state.record(Operation::DeleteEnvironment, id.as_str())?;
        let before = state.environments.len();
        state.environments.retain(|e| &e.id != id);
        if state.environments.len() == before {
            return Err(CorralError::NotFound {
                kind: "environment",
                id: id.to_string(),
            });
        }
        let removed: HashSet<ServiceId> = state
            .services
            .iter()
            .filter(|s| &s.environment_id == id)
            .map(|s| s.id.clone())
            .collect();
        state.services.retain(|s| !removed.contains(&s.id));
        state.consume_maps.retain(|m| {
            !removed.contains(&m.service_id) && !removed.contains(&m.consumed_service_id)
        });
        Ok(())
    }
}
