//! Orchestration API client contract.
//!
//! Records mirror the API's JSON resources. Only the fields the engine
//! reads are modelled; anything else the server sends is ignored.

pub mod http;
pub mod memory;

use std::fmt;

use corral_common::error::Result;
use corral_common::types::{ConsumeMapId, EnvironmentId, ServiceId};
use corral_compose::{LogicalService, ServiceKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Resource states that no longer count as present.
const INACTIVE_STATES: [&str; 4] = ["removed", "removing", "purged", "purging"];

fn is_active_state(state: &str) -> bool {
    !INACTIVE_STATES.contains(&state)
}

/// Server-side record of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    /// Environment identifier.
    pub id: EnvironmentId,
    /// Project name.
    pub name: String,
    /// Lifecycle state.
    #[serde(default)]
    pub state: String,
}

impl Environment {
    /// False once the environment is being or has been removed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        is_active_state(&self.state)
    }
}

/// Server-side record of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    /// Service identifier.
    pub id: ServiceId,
    /// Service name, unique within its environment.
    pub name: String,
    /// API resource type (`service`, `loadBalancerService`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Owning environment.
    pub environment_id: EnvironmentId,
    /// Lifecycle state.
    #[serde(default)]
    pub state: String,
    /// Current primary launch config.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_config: Option<Value>,
}

impl ServiceRecord {
    /// Parsed service kind, `None` for a type this tool does not manage.
    #[must_use]
    pub fn service_kind(&self) -> Option<ServiceKind> {
        ServiceKind::from_api_type(&self.kind)
    }

    /// False once the service is being or has been removed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        is_active_state(&self.state)
    }
}

/// Server-side record of a link between two services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumeMap {
    /// Consume-map identifier.
    pub id: ConsumeMapId,
    /// Consuming service.
    pub service_id: ServiceId,
    /// Consumed service.
    pub consumed_service_id: ServiceId,
    /// Link alias; unset means the consumed service's name.
    #[serde(default)]
    pub name: Option<String>,
    /// Lifecycle state.
    #[serde(default)]
    pub state: String,
}

impl ConsumeMap {
    /// False once the link is being or has been removed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        is_active_state(&self.state)
    }
}

/// Names of the API operations, for logs and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Create an environment.
    CreateEnvironment,
    /// List environments by name.
    ListEnvironments,
    /// Create a service.
    CreateService,
    /// Replace a service's configuration.
    UpdateService,
    /// List the services of an environment.
    ListServices,
    /// Create a consume map.
    CreateConsumeMap,
    /// List the consume maps of a service.
    ListConsumeMaps,
    /// Delete a consume map.
    DeleteConsumeMap,
    /// Delete an environment.
    DeleteEnvironment,
}

impl Operation {
    /// Human-readable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateEnvironment => "create environment",
            Self::ListEnvironments => "list environments",
            Self::CreateService => "create service",
            Self::UpdateService => "update service",
            Self::ListServices => "list services",
            Self::CreateConsumeMap => "create consume map",
            Self::ListConsumeMaps => "list consume maps",
            Self::DeleteConsumeMap => "delete consume map",
            Self::DeleteEnvironment => "delete environment",
        }
    }

    /// Whether the operation changes server state.
    #[must_use]
    pub const fn is_mutation(self) -> bool {
        !matches!(
            self,
            Self::ListEnvironments | Self::ListServices | Self::ListConsumeMaps
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client contract of the orchestration API.
///
/// Implementors perform one blocking call per method and never retry.
pub trait OrchestrationApi: Send + Sync {
    /// Creates an environment named `name`.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the call fails.
    fn create_environment(&self, name: &str) -> Result<Environment>;

    /// Lists environments, optionally only those called `name`.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the call fails.
    fn list_environments(&self, name: Option<&str>) -> Result<Vec<Environment>>;

    /// Creates `service` inside `environment`.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the call fails.
    fn create_service(
        &self,
        environment: &EnvironmentId,
        service: &LogicalService,
    ) -> Result<ServiceRecord>;

    /// Replaces the configuration of service `id` with `service`.
    ///
    /// The server keeps the service's type.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the call fails.
    fn update_service(&self, id: &ServiceId, service: &LogicalService) -> Result<ServiceRecord>;

    /// Lists the services of `environment`.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the call fails.
    fn list_services(&self, environment: &EnvironmentId) -> Result<Vec<ServiceRecord>>;

    /// Links `service` to `consumed` under `alias`.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the call fails.
    fn create_consume_map(
        &self,
        service: &ServiceId,
        consumed: &ServiceId,
        alias: &str,
    ) -> Result<ConsumeMap>;

    /// Lists the consume maps whose consuming side is `service`.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the call fails.
    fn list_consume_maps(&self, service: &ServiceId) -> Result<Vec<ConsumeMap>>;

    /// Deletes a consume map.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the call fails.
    fn delete_consume_map(&self, id: &ConsumeMapId) -> Result<()>;

    /// Deletes an environment and everything in it.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the call fails.
    fn delete_environment(&self, id: &EnvironmentId) -> Result<()>;
}

/// Request body that creates `service` in `environment`.
///
/// # Errors
///
/// Returns a serialization error if the service cannot be encoded.
pub fn create_payload(environment: &EnvironmentId, service: &LogicalService) -> Result<Value> {
    let mut payload = serde_json::to_value(service)?;
    if let Value::Object(fields) = &mut payload {
        let _ = fields.insert(
            "environmentId".to_string(),
            Value::String(environment.as_str().to_string()),
        );
    }
    Ok(payload)
}

/// Request body that replaces the configuration of an existing service.
///
/// Name and type are left out; the server keeps both.
///
/// # Errors
///
/// Returns a serialization error if the service cannot be encoded.
pub fn update_payload(service: &LogicalService) -> Result<Value> {
    let mut payload = serde_json::to_value(service)?;
    if let Value::Object(fields) = &mut payload {
        let _ = fields.remove("name");
        let _ = fields.remove("type");
    }
    Ok(payload)
}
