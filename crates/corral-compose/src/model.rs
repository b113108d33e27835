//! Resolved service graph: the records submitted to the orchestration API.
//!
//! Field names serialize in the API's camelCase wire form; configuration
//! blocks that are also read from the manifest (`health_check`,
//! `load_balancer_config`, `build`) deserialize from snake_case.

use std::fmt;

use corral_common::error::{CorralError, Result};
use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Deserialize, Serialize, Serializer};

/// Kind of a logical service, inferred from its manifest entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceKind {
    /// A plain container service.
    #[serde(rename = "service")]
    Standard,
    /// A load balancer in front of its linked services.
    #[serde(rename = "loadBalancerService")]
    LoadBalancer,
    /// A DNS alias over its linked services.
    #[serde(rename = "dnsService")]
    Dns,
    /// A set of external IP addresses; no containers.
    #[serde(rename = "externalService")]
    External,
}

impl ServiceKind {
    /// Resource type name used by the API.
    #[must_use]
    pub const fn api_type(self) -> &'static str {
        match self {
            Self::Standard => "service",
            Self::LoadBalancer => "loadBalancerService",
            Self::Dns => "dnsService",
            Self::External => "externalService",
        }
    }

    /// Collection that creates resources of this kind.
    #[must_use]
    pub const fn collection(self) -> &'static str {
        match self {
            Self::Standard => "services",
            Self::LoadBalancer => "loadbalancerservices",
            Self::Dns => "dnsservices",
            Self::External => "externalservices",
        }
    }

    /// Parses an API resource type name.
    #[must_use]
    pub fn from_api_type(value: &str) -> Option<Self> {
        match value {
            "service" => Some(Self::Standard),
            "loadBalancerService" => Some(Self::LoadBalancer),
            "dnsService" => Some(Self::Dns),
            "externalService" => Some(Self::External),
            _ => None,
        }
    }

    /// Whether services of this kind run containers.
    #[must_use]
    pub const fn has_launch_config(self) -> bool {
        !matches!(self, Self::External)
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_type())
    }
}

/// Network mode of one container.
///
/// Serialized as `networkMode` plus, for [`NetworkMode::Container`] only,
/// `networkLaunchConfig`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum NetworkMode {
    /// Platform-managed overlay network.
    #[default]
    Managed,
    /// Docker bridge network.
    Bridge,
    /// No networking.
    None,
    /// Host network namespace.
    Host,
    /// Network namespace of another launch config of the same service.
    Container(String),
}

impl NetworkMode {
    /// Wire name of the mode.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Managed => "managed",
            Self::Bridge => "bridge",
            Self::None => "none",
            Self::Host => "host",
            Self::Container(_) => "container",
        }
    }

    /// Target launch config for [`NetworkMode::Container`].
    #[must_use]
    pub fn launch_config(&self) -> Option<&str> {
        match self {
            Self::Container(target) => Some(target),
            _ => None,
        }
    }
}

impl Serialize for NetworkMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let target = self.launch_config();
        let mut map = serializer.serialize_map(Some(1 + usize::from(target.is_some())))?;
        map.serialize_entry("networkMode", self.as_str())?;
        if let Some(target) = target {
            map.serialize_entry("networkLaunchConfig", target)?;
        }
        map.end()
    }
}

/// Container restart policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RestartPolicy {
    /// Always restart.
    Always,
    /// Never restart.
    No,
    /// Restart unless explicitly stopped.
    UnlessStopped,
    /// Restart on non-zero exit, optionally bounded.
    OnFailure {
        /// Upper bound on restarts, if any.
        maximum_retry_count: Option<u32>,
    },
}

impl RestartPolicy {
    /// Parses `<name>` or `<name>:<count>`.
    ///
    /// # Errors
    ///
    /// Returns [`CorralError::InvalidRestartPolicy`] for an unknown name, a
    /// count on a policy other than `on-failure`, or a non-numeric count.
    pub fn parse(service: &str, value: &str) -> Result<Self> {
        let invalid = || CorralError::InvalidRestartPolicy {
            service: service.to_string(),
            value: value.to_string(),
        };
        let (name, count) = match value.trim().split_once(':') {
            Some((name, count)) => (name.trim(), Some(count.trim())),
            None => (value.trim(), None),
        };
        let policy = match (name, count) {
            ("always", None) => Self::Always,
            ("no", None) => Self::No,
            ("unless-stopped", None) => Self::UnlessStopped,
            ("on-failure", None) => Self::OnFailure {
                maximum_retry_count: None,
            },
            ("on-failure", Some(count)) => Self::OnFailure {
                maximum_retry_count: Some(count.parse().map_err(|_| invalid())?),
            },
            _ => return Err(invalid()),
        };
        Ok(policy)
    }

    /// Wire name of the policy.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::No => "no",
            Self::UnlessStopped => "unless-stopped",
            Self::OnFailure { .. } => "on-failure",
        }
    }
}

impl Serialize for RestartPolicy {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let count = match self {
            Self::OnFailure {
                maximum_retry_count,
            } => *maximum_retry_count,
            _ => None,
        };
        let mut state =
            serializer.serialize_struct("RestartPolicy", 1 + usize::from(count.is_some()))?;
        state.serialize_field("name", self.name())?;
        if let Some(count) = count {
            state.serialize_field("maximumRetryCount", &count)?;
        }
        state.end()
    }
}

/// Container health check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    rename_all(serialize = "camelCase", deserialize = "snake_case"),
    deny_unknown_fields
)]
pub struct HealthCheck {
    /// Port probed inside the container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Milliseconds between probes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,
    /// Milliseconds before a probe counts as failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_timeout: Option<u64>,
    /// Consecutive successes before healthy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthy_threshold: Option<u32>,
    /// Consecutive failures before unhealthy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unhealthy_threshold: Option<u32>,
    /// Raw HTTP request line; TCP probe when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_line: Option<String>,
    /// Grace period in milliseconds after start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initializing_timeout: Option<u64>,
    /// Grace period in milliseconds after a restart.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reinitializing_timeout: Option<u64>,
    /// Action taken on unhealthy containers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
}

/// Cookie stickiness driven by an application cookie.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    rename_all(serialize = "camelCase", deserialize = "snake_case"),
    deny_unknown_fields
)]
pub struct AppCookieStickinessPolicy {
    /// Policy name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Cookie to learn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<String>,
    /// Maximum cookie length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    /// Prefix the server id to the cookie.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<bool>,
    /// Learn the cookie from requests as well as responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_learn: Option<bool>,
    /// Where the cookie is looked up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Milliseconds before a learned cookie expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

/// Cookie stickiness driven by a balancer-inserted cookie.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    rename_all(serialize = "camelCase", deserialize = "snake_case"),
    deny_unknown_fields
)]
pub struct LbCookieStickinessPolicy {
    /// Policy name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Cookie inserted by the balancer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<String>,
    /// Cookie domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Hide the cookie from the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indirect: Option<bool>,
    /// Mark responses as non-cacheable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nocache: Option<bool>,
    /// Only insert on POST responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postonly: Option<bool>,
    /// Insertion mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

/// Raw HAProxy configuration sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HaproxyConfig {
    /// Appended to the `global` section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global: Option<String>,
    /// Appended to the `defaults` section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<String>,
}

/// Configuration of a load-balancer service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    rename_all(serialize = "camelCase", deserialize = "snake_case"),
    deny_unknown_fields
)]
pub struct LoadBalancerConfig {
    /// Configuration name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Application-cookie stickiness.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_cookie_stickiness_policy: Option<AppCookieStickinessPolicy>,
    /// Balancer-cookie stickiness.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lb_cookie_stickiness_policy: Option<LbCookieStickinessPolicy>,
    /// Backend health check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheck>,
    /// HAProxy overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub haproxy_config: Option<HaproxyConfig>,
}

/// Image build instructions, passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSpec {
    /// Build context path or URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Dockerfile path inside the context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<String>,
    /// Remote repository holding the context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
}

impl BuildSpec {
    /// True when no build source is named at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.context.is_none() && self.dockerfile.is_none() && self.remote.is_none()
    }
}

/// Logging driver settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogConfig {
    /// Driver name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    /// Driver options.
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub config: IndexMap<String, String>,
}

/// Fully mapped configuration of one container of a service.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchConfig {
    /// Sidekick name; unset on the primary launch config.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `docker:`-prefixed image reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_uuid: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entry_point: Vec<String>,
    /// Published ports as `host:container/proto`, exposed ports included.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub expose: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub data_volumes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_driver: Option<String>,
    /// Sibling launch configs whose volumes are mounted.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub data_volumes_from_launch_configs: Vec<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub environment: IndexMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dns: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dns_search: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cap_add: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cap_drop: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_hosts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart_policy: Option<RestartPolicy>,
    #[serde(flatten)]
    pub network: NetworkMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheck>,
    /// Memory limit in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,
    /// Memory plus swap limit in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_swap: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_shares: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_set: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privileged: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security_opt: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdin_open: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tty: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub labels: IndexMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_config: Option<LogConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildSpec>,
}

/// A link from one service to another under an alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ServiceLink {
    /// Linked service name.
    pub target: String,
    /// Name the target is reachable under; defaults to `target`.
    pub alias: String,
}

impl ServiceLink {
    /// Link whose alias is the target name.
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        let target = target.into();
        Self {
            alias: target.clone(),
            target,
        }
    }

    /// Link with an explicit alias.
    #[must_use]
    pub fn with_alias(target: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            alias: alias.into(),
        }
    }
}

/// Resolved unit submitted to the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicalService {
    /// Unique name within the project.
    pub name: String,
    /// Inferred kind.
    #[serde(rename = "type")]
    pub kind: ServiceKind,
    /// Primary container; absent for external services.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch_config: Option<LaunchConfig>,
    /// One launch config per sidekick, in declaration order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub secondary_launch_configs: Vec<LaunchConfig>,
    /// Addresses of an external service.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub external_ip_addresses: Vec<String>,
    /// Load-balancer settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_balancer_config: Option<LoadBalancerConfig>,
    /// Requested number of instances.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    /// Services this one consumes, first alias per target.
    #[serde(skip)]
    pub consumed_services: Vec<ServiceLink>,
}

impl LogicalService {
    /// Creates an empty service of the given kind.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ServiceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            launch_config: None,
            secondary_launch_configs: Vec::new(),
            external_ip_addresses: Vec::new(),
            load_balancer_config: None,
            scale: None,
            consumed_services: Vec::new(),
        }
    }

    /// Looks up a secondary launch config by sidekick name.
    #[must_use]
    pub fn secondary(&self, name: &str) -> Option<&LaunchConfig> {
        self.secondary_launch_configs
            .iter()
            .find(|lc| lc.name.as_deref() == Some(name))
    }
}

/// Directed link between two services of a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConsumeMapEdge {
    /// Consuming service.
    pub source: String,
    /// Consumed service.
    pub target: String,
    /// Name the target is reachable under from the source.
    pub alias: String,
}

impl fmt::Display for ConsumeMapEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.alias == self.target {
            write!(f, "{} -> {}", self.source, self.target)
        } else {
            write!(f, "{} -> {} (as {})", self.source, self.target, self.alias)
        }
    }
}
