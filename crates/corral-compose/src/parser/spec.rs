//! Typed service entry, produced once `extends` and `env_file` are applied.

use indexmap::IndexMap;
use serde::Deserialize;

use crate::model::{BuildSpec, HealthCheck, LoadBalancerConfig};

/// `command`/`entrypoint` in either of its two forms.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CommandSpec {
    /// Shell string, split into words when the launch config is built.
    Shell(String),
    /// Pre-split argument vector.
    Exec(Vec<String>),
}

/// One service entry of a manifest.
///
/// Field names match the manifest keys.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceSpec {
    pub image: Option<String>,
    pub command: Option<CommandSpec>,
    pub entrypoint: Option<CommandSpec>,
    pub ports: Vec<String>,
    pub expose: Vec<String>,
    /// Raw link entries, `svc` or `svc:alias`.
    pub links: Vec<String>,
    pub volumes: Vec<String>,
    pub volumes_from: Vec<String>,
    /// Final environment, `env_file` contents already folded in.
    pub environment: IndexMap<String, String>,
    pub labels: IndexMap<String, String>,
    pub dns: Vec<String>,
    pub dns_search: Vec<String>,
    pub cap_add: Vec<String>,
    pub cap_drop: Vec<String>,
    pub devices: Vec<String>,
    pub security_opt: Vec<String>,
    pub pid: Option<String>,
    pub log_driver: Option<String>,
    pub log_opt: IndexMap<String, String>,
    pub extra_hosts: Vec<String>,
    pub net: Option<String>,
    pub volume_driver: Option<String>,
    pub build: Option<BuildSpec>,
    pub restart: Option<String>,
    pub mem_limit: Option<String>,
    pub memswap_limit: Option<String>,
    pub cpu_shares: Option<u64>,
    pub cpuset: Option<String>,
    pub privileged: Option<bool>,
    pub stdin_open: Option<bool>,
    pub tty: Option<bool>,
    pub hostname: Option<String>,
    pub domainname: Option<String>,
    pub working_dir: Option<String>,
    pub user: Option<String>,
    pub health_check: Option<HealthCheck>,
    pub external_ips: Vec<String>,
    pub load_balancer_config: Option<LoadBalancerConfig>,
    pub scale: Option<u32>,
}

impl ServiceSpec {
    /// Image reference, if any.
    #[must_use]
    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    /// Value of a label, if set.
    #[must_use]
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}
