//! Launch config builder.
//!
//! Maps one service entry to the [`LaunchConfig`] of a single container.
//! `siblings` always holds every launch config name of the logical service
//! the container belongs to, primary first.

use corral_common::constants::{DEFAULT_PORT_PROTOCOL, IMAGE_UUID_PREFIX};
use corral_common::error::{CorralError, Result};

use crate::model::{LaunchConfig, LogConfig, NetworkMode, RestartPolicy};
use crate::parser::{CommandSpec, ServiceSpec};

/// Builds the launch config of `service`.
///
/// The `name` field is left unset; the resolver names secondaries.
///
/// # Errors
///
/// Returns [`CorralError::Parse`] for a missing image and build, an empty
/// build, an unknown network mode or malformed command or memory values;
/// [`CorralError::UnknownNetworkTarget`] for `container:` outside the
/// service; [`CorralError::InvalidRestartPolicy`] for a bad `restart`; and
/// [`CorralError::InvalidSidekick`] for `volumes_from` naming a container
/// outside the service.
pub fn build(service: &str, spec: &ServiceSpec, siblings: &[String]) -> Result<LaunchConfig> {
    if spec.image.is_none() && spec.build.is_none() {
        return Err(CorralError::parse(
            service,
            "either image or build must be set",
        ));
    }
    if spec.build.as_ref().is_some_and(crate::model::BuildSpec::is_empty) {
        return Err(CorralError::parse(
            format!("{service}.build"),
            "build requires a context, dockerfile or remote",
        ));
    }

    let field = |name: &str| format!("{service}.{name}");
    let memory = |name: &str, value: Option<&String>| {
        value.map(|v| parse_memory(&field(name), v)).transpose()
    };
    // Exposed ports are published too, after the explicit ones.
    let ports: Vec<String> = spec.ports.iter().chain(&spec.expose).cloned().collect();

    Ok(LaunchConfig {
        name: None,
        image_uuid: spec
            .image
            .as_ref()
            .map(|image| format!("{IMAGE_UUID_PREFIX}{image}")),
        command: command_words(&field("command"), spec.command.as_ref())?,
        entry_point: command_words(&field("entrypoint"), spec.entrypoint.as_ref())?,
        ports: normalize_ports(&ports),
        expose: spec.expose.clone(),
        data_volumes: spec.volumes.clone(),
        volume_driver: spec.volume_driver.clone(),
        data_volumes_from_launch_configs: volumes_from(service, &spec.volumes_from, siblings)?,
        environment: spec.environment.clone(),
        dns: spec.dns.clone(),
        dns_search: spec.dns_search.clone(),
        cap_add: spec.cap_add.clone(),
        cap_drop: spec.cap_drop.clone(),
        devices: spec.devices.clone(),
        extra_hosts: spec.extra_hosts.clone(),
        restart_policy: spec
            .restart
            .as_deref()
            .map(|value| RestartPolicy::parse(service, value))
            .transpose()?,
        network: network_mode(service, spec.net.as_deref(), siblings)?,
        health_check: spec.health_check.clone(),
        memory: memory("mem_limit", spec.mem_limit.as_ref())?,
        memory_swap: memory("memswap_limit", spec.memswap_limit.as_ref())?,
        cpu_shares: spec.cpu_shares,
        cpu_set: spec.cpuset.clone(),
        privileged: spec.privileged,
        security_opt: spec.security_opt.clone(),
        pid_mode: spec.pid.clone(),
        stdin_open: spec.stdin_open,
        tty: spec.tty,
        hostname: spec.hostname.clone(),
        domain_name: spec.domainname.clone(),
        working_dir: spec.working_dir.clone(),
        user: spec.user.clone(),
        labels: spec.labels.clone(),
        log_config: (spec.log_driver.is_some() || !spec.log_opt.is_empty()).then(|| LogConfig {
            driver: spec.log_driver.clone(),
            config: spec.log_opt.clone(),
        }),
        build: spec.build.clone(),
    })
}

/// Resolves the `net` value of `service`.
///
/// # Errors
///
/// Returns [`CorralError::UnknownNetworkTarget`] if `container:<name>`
/// does not name another launch config of the same service, and
/// [`CorralError::Parse`] for any unrecognized mode.
pub fn network_mode(
    service: &str,
    value: Option<&str>,
    siblings: &[String],
) -> Result<NetworkMode> {
    let Some(value) = value.map(str::trim) else {
        return Ok(NetworkMode::Managed);
    };
    match value {
        "managed" => Ok(NetworkMode::Managed),
        "bridge" => Ok(NetworkMode::Bridge),
        "none" => Ok(NetworkMode::None),
        "host" => Ok(NetworkMode::Host),
        other => {
            let Some(target) = other.strip_prefix("container:").map(str::trim) else {
                return Err(CorralError::parse(
                    format!("{service}.net"),
                    format!("unsupported network mode \"{other}\""),
                ));
            };
            if target != service && siblings.iter().any(|s| s == target) {
                Ok(NetworkMode::Container(target.to_string()))
            } else {
                Err(CorralError::UnknownNetworkTarget {
                    service: service.to_string(),
                    target: target.to_string(),
                })
            }
        }
    }
}

fn command_words(location: &str, command: Option<&CommandSpec>) -> Result<Vec<String>> {
    match command {
        None => Ok(Vec::new()),
        Some(CommandSpec::Exec(words)) => Ok(words.clone()),
        Some(CommandSpec::Shell(line)) => split_command(location, line),
    }
}

/// Splits a command line into words, honouring quotes and backslashes.
///
/// # Errors
///
/// Returns [`CorralError::Parse`] for an unterminated quote or a trailing
/// backslash.
pub fn split_command(location: &str, line: &str) -> Result<Vec<String>> {
    let unterminated = || CorralError::parse(location, format!("unterminated quote in \"{line}\""));
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => current.push(c),
                        None => return Err(unterminated()),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c @ ('"' | '\\' | '$' | '`')) => current.push(c),
                            Some(c) => {
                                current.push('\\');
                                current.push(c);
                            }
                            None => return Err(unterminated()),
                        },
                        Some(c) => current.push(c),
                        None => return Err(unterminated()),
                    }
                }
            }
            '\\' => {
                in_word = true;
                let escaped = chars.next().ok_or_else(|| {
                    CorralError::parse(location, format!("trailing backslash in \"{line}\""))
                })?;
                current.push(escaped);
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

/// Parses integer bytes or `<n>[bkmg]`.
///
/// # Errors
///
/// Returns [`CorralError::Parse`] for anything else, or on overflow.
pub fn parse_memory(location: &str, value: &str) -> Result<u64> {
    let lowered = value.trim().to_ascii_lowercase();
    let (digits, multiplier) = [("g", 1 << 30), ("m", 1 << 20), ("k", 1 << 10), ("b", 1)]
        .into_iter()
        .find_map(|(suffix, multiplier)| {
            lowered
                .strip_suffix(suffix)
                .map(|digits| (digits, multiplier))
        })
        .unwrap_or((lowered.as_str(), 1_u64));
    digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(|| CorralError::parse(location, format!("invalid memory size \"{value}\"")))
}

/// Appends the default protocol where missing and drops duplicates.
#[must_use]
pub fn normalize_ports(ports: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(ports.len());
    for port in ports {
        let port = port.trim();
        let port = if port.contains('/') {
            port.to_string()
        } else {
            format!("{port}/{DEFAULT_PORT_PROTOCOL}")
        };
        if !normalized.contains(&port) {
            normalized.push(port);
        }
    }
    normalized
}

fn volumes_from(service: &str, names: &[String], siblings: &[String]) -> Result<Vec<String>> {
    let mut resolved: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let name = name.trim();
        if name == service || !siblings.iter().any(|s| s == name) {
            return Err(CorralError::sidekick(
                service,
                format!("volumes_from \"{name}\" is not a sidekick of the same service"),
            ));
        }
        if !resolved.iter().any(|r| r == name) {
            resolved.push(name.to_string());
        }
    }
    Ok(resolved)
}
