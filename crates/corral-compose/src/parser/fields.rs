//! Field table of a manifest service entry.
//!
//! Every key a service entry may carry has a [`FieldShape`] that decides
//! how the raw YAML value is normalized and how a child entry is merged
//! over its parent when `extends` is applied.

use corral_common::error::{CorralError, Result};
use serde_yaml::{Mapping, Value};

/// How a manifest field is written and merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldShape {
    /// Scalar coerced to a string; child overrides.
    Text,
    /// Non-negative integer; child overrides.
    Integer,
    /// Boolean; child overrides.
    Flag,
    /// String or list of strings; child overrides.
    Command,
    /// List of strings (a lone scalar is a one-item list); concatenated.
    List,
    /// Like [`FieldShape::List`] but de-duplicated after concatenation.
    SetList,
    /// Links in list or mapping form, stored as `svc[:alias]` strings.
    Links,
    /// String map (a list of `K=V` is accepted); merged key-wise.
    Map,
    /// Structured mapping; child replaces parent wholesale.
    Nested,
    /// `build`: string shorthand for `{context}`; replaced wholesale.
    Build,
    /// `extends`: string shorthand for `{service}`.
    Extends,
}

impl FieldShape {
    /// Looks up the shape of a manifest key; `None` for unsupported keys.
    pub(crate) fn of(key: &str) -> Option<Self> {
        let shape = match key {
            "image" | "pid" | "log_driver" | "net" | "volume_driver" | "restart" | "mem_limit"
            | "memswap_limit" | "cpuset" | "hostname" | "domainname" | "working_dir" | "user" => {
                Self::Text
            }
            "cpu_shares" | "scale" => Self::Integer,
            "privileged" | "stdin_open" | "tty" => Self::Flag,
            "command" | "entrypoint" => Self::Command,
            "volumes" | "volumes_from" | "dns" | "devices" | "security_opt" | "extra_hosts"
            | "expose" | "env_file" | "external_ips" => Self::List,
            "ports" | "cap_add" | "cap_drop" | "dns_search" => Self::SetList,
            "links" => Self::Links,
            "environment" | "labels" | "log_opt" => Self::Map,
            "health_check" | "load_balancer_config" => Self::Nested,
            "build" => Self::Build,
            "extends" => Self::Extends,
            _ => return None,
        };
        Some(shape)
    }
}

/// Normalizes one raw service entry into canonical field forms.
///
/// # Errors
///
/// Returns [`CorralError::Parse`] if the entry is not a mapping, carries
/// an unsupported key, or a value has the wrong type.
pub(crate) fn normalize_entry(service: &str, entry: Value) -> Result<Mapping> {
    let Value::Mapping(raw) = entry else {
        return Err(CorralError::parse(
            service,
            "service entry must be a mapping",
        ));
    };
    let mut normalized = Mapping::new();
    for (key, value) in raw {
        let Value::String(key) = key else {
            return Err(CorralError::parse(service, "field names must be strings"));
        };
        let value = normalize_field(service, &key, value)?;
        let _ = normalized.insert(Value::String(key), value);
    }
    Ok(normalized)
}

/// Normalizes the value of a single field.
///
/// # Errors
///
/// Returns [`CorralError::Parse`] for an unsupported key or a value of
/// the wrong type.
pub(crate) fn normalize_field(service: &str, key: &str, value: Value) -> Result<Value> {
    let shape = FieldShape::of(key)
        .ok_or_else(|| CorralError::parse(service, format!("unsupported field \"{key}\"")))?;
    let location = format!("{service}.{key}");
    match shape {
        FieldShape::Text => text(&location, value).map(Value::String),
        FieldShape::Integer => integer(&location, value).map(|n| Value::Number(n.into())),
        FieldShape::Flag => flag(&location, value).map(Value::Bool),
        FieldShape::Command => match value {
            Value::Sequence(items) => items
                .into_iter()
                .map(|item| text(&location, item).map(Value::String))
                .collect::<Result<Vec<_>>>()
                .map(Value::Sequence),
            other => text(&location, other).map(Value::String),
        },
        FieldShape::List | FieldShape::SetList => string_list(&location, value)
            .map(|items| Value::Sequence(items.into_iter().map(Value::String).collect())),
        FieldShape::Links => links(&location, value),
        FieldShape::Map => string_map(&location, value).map(Value::Mapping),
        FieldShape::Nested => match value {
            Value::Mapping(_) => Ok(value),
            _ => Err(CorralError::parse(location, "expected a mapping")),
        },
        FieldShape::Build => match value {
            Value::String(context) => Ok(single_entry("context", context)),
            Value::Mapping(_) => Ok(value),
            _ => Err(CorralError::parse(location, "expected a path or a mapping")),
        },
        FieldShape::Extends => extends(&location, value),
    }
}

/// Merges `child` over `parent` following each field's shape.
pub(crate) fn merge_entries(parent: &Mapping, child: Mapping) -> Mapping {
    let mut merged = parent.clone();
    for (key, value) in child {
        let shape = key.as_str().and_then(FieldShape::of);
        let combined = match (shape, merged.get(&key)) {
            (Some(FieldShape::List | FieldShape::Links), Some(Value::Sequence(base))) => {
                let mut items = base.clone();
                if let Value::Sequence(extra) = value {
                    items.extend(extra);
                }
                Value::Sequence(items)
            }
            (Some(FieldShape::SetList), Some(Value::Sequence(base))) => {
                let mut items: Vec<Value> = Vec::with_capacity(base.len());
                let extra = match value {
                    Value::Sequence(extra) => extra,
                    _ => Vec::new(),
                };
                for item in base.iter().cloned().chain(extra) {
                    if !items.contains(&item) {
                        items.push(item);
                    }
                }
                Value::Sequence(items)
            }
            (Some(FieldShape::Map), Some(Value::Mapping(base))) => {
                let mut map = base.clone();
                if let Value::Mapping(extra) = value {
                    for (k, v) in extra {
                        let _ = map.insert(k, v);
                    }
                }
                Value::Mapping(map)
            }
            _ => value,
        };
        let _ = merged.insert(key, combined);
    }
    merged
}

fn single_entry(key: &str, value: String) -> Value {
    let mut map = Mapping::new();
    let _ = map.insert(Value::String(key.to_string()), Value::String(value));
    Value::Mapping(map)
}

/// Coerces a scalar into its string form.
pub(crate) fn text(location: &str, value: Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(CorralError::parse(location, "expected a scalar value")),
    }
}

fn integer(location: &str, value: Value) -> Result<u64> {
    let parsed = match &value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| CorralError::parse(location, "expected a non-negative integer"))
}

fn flag(location: &str, value: Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
        _ => Err(CorralError::parse(location, "expected a boolean")),
    }
}

fn string_list(location: &str, value: Value) -> Result<Vec<String>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => items.into_iter().map(|item| text(location, item)).collect(),
        scalar => text(location, scalar).map(|s| vec![s]),
    }
}

fn string_map(location: &str, value: Value) -> Result<Mapping> {
    let mut map = Mapping::new();
    match value {
        Value::Null => {}
        Value::Mapping(entries) => {
            for (key, value) in entries {
                let key = text(location, key)?;
                let value = match value {
                    Value::Null => String::new(),
                    other => text(&format!("{location}.{key}"), other)?,
                };
                let _ = map.insert(Value::String(key), Value::String(value));
            }
        }
        Value::Sequence(items) => {
            for item in items {
                let item = text(location, item)?;
                let (key, value) = item.split_once('=').unwrap_or((item.as_str(), ""));
                let _ = map.insert(
                    Value::String(key.to_string()),
                    Value::String(value.to_string()),
                );
            }
        }
        _ => {
            return Err(CorralError::parse(
                location,
                "expected a mapping or a list of KEY=VALUE",
            ));
        }
    }
    Ok(map)
}

fn links(location: &str, value: Value) -> Result<Value> {
    let entries = match value {
        Value::Mapping(entries) => entries
            .into_iter()
            .map(|(target, alias)| {
                let target = text(location, target)?;
                Ok(match alias {
                    Value::Null => target,
                    alias => format!("{target}:{}", text(location, alias)?),
                })
            })
            .collect::<Result<Vec<_>>>()?,
        other => string_list(location, other)?,
    };
    Ok(Value::Sequence(entries.into_iter().map(Value::String).collect()))
}

fn extends(location: &str, value: Value) -> Result<Value> {
    match value {
        Value::String(service) => Ok(single_entry("service", service)),
        Value::Mapping(entries) => {
            let mut normalized = Mapping::new();
            for (key, value) in entries {
                let key = text(location, key)?;
                if key != "service" && key != "file" {
                    return Err(CorralError::parse(
                        location,
                        format!("unsupported key \"{key}\""),
                    ));
                }
                let value = text(&format!("{location}.{key}"), value)?;
                let _ = normalized.insert(Value::String(key), Value::String(value));
            }
            if normalized.get("service").is_none() {
                return Err(CorralError::parse(location, "missing \"service\""));
            }
            Ok(Value::Mapping(normalized))
        }
        _ => Err(CorralError::parse(
            location,
            "expected a service name or a mapping",
        )),
    }
}
