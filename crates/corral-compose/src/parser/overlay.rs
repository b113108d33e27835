//! Per-project overlay file (`rancher-compose.yml`).
//!
//! Top-level keys name services of the manifest; each entry may set
//! `scale`, `health_check`, `load_balancer_config` and `external_ips`,
//! replacing the manifest's value.

use corral_common::error::{CorralError, Result};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_yaml::Value;

use super::fields::{normalize_field, text};
use super::spec::ServiceSpec;

/// Applies an overlay document to the parsed services.
///
/// # Errors
///
/// Returns [`CorralError::Parse`] if the overlay is malformed, names a
/// service missing from the manifest, or sets an unsupported key.
pub(crate) fn apply(
    services: &mut IndexMap<String, ServiceSpec>,
    document: &str,
    location: &str,
) -> Result<()> {
    let value: Value =
        serde_yaml::from_str(document).map_err(|e| CorralError::parse(location, e.to_string()))?;
    let entries = match value {
        Value::Null => return Ok(()),
        Value::Mapping(entries) => entries,
        _ => {
            return Err(CorralError::parse(
                location,
                "top level must be a mapping of service names",
            ));
        }
    };

    for (name, entry) in entries {
        let name = text(location, name)?;
        let spec = services.get_mut(&name).ok_or_else(|| {
            CorralError::parse(
                location,
                format!("service \"{name}\" is not defined in the manifest"),
            )
        })?;
        let Value::Mapping(entry) = entry else {
            return Err(CorralError::parse(name, "overlay entry must be a mapping"));
        };
        for (key, value) in entry {
            let key = text(&name, key)?;
            let value = normalize_field(&name, &key, value)?;
            let field = format!("{name}.{key}");
            match key.as_str() {
                "scale" => spec.scale = Some(typed(&field, value)?),
                "health_check" => spec.health_check = Some(typed(&field, value)?),
                "load_balancer_config" => spec.load_balancer_config = Some(typed(&field, value)?),
                "external_ips" => spec.external_ips = typed(&field, value)?,
                _ => {
                    return Err(CorralError::parse(
                        field,
                        "not supported in the overlay file",
                    ));
                }
            }
            tracing::debug!(service = %name, field = %key, "applied overlay field");
        }
    }
    Ok(())
}

fn typed<T: DeserializeOwned>(location: &str, value: Value) -> Result<T> {
    serde_yaml::from_value(value).map_err(|e| CorralError::parse(location, e.to_string()))
}
