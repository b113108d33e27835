//! Compose manifest parser built on `serde_yaml`.
//!
//! Turns manifest text into an ordered [`Manifest`] through normalization
//! of every field, `extends` resolution, `env_file` loading and typing of
//! the merged entries.

pub mod env_file;
mod extends;
mod fields;
mod overlay;
pub mod spec;

use std::path::{Path, PathBuf};

use corral_common::error::{CorralError, Result};
use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};

use self::extends::{Document, ExtendsResolver};
pub use self::spec::{CommandSpec, ServiceSpec};

/// Ordered mapping of service name to its fully merged entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    services: IndexMap<String, ServiceSpec>,
}

impl Manifest {
    /// Parses manifest text; relative paths resolve against `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`CorralError::Parse`] for malformed structure,
    /// [`CorralError::ExtendsCycle`] for a cycle of `extends` references
    /// and [`CorralError::Io`] for an unreadable referenced file.
    pub fn parse(text: &str, base_dir: &Path) -> Result<Self> {
        Self::parse_document(text, base_dir, None)
    }

    /// Reads and parses a manifest file.
    ///
    /// # Errors
    ///
    /// Same as [`Manifest::parse`], plus [`CorralError::Io`] if `path`
    /// cannot be read.
    pub fn from_file(path: &Path) -> Result<Self> {
        let io_err = |source| CorralError::Io {
            path: path.to_path_buf(),
            source,
        };
        let canonical = path.canonicalize().map_err(io_err)?;
        let text = std::fs::read_to_string(&canonical).map_err(io_err)?;
        let base_dir = canonical
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Self::parse_document(&text, &base_dir, Some(canonical))
    }

    fn parse_document(text: &str, base_dir: &Path, origin: Option<PathBuf>) -> Result<Self> {
        tracing::info!(
            origin = %origin.as_deref().unwrap_or_else(|| Path::new("-")).display(),
            "parsing manifest"
        );
        let root = Document::parse(text, base_dir, origin)?;
        let entries = ExtendsResolver::new(root).resolve_all()?;

        let mut services = IndexMap::with_capacity(entries.len());
        for (name, entry) in entries {
            let spec = finalize(&name, entry)?;
            let _ = services.insert(name, spec);
        }
        tracing::debug!(services = services.len(), "manifest parsed");
        Ok(Self { services })
    }

    /// Applies an overlay document (`rancher-compose.yml` syntax).
    ///
    /// # Errors
    ///
    /// Returns [`CorralError::Parse`] if the overlay is malformed or names
    /// a service that is not in the manifest.
    pub fn apply_overlay(&mut self, text: &str) -> Result<()> {
        overlay::apply(&mut self.services, text, "overlay")
    }

    /// Reads and applies an overlay file.
    ///
    /// # Errors
    ///
    /// Returns [`CorralError::Io`] if the file cannot be read, otherwise as
    /// [`Manifest::apply_overlay`].
    pub fn apply_overlay_file(&mut self, path: &Path) -> Result<()> {
        tracing::info!(path = %path.display(), "applying overlay file");
        let text = std::fs::read_to_string(path).map_err(|source| CorralError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        overlay::apply(&mut self.services, &text, &path.display().to_string())
    }

    /// All services in manifest order.
    #[must_use]
    pub const fn services(&self) -> &IndexMap<String, ServiceSpec> {
        &self.services
    }

    /// Looks up a service entry.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ServiceSpec> {
        self.services.get(name)
    }

    /// Service names in manifest order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    /// Number of services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// True when the manifest declares no service.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Types a fully merged entry.
fn finalize(name: &str, entry: Mapping) -> Result<ServiceSpec> {
    serde_yaml::from_value(Value::Mapping(entry))
        .map_err(|e| CorralError::parse(name, e.to_string()))
}
