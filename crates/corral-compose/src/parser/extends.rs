//! Resolution of `extends` within and across manifest files.
//!
//! Each referenced file is loaded once. Resolved entries are memoized per
//! (file, service) so a parent shared by several children is merged once.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use corral_common::error::{CorralError, Result};
use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};

use super::env_file::merge_environment;
use super::fields::{merge_entries, normalize_entry};
use crate::graph::ExtendsGraph;

/// One parsed manifest file with normalized entries.
#[derive(Debug)]
pub(crate) struct Document {
    origin: Option<PathBuf>,
    base_dir: PathBuf,
    entries: IndexMap<String, Mapping>,
}

impl Document {
    /// Parses a manifest document.
    ///
    /// # Errors
    ///
    /// Returns [`CorralError::Parse`] for invalid YAML, a non-mapping
    /// document, or any malformed service entry.
    pub(crate) fn parse(text: &str, base_dir: &Path, origin: Option<PathBuf>) -> Result<Self> {
        let location = origin
            .as_ref()
            .map_or_else(|| "manifest".to_string(), |p| p.display().to_string());
        let value: Value = serde_yaml::from_str(text)
            .map_err(|e| CorralError::parse(location.as_str(), e.to_string()))?;
        let raw = match value {
            Value::Null => Mapping::new(),
            Value::Mapping(raw) => raw,
            _ => {
                return Err(CorralError::parse(
                    location,
                    "top level must be a mapping of service names",
                ));
            }
        };

        let mut entries = IndexMap::with_capacity(raw.len());
        for (name, entry) in raw {
            let Value::String(name) = name else {
                return Err(CorralError::parse(location, "service names must be strings"));
            };
            let entry = normalize_entry(&name, entry)?;
            let _ = entries.insert(name, entry);
        }

        Ok(Self {
            origin,
            base_dir: base_dir.to_path_buf(),
            entries,
        })
    }
}

/// Walks `extends` references starting from a root document.
#[derive(Debug)]
pub(crate) struct ExtendsResolver {
    documents: Vec<Document>,
    by_path: HashMap<PathBuf, usize>,
    resolved: HashMap<(usize, String), Mapping>,
    graph: ExtendsGraph,
}

impl ExtendsResolver {
    pub(crate) fn new(root: Document) -> Self {
        let mut by_path = HashMap::new();
        if let Some(origin) = &root.origin {
            let _ = by_path.insert(origin.clone(), 0);
        }
        Self {
            documents: vec![root],
            by_path,
            resolved: HashMap::new(),
            graph: ExtendsGraph::new(),
        }
    }

    /// Resolves every service of the root document, in document order.
    ///
    /// # Errors
    ///
    /// Returns [`CorralError::ExtendsCycle`] on a cycle, [`CorralError::Io`]
    /// for an unreadable file and [`CorralError::Parse`] for a missing
    /// parent or malformed file.
    pub(crate) fn resolve_all(mut self) -> Result<IndexMap<String, Mapping>> {
        let names: Vec<String> = self
            .documents
            .first()
            .map(|root| root.entries.keys().cloned().collect())
            .unwrap_or_default();
        let mut resolved = IndexMap::with_capacity(names.len());
        for name in names {
            let entry = self.resolve(0, &name)?;
            let _ = resolved.insert(name, entry);
        }
        Ok(resolved)
    }

    fn resolve(&mut self, doc: usize, service: &str) -> Result<Mapping> {
        let key = (doc, service.to_string());
        if let Some(done) = self.resolved.get(&key) {
            return Ok(done.clone());
        }

        let document = self.document(doc)?;
        let label = Self::label(doc, document, service);
        let base_dir = document.base_dir.clone();
        let mut entry = document.entries.get(service).cloned().ok_or_else(|| {
            CorralError::parse(
                "extends",
                format!("service \"{label}\" is not defined"),
            )
        })?;
        fold_env_files(&mut entry, &base_dir)?;

        let merged = match entry.remove("extends") {
            None => entry,
            Some(extends) => {
                let (file, parent) = extends_target(&extends);
                let parent_doc = match file {
                    Some(file) => self.load(&base_dir.join(file))?,
                    None => doc,
                };
                let parent_label = Self::label(parent_doc, self.document(parent_doc)?, &parent);
                let child_node = self.graph.add_service(&label);
                let parent_node = self.graph.add_service(&parent_label);
                self.graph.add_extends(child_node, parent_node)?;
                tracing::debug!(service = %label, extends = %parent_label, "applying extends");

                let base = self.resolve(parent_doc, &parent)?;
                merge_entries(&base, entry)
            }
        };

        let _ = self.resolved.insert(key, merged.clone());
        Ok(merged)
    }

    fn load(&mut self, path: &Path) -> Result<usize> {
        let io_err = |source| CorralError::Io {
            path: path.to_path_buf(),
            source,
        };
        let canonical = path.canonicalize().map_err(io_err)?;
        if let Some(&idx) = self.by_path.get(&canonical) {
            return Ok(idx);
        }
        tracing::debug!(path = %canonical.display(), "loading extended manifest");
        let text = std::fs::read_to_string(&canonical).map_err(io_err)?;
        let base_dir = canonical
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let document = Document::parse(&text, &base_dir, Some(canonical.clone()))?;
        let idx = self.documents.len();
        self.documents.push(document);
        let _ = self.by_path.insert(canonical, idx);
        Ok(idx)
    }

    fn document(&self, idx: usize) -> Result<&Document> {
        self.documents.get(idx).ok_or(CorralError::NotFound {
            kind: "manifest document",
            id: idx.to_string(),
        })
    }

    /// Root services are named plainly; services of other files carry the path.
    fn label(idx: usize, document: &Document, service: &str) -> String {
        match (&document.origin, idx) {
            (Some(origin), idx) if idx > 0 => format!("{}:{service}", origin.display()),
            _ => service.to_string(),
        }
    }
}

fn extends_target(extends: &Value) -> (Option<String>, String) {
    let field = |key: &str| extends.get(key).and_then(Value::as_str).map(str::to_string);
    (field("file"), field("service").unwrap_or_default())
}

/// Reads the entry's `env_file`s, relative to `base_dir`, into its
/// `environment`. Inline values win over file values.
///
/// Runs before the entry is merged over its parent, so a child's files
/// override the parent's inline environment.
fn fold_env_files(entry: &mut Mapping, base_dir: &Path) -> Result<()> {
    let Some(Value::Sequence(files)) = entry.remove("env_file") else {
        return Ok(());
    };
    let files: Vec<PathBuf> = files
        .iter()
        .filter_map(Value::as_str)
        .map(|file| base_dir.join(file))
        .collect();
    let inline: IndexMap<String, String> = match entry.get("environment") {
        Some(Value::Mapping(vars)) => vars
            .iter()
            .filter_map(|(k, v)| Some((k.as_str()?.to_string(), v.as_str()?.to_string())))
            .collect(),
        _ => IndexMap::new(),
    };
    let merged = merge_environment(&files, &inline)?;
    let environment: Mapping = merged
        .into_iter()
        .map(|(k, v)| (Value::String(k), Value::String(v)))
        .collect();
    let _ = entry.insert(Value::from("environment"), Value::Mapping(environment));
    Ok(())
}
