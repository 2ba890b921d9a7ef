//! Read-only access to the entity catalog the tools query.
//!
//! The catalog is a JSON array of entities stored under the data directory.
//! Entity documents are kept as raw [`Value`]s; only `kind` and a few
//! `metadata` fields are interpreted.

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Location of the entity catalog file.
#[derive(Debug, Clone)]
pub struct EntityCatalog {
    path: PathBuf,
}

impl EntityCatalog {
    /// Catalog at `<data_dir>/<filename>`. A missing `.json` extension is
    /// appended.
    pub fn new(data_dir: impl AsRef<Path>, filename: &str) -> Self {
        let stem = filename.strip_suffix(".json").unwrap_or(filename);
        Self {
            path: data_dir.as_ref().join(format!("{stem}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the catalog from disk. Re-read on every call so edits to the
    /// file are picked up between tool calls.
    pub fn load(&self) -> Result<Vec<Value>> {
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read entity catalog {:?}", self.path))?;
        let entities: Vec<Value> = serde_json::from_str(&contents)
            .with_context(|| format!("Entity catalog {:?} is not a JSON array", self.path))?;
        Ok(entities)
    }

    /// Entities whose kind equals `kind`, ignoring case.
    pub fn of_kind(&self, kind: &str) -> Result<Vec<Value>> {
        let wanted = kind.to_lowercase();
        Ok(self
            .load()?
            .into_iter()
            .filter(|e| entity_kind(e).is_some_and(|k| k.to_lowercase() == wanted))
            .collect())
    }

    /// Entities whose kind is any of `kinds`, ignoring case.
    pub fn of_kinds(&self, kinds: &[String]) -> Result<Vec<Value>> {
        let wanted: Vec<String> = kinds.iter().map(|k| k.to_lowercase()).collect();
        Ok(self
            .load()?
            .into_iter()
            .filter(|e| entity_kind(e).is_some_and(|k| wanted.contains(&k.to_lowercase())))
            .collect())
    }
}

fn entity_kind(entity: &Value) -> Option<&str> {
    entity.get("kind").and_then(Value::as_str)
}

/// Stable reference for an entity: `kind_provider_namespace_name`, lowercased.
///
/// Returns `None` when `kind`, `metadata.provider` or `metadata.name` is
/// missing.
pub fn entity_reference(entity: &Value) -> Option<String> {
    let kind = entity_kind(entity)?;
    let metadata = entity.get("metadata")?;
    let provider = metadata.get("provider")?.as_str()?;
    let name = metadata.get("name")?.as_str()?;
    let namespace = metadata
        .get("namespace")
        .and_then(Value::as_str)
        .unwrap_or(crate::constants::DEFAULT_ENTITY_NAMESPACE);
    Some(format!("{kind}_{provider}_{namespace}_{name}").to_lowercase())
}
