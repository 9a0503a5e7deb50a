//! Key-value persistence for parameter sets.
//!
//! Documents are plain JSON values keyed by an opaque project id; the core
//! applies no schema versioning.

use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

use crate::error::FeasibilityError;
use crate::params::ParameterSet;
use crate::FeasibilityResult;

pub trait ParameterStore {
    fn put(&self, id: &str, document: &Value) -> FeasibilityResult<()>;
    fn get(&self, id: &str) -> FeasibilityResult<Option<Value>>;
}

/// Process-local store, mostly for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    documents: RwLock<HashMap<String, Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ParameterStore for InMemoryStore {
    fn put(&self, id: &str, document: &Value) -> FeasibilityResult<()> {
        validate_id(id)?;
        let mut docs = self
            .documents
            .write()
            .map_err(|_| FeasibilityError::Io("parameter store lock poisoned".into()))?;
        docs.insert(id.to_string(), document.clone());
        Ok(())
    }

    fn get(&self, id: &str) -> FeasibilityResult<Option<Value>> {
        validate_id(id)?;
        let docs = self
            .documents
            .read()
            .map_err(|_| FeasibilityError::Io("parameter store lock poisoned".into()))?;
        Ok(docs.get(id).cloned())
    }
}

/// One `<id>.json` file per project inside a directory.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &str) -> FeasibilityResult<PathBuf> {
        validate_id(id)?;
        Ok(self.root.join(format!("{id}.json")))
    }
}

impl ParameterStore for JsonDirStore {
    fn put(&self, id: &str, document: &Value) -> FeasibilityResult<()> {
        let path = self.path_for(id)?;
        fs::create_dir_all(&self.root)?;
        fs::write(&path, serde_json::to_string_pretty(document)?)?;
        debug!(path = %path.display(), "stored parameter document");
        Ok(())
    }

    fn get(&self, id: &str) -> FeasibilityResult<Option<Value>> {
        let path = self.path_for(id)?;
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }
}

/// Project ids are restricted to ASCII letters, digits, `_` and `-`.
pub fn validate_id(id: &str) -> FeasibilityResult<()> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(FeasibilityError::InvalidInput {
            field: "project_id".into(),
            reason: format!("'{id}' may only contain letters, digits, '_' and '-'"),
        })
    }
}

pub fn save_parameters(
    store: &dyn ParameterStore,
    id: &str,
    params: &ParameterSet,
) -> FeasibilityResult<()> {
    store.put(id, &serde_json::to_value(params)?)
}

/// Load and decode a parameter set; a missing project is `NotFound`.
pub fn load_parameters(store: &dyn ParameterStore, id: &str) -> FeasibilityResult<ParameterSet> {
    let document = store
        .get(id)?
        .ok_or_else(|| FeasibilityError::NotFound(format!("project '{id}'")))?;
    Ok(serde_json::from_value(document)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_in_memory_put_get() {
        let store = InMemoryStore::new();
        store.put("alpha", &json!({ "horizon_months": 12 })).unwrap();
        assert_eq!(
            store.get("alpha").unwrap(),
            Some(json!({ "horizon_months": 12 }))
        );
        assert_eq!(store.get("beta").unwrap(), None);
    }

    #[test]
    fn test_ids_are_restricted() {
        assert!(validate_id("proj_01-a").is_ok());
        assert!(validate_id("../etc/passwd").is_err());
        assert!(validate_id("").is_err());
        assert!(InMemoryStore::new().put("a b", &json!({})).is_err());
    }

    #[test]
    fn test_missing_project_is_not_found() {
        let store = InMemoryStore::new();
        match load_parameters(&store, "ghost") {
            Err(FeasibilityError::NotFound(msg)) => assert!(msg.contains("ghost")),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_json_dir_store_roundtrip() {
        let dir = std::env::temp_dir().join(format!("lfa-store-{}", std::process::id()));
        let store = JsonDirStore::new(&dir);
        store.put("site-7", &json!({ "k": [1, 2] })).unwrap();
        assert!(dir.join("site-7.json").exists());
        assert_eq!(store.get("site-7").unwrap(), Some(json!({ "k": [1, 2] })));
        assert_eq!(store.get("absent").unwrap(), None);
        let _ = fs::remove_dir_all(&dir);
    }
}
