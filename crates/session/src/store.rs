//! Durable key/value storage for the session flag and return-to path.
//!
//! Values are stored as strings, the way browser local storage holds them:
//! a flag is set when its entry is exactly `"true"`. Stores are shared across
//! tabs/processes without coordination (last writer wins).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use anyhow::Context;

use crate::error::StoreError;

const TRUE: &str = "true";

/// Durable storage surviving reloads.
pub trait PersistentFlagStore: Send + Sync {
    fn get_flag(&self, key: &str) -> Result<bool, StoreError>;

    fn set_flag(&self, key: &str, value: bool) -> Result<(), StoreError>;

    fn remove_flag(&self, key: &str) -> Result<(), StoreError>;

    fn get_path(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set_path(&self, key: &str, path: &str) -> Result<(), StoreError>;
}

impl<S> PersistentFlagStore for Arc<S>
where
    S: PersistentFlagStore + ?Sized,
{
    fn get_flag(&self, key: &str) -> Result<bool, StoreError> {
        (**self).get_flag(key)
    }

    fn set_flag(&self, key: &str, value: bool) -> Result<(), StoreError> {
        (**self).set_flag(key, value)
    }

    fn remove_flag(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove_flag(key)
    }

    fn get_path(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get_path(key)
    }

    fn set_path(&self, key: &str, path: &str) -> Result<(), StoreError> {
        (**self).set_path(key, path)
    }
}

fn flag_value(value: bool) -> String {
    value.to_string()
}

/// In-memory store for tests/dev. Does not survive the process.
#[derive(Debug, Default)]
pub struct InMemoryFlagStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl InMemoryFlagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw entry as stored.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn write(&self, key: &str, value: Option<String>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match value {
            Some(value) => {
                entries.insert(key.to_string(), value);
            }
            None => {
                entries.remove(key);
            }
        }
    }
}

impl PersistentFlagStore for InMemoryFlagStore {
    fn get_flag(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.raw(key).as_deref() == Some(TRUE))
    }

    fn set_flag(&self, key: &str, value: bool) -> Result<(), StoreError> {
        self.write(key, Some(flag_value(value)));
        Ok(())
    }

    fn remove_flag(&self, key: &str) -> Result<(), StoreError> {
        self.write(key, None);
        Ok(())
    }

    fn get_path(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.raw(key))
    }

    fn set_path(&self, key: &str, path: &str) -> Result<(), StoreError> {
        self.write(key, Some(path.to_string()));
        Ok(())
    }
}

/// JSON-document store on disk.
///
/// The whole document is loaded on open and rewritten (via a sibling temp
/// file and rename) on every write.
#[derive(Debug)]
pub struct FileFlagStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileFlagStore {
    /// Open (or lazily create) the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create storage directory at {parent:?}"))?;
        }

        let entries = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read session storage at {path:?}"))?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw)
                    .with_context(|| format!("session storage at {path:?} is not a JSON object"))?
            }
        } else {
            BTreeMap::new()
        };

        tracing::debug!(path = %path.display(), entries = entries.len(), "opened session storage");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update<F>(&self, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = entries.clone();
        apply(&mut next);

        let json = serde_json::to_string_pretty(&next)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json).map_err(|e| StoreError::Io(e.to_string()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| StoreError::Io(e.to_string()))?;

        *entries = next;
        Ok(())
    }

    fn read(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

impl PersistentFlagStore for FileFlagStore {
    fn get_flag(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.read(key).as_deref() == Some(TRUE))
    }

    fn set_flag(&self, key: &str, value: bool) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.insert(key.to_string(), flag_value(value));
        })
    }

    fn remove_flag(&self, key: &str) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.remove(key);
        })
    }

    fn get_path(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read(key))
    }

    fn set_path(&self, key: &str, path: &str) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.insert(key.to_string(), path.to_string());
        })
    }
}
