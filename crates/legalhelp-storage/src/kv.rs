//! Key-value storage seam and the in-memory and JSON-file backends.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use legalhelp_core::error::LegalHelpError;

/// Durable string-keyed storage for persisted chat state.
///
/// Writes are synchronous: when `set` or `remove` returns `Ok`, the change is
/// what a subsequent `get` (or a fresh process) will observe.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, LegalHelpError>;
    fn set(&self, key: &str, value: &str) -> Result<(), LegalHelpError>;
    fn remove(&self, key: &str) -> Result<(), LegalHelpError>;
}

// =============================================================================
// In-memory backend
// =============================================================================

/// Process-local store. Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, LegalHelpError> {
        self.entries
            .lock()
            .map_err(|e| LegalHelpError::Storage(format!("memory store lock poisoned: {}", e)))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, LegalHelpError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), LegalHelpError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), LegalHelpError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

// =============================================================================
// JSON file backend
// =============================================================================

/// Store kept as one JSON object (`{"key": "value", ...}`) on disk.
///
/// The file is rewritten in full on every mutation via a temporary file,
/// fsync and rename, so a crash never leaves a half-written document.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Open the store at `path`, creating parent directories as needed.
    ///
    /// A missing or empty file starts an empty store. A file that is not a JSON
    /// object of strings is logged and replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LegalHelpError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let entries = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                match serde_json::from_str::<BTreeMap<String, String>>(&content) {
                    Ok(map) => map,
                    Err(e) => {
                        warn!(
                            path = %path.display(),
                            error = %e,
                            "Store file is not a JSON object of strings, starting empty"
                        );
                        BTreeMap::new()
                    }
                }
            }
        } else {
            BTreeMap::new()
        };

        info!(path = %path.display(), keys = entries.len(), "JSON store opened");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mutate<F>(&self, f: F) -> Result<(), LegalHelpError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| LegalHelpError::Storage(format!("file store lock poisoned: {}", e)))?;
        let mut next = entries.clone();
        f(&mut next);
        self.write_atomic(&next)?;
        *entries = next;
        Ok(())
    }

    fn write_atomic(&self, entries: &BTreeMap<String, String>) -> Result<(), LegalHelpError> {
        let content = serde_json::to_string_pretty(entries)?;
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        debug!(path = %self.path.display(), keys = entries.len(), "JSON store flushed");
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, LegalHelpError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| LegalHelpError::Storage(format!("file store lock poisoned: {}", e)))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), LegalHelpError> {
        self.mutate(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), LegalHelpError> {
        self.mutate(|entries| {
            entries.remove(key);
        })
    }
}
