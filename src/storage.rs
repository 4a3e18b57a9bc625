//! Local key-value cache: the server-side stand-in for browser local storage.
//!
//! Keys follow `<entity>-data-<ownerId>`; the access-code settings live under
//! a single global key. Two implementations: an in-memory map and a JSON file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;
use tracing::{info, warn};

use crate::error::StorageError;

pub const SETTINGS_KEY: &str = "admin-access-code-settings";

pub fn cache_key(entity: &str, owner_id: &str) -> String {
  format!("{entity}-data-{owner_id}")
}

pub trait KeyValueStore: Send + Sync {
  fn get(&self, key: &str) -> Option<Value>;
  fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;
  fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Default)]
pub struct MemoryStore {
  entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }
}

impl KeyValueStore for MemoryStore {
  fn get(&self, key: &str) -> Option<Value> {
    lock(&self.entries).get(key).cloned()
  }

  fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
    lock(&self.entries).insert(key.to_string(), value);
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<(), StorageError> {
    lock(&self.entries).remove(key);
    Ok(())
  }
}

/// Whole namespace kept in one JSON object, rewritten on every change.
pub struct FileStore {
  path: PathBuf,
  entries: Mutex<HashMap<String, Value>>,
}

impl FileStore {
  /// Open (or start) `<dir>/local-storage.json`. A corrupt file is logged and
  /// treated as empty.
  pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
    std::fs::create_dir_all(dir.as_ref())?;
    let path = dir.as_ref().join("local-storage.json");
    let entries = match std::fs::read_to_string(&path) {
      Ok(s) => match serde_json::from_str::<HashMap<String, Value>>(&s) {
        Ok(map) => map,
        Err(e) => {
          warn!(target: "classdesk", path = %path.display(), error = %e, "Local storage file is corrupt; starting empty");
          HashMap::new()
        }
      },
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
      Err(e) => return Err(e.into()),
    };
    info!(target: "classdesk", path = %path.display(), keys = entries.len(), "Opened local storage");
    Ok(Self { path, entries: Mutex::new(entries) })
  }

  fn flush(&self, entries: &HashMap<String, Value>) -> Result<(), StorageError> {
    let body = serde_json::to_string_pretty(entries)?;
    let tmp = self.path.with_extension("json.tmp");
    std::fs::write(&tmp, body)?;
    std::fs::rename(&tmp, &self.path)?;
    Ok(())
  }
}

impl KeyValueStore for FileStore {
  fn get(&self, key: &str) -> Option<Value> {
    lock(&self.entries).get(key).cloned()
  }

  fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
    let mut entries = lock(&self.entries);
    entries.insert(key.to_string(), value);
    self.flush(&entries)
  }

  fn remove(&self, key: &str) -> Result<(), StorageError> {
    let mut entries = lock(&self.entries);
    if entries.remove(key).is_some() {
      self.flush(&entries)?;
    }
    Ok(())
  }
}

// A panic while holding the map cannot leave it half-written, so poisoning is ignored.
fn lock(m: &Mutex<HashMap<String, Value>>) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
  m.lock().unwrap_or_else(|p| p.into_inner())
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn key_format() {
    assert_eq!(cache_key("students", "t-42"), "students-data-t-42");
  }

  #[test]
  fn memory_store_get_set_remove() {
    let s = MemoryStore::new();
    assert!(s.get("k").is_none());
    s.set("k", json!([1, 2])).unwrap();
    assert_eq!(s.get("k"), Some(json!([1, 2])));
    s.remove("k").unwrap();
    assert!(s.get("k").is_none());
  }

  #[test]
  fn file_store_survives_reopen() {
    let dir = std::env::temp_dir().join(format!("classdesk-test-{}", uuid::Uuid::new_v4()));
    {
      let s = FileStore::open(&dir).unwrap();
      s.set("students-data-t1", json!([{"id": "a"}])).unwrap();
    }
    let s = FileStore::open(&dir).unwrap();
    assert_eq!(s.get("students-data-t1"), Some(json!([{"id": "a"}])));
    let _ = std::fs::remove_dir_all(dir);
  }
}
