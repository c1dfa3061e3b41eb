//! Escalation record persistence
//!
//! The escalation engine takes a record by value and hands back the updated
//! one; these stores keep it between invocations. A resource with no stored
//! record starts at the bottom of the ladder.

use crate::error::{InquisitorError, Result};
use crate::types::EscalationRecord;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Trait for persisting escalation records
pub trait EscalationStore: Send + Sync {
    /// Load the record for a resource, or a fresh one at counter 0
    fn load(&self, resource_id: &str) -> Result<EscalationRecord>;

    /// Save a record, replacing any previous one for the resource
    fn save(&self, record: &EscalationRecord) -> Result<()>;

    /// Forget a resource; clearing an unknown resource is a no-op
    fn clear(&self, resource_id: &str) -> Result<()>;
}

type Records = BTreeMap<String, EscalationRecord>;

/// JSON file-based escalation store
///
/// Keeps every record in one JSON object keyed by resource id.
/// Atomic writes via temp file + rename to prevent corruption.
pub struct FileEscalationStore {
    path: PathBuf,
    // serializes read-modify-write cycles within the process
    guard: Mutex<()>,
}

impl FileEscalationStore {
    /// Create a new file escalation store at the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Records> {
        if !self.path.exists() {
            return Ok(Records::new());
        }

        let json = std::fs::read_to_string(&self.path).map_err(|e| {
            InquisitorError::Store(format!(
                "Failed to read state file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        serde_json::from_str(&json).map_err(|e| {
            InquisitorError::Store(format!(
                "Failed to parse state file {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    fn write_all(&self, records: &Records) -> Result<()> {
        let json = serde_json::to_string_pretty(records)?;

        // Atomic write: write to temp file, then rename
        let tmp_path = self.path.with_extension("tmp");

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                InquisitorError::Store(format!(
                    "Failed to create state directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        std::fs::write(&tmp_path, json).map_err(|e| {
            InquisitorError::Store(format!(
                "Failed to write state file {}: {}",
                tmp_path.display(),
                e
            ))
        })?;

        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            InquisitorError::Store(format!(
                "Failed to rename state file {} → {}: {}",
                tmp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::debug!(path = %self.path.display(), count = records.len(), "State saved");
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.guard.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl EscalationStore for FileEscalationStore {
    fn load(&self, resource_id: &str) -> Result<EscalationRecord> {
        let _guard = self.lock();
        Ok(self
            .read_all()?
            .remove(resource_id)
            .unwrap_or_else(|| EscalationRecord::new(resource_id)))
    }

    fn save(&self, record: &EscalationRecord) -> Result<()> {
        let _guard = self.lock();
        let mut records = self.read_all()?;
        records.insert(record.resource_id.clone(), record.clone());
        self.write_all(&records)
    }

    fn clear(&self, resource_id: &str) -> Result<()> {
        let _guard = self.lock();
        let mut records = self.read_all()?;
        if records.remove(resource_id).is_some() {
            self.write_all(&records)?;
        }
        Ok(())
    }
}

/// In-memory escalation store for testing
///
/// Stores records in memory: lost on drop, but useful for tests.
#[derive(Default)]
pub struct MemoryEscalationStore {
    records: std::sync::RwLock<Records>,
}

impl MemoryEscalationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EscalationStore for MemoryEscalationStore {
    fn load(&self, resource_id: &str) -> Result<EscalationRecord> {
        let records = self.records.read().map_err(|e| {
            InquisitorError::Store(format!("Failed to acquire state lock: {}", e))
        })?;
        Ok(records
            .get(resource_id)
            .cloned()
            .unwrap_or_else(|| EscalationRecord::new(resource_id)))
    }

    fn save(&self, record: &EscalationRecord) -> Result<()> {
        let mut records = self.records.write().map_err(|e| {
            InquisitorError::Store(format!("Failed to acquire state lock: {}", e))
        })?;
        records.insert(record.resource_id.clone(), record.clone());
        Ok(())
    }

    fn clear(&self, resource_id: &str) -> Result<()> {
        let mut records = self.records.write().map_err(|e| {
            InquisitorError::Store(format!("Failed to acquire state lock: {}", e))
        })?;
        records.remove(resource_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("a3s-inquisitor-test-{}", uuid::Uuid::new_v4()))
            .join("escalation.json")
    }

    #[test]
    fn test_file_store_save_and_load() {
        let path = temp_path();
        let store = FileEscalationStore::new(&path);

        store
            .save(&EscalationRecord::new("db-1").with_counter(3))
            .unwrap();
        store
            .save(&EscalationRecord::new("logs").with_counter(1))
            .unwrap();

        let reopened = FileEscalationStore::new(&path);
        assert_eq!(reopened.load("db-1").unwrap().counter, 3);
        assert_eq!(reopened.load("logs").unwrap().counter, 1);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_file_store_load_nonexistent() {
        let store = FileEscalationStore::new("/tmp/nonexistent-a3s-inquisitor/escalation.json");
        let record = store.load("db-1").unwrap();
        assert_eq!(record, EscalationRecord::new("db-1"));
    }

    #[test]
    fn test_file_store_clear() {
        let path = temp_path();
        let store = FileEscalationStore::new(&path);

        store
            .save(&EscalationRecord::new("db-1").with_counter(2))
            .unwrap();
        store.clear("db-1").unwrap();
        store.clear("never-seen").unwrap();
        assert_eq!(store.load("db-1").unwrap().counter, 0);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_file_store_corrupt_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("escalation.json");
        std::fs::write(&path, "{{garbage").unwrap();

        let store = FileEscalationStore::new(&path);
        let err = store.load("db-1").unwrap_err();
        assert!(err.to_string().contains("Failed to parse state file"));
    }

    #[test]
    fn test_file_store_path() {
        let store = FileEscalationStore::new("/tmp/test-state.json");
        assert_eq!(store.path(), Path::new("/tmp/test-state.json"));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryEscalationStore::new();
        assert_eq!(store.load("db-1").unwrap().counter, 0);

        store
            .save(&EscalationRecord::new("db-1").with_counter(4))
            .unwrap();
        assert_eq!(store.load("db-1").unwrap().counter, 4);

        store.clear("db-1").unwrap();
        assert_eq!(store.load("db-1").unwrap().counter, 0);
    }
}
