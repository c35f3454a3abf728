//! Whole-file JSON state store.
//!
//! Every persisted record (quota window, context usage, session reports) is
//! a single flat file: loaded wholesale, mutated in memory, written back
//! wholesale. There is no partial-update API; the design assumes a single
//! controlling process.

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// File-backed store keyed by a caller-supplied identifier.
///
/// Keys map to `<dir>/<key>.json`. Keys may contain `/` separators for
/// sub-directories (`sessions/<id>`).
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Load a record. A missing, unreadable, or corrupt file is treated as
    /// absent, never an error.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.path_for(key);
        let raw = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(
                    key,
                    path = %path.display(),
                    error = %err,
                    "Discarding unreadable state record"
                );
                None
            }
        }
    }

    /// Write a record wholesale, creating parent directories as needed.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create state directory")?;
        }
        let json = serde_json::to_string_pretty(value).context("Failed to serialize state")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write state file {}", path.display()))?;
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            std::fs::remove_file(&path).context("Failed to remove state file")?;
        }
        Ok(())
    }

    pub fn exists(&self, key: &str) -> bool {
        self.path_for(key).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u64,
    }

    #[test]
    fn test_load_missing_returns_none() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path());
        assert!(store.load::<Sample>("absent").is_none());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path());

        let sample = Sample {
            name: "window".into(),
            count: 42,
        };
        store.save("quota", &sample).unwrap();

        let loaded: Sample = store.load("quota").unwrap();
        assert_eq!(loaded, sample);
    }

    #[test]
    fn test_corrupt_file_treated_as_absent() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path());
        std::fs::write(dir.path().join("quota.json"), "{ not json").unwrap();

        assert!(store.load::<Sample>("quota").is_none());
    }

    #[test]
    fn test_nested_key_creates_subdirectory() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path());

        let sample = Sample {
            name: "report".into(),
            count: 1,
        };
        store.save("sessions/abc-123", &sample).unwrap();

        assert!(dir.path().join("sessions/abc-123.json").exists());
        assert!(store.exists("sessions/abc-123"));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path());

        store
            .save(
                "quota",
                &Sample {
                    name: "x".into(),
                    count: 0,
                },
            )
            .unwrap();
        store.delete("quota").unwrap();
        store.delete("quota").unwrap();
        assert!(!store.exists("quota"));
    }
}
