// Settings store - durable key/value settings for the dashboard

use crate::env_file::{self, EnvFileError};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to access settings store {path}: {source}")]
    Io { path: String, source: io::Error },

    #[error("settings store is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error(transparent)]
    EnvFile(#[from] EnvFileError),
}

/// Durable key/value settings backed by a JSON document on disk.
///
/// The store is authoritative for mod configuration; the env file is a
/// derived projection. Keys absent from the store but present in the env
/// file are migrated in on first read, so installs that predate the store
/// keep their configuration. Handles are acquired per operation; nothing
/// is cached between requests.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    env_file: PathBuf,
}

impl ConfigStore {
    pub fn new(path: PathBuf, env_file: PathBuf) -> Self {
        Self { path, env_file }
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let values = self.load()?;
        if let Some(value) = values.get(key) {
            return Ok(Some(value.clone()));
        }

        // One-time migration: adopt the env file's value on first miss.
        if let Some(value) = env_file::get(&self.env_file, key)? {
            tracing::info!("migrating {} from env file into settings store", key);
            self.set(key, &value)?;
            return Ok(Some(value));
        }

        Ok(None)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut values = self.load()?;
        values.insert(key.to_string(), value.to_string());
        self.persist(&values)
    }

    fn load(&self) -> Result<HashMap<String, String>, StoreError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let content = std::fs::read_to_string(&self.path).map_err(|source| StoreError::Io {
            path: self.path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    fn persist(&self, values: &HashMap<String, String>) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let content = serde_json::to_string_pretty(values)?;
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "settings".to_string());
        let tmp = self.path.with_file_name(format!(".{}.tmp", file_name));

        std::fs::write(&tmp, content).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, ConfigStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("settings.json"), dir.path().join(".env"));
        (dir, store)
    }

    #[test]
    fn set_then_get_round_trips() {
        let (_dir, store) = temp_store();
        store.set("MODS", "a;b").unwrap();
        assert_eq!(store.get("MODS").unwrap().as_deref(), Some("a;b"));
    }

    #[test]
    fn missing_key_reads_none() {
        let (_dir, store) = temp_store();
        assert_eq!(store.get("WORKSHOP_ITEMS").unwrap(), None);
    }

    #[test]
    fn first_read_migrates_from_env_file() {
        let (dir, store) = temp_store();
        std::fs::write(dir.path().join(".env"), "MODS=legacy1;legacy2\n").unwrap();

        assert_eq!(store.get("MODS").unwrap().as_deref(), Some("legacy1;legacy2"));

        // Migration is one-time: the store copy wins from now on.
        std::fs::write(dir.path().join(".env"), "MODS=changed\n").unwrap();
        assert_eq!(store.get("MODS").unwrap().as_deref(), Some("legacy1;legacy2"));
    }

    #[test]
    fn set_survives_reopening_the_store() {
        let (dir, store) = temp_store();
        store.set("SERVER_NAME", "alpha").unwrap();

        let reopened =
            ConfigStore::new(dir.path().join("settings.json"), dir.path().join(".env"));
        assert_eq!(reopened.get("SERVER_NAME").unwrap().as_deref(), Some("alpha"));
    }
}
