// World manager - save-game directories, backups and the active world

use crate::env_file::{self, EnvFileError};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// World the game server falls back to when the env file names none.
pub const DEFAULT_WORLD: &str = "servertest";

/// Key in the env file naming the active world.
pub const SERVER_NAME_KEY: &str = "SERVER_NAME";

const BACKUP_TIMESTAMP_FORMAT: &str = "%d-%m-%y_%H-%M-%S";

#[derive(Error, Debug)]
pub enum WorldError {
    #[error("invalid world name '{0}': only letters, digits, '-' and '_' are allowed")]
    InvalidName(String),

    #[error("a world or backup named '{0}' already exists")]
    AlreadyExists(String),

    #[error("world directory for '{0}' does not exist; start the server once to create it")]
    SourceNotFound(String),

    #[error("backup '{0}' not found")]
    BackupNotFound(String),

    #[error("target world '{0}' already exists")]
    TargetExists(String),

    #[error(transparent)]
    EnvFile(#[from] EnvFileError),

    #[error("filesystem error on {path}: {source}")]
    Io { path: String, source: io::Error },

    #[error("copy task failed: {0}")]
    CopyTask(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldEntry {
    pub name: String,
    pub modified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldListing {
    pub current: String,
    pub worlds: Vec<WorldEntry>,
    pub backups: Vec<WorldEntry>,
}

/// Manages the tree of save directories under the saves root.
///
/// Nothing is persisted beyond the directories themselves and the
/// `SERVER_NAME` key in the env file; every query re-reads the
/// filesystem. Backups and restores of the same name are serialized
/// through per-name locks so two operators cannot interleave a copy.
pub struct WorldManager {
    saves_root: PathBuf,
    env_file: PathBuf,
    name_pattern: Regex,
    backup_suffix: Regex,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl WorldManager {
    pub fn new(saves_root: PathBuf, env_file: PathBuf) -> Self {
        Self {
            saves_root,
            env_file,
            name_pattern: Regex::new(r"^[A-Za-z0-9_-]+$").expect("invalid name regex"),
            backup_suffix: Regex::new(r"_\d{2}-\d{2}-\d{2}_\d{2}-\d{2}-\d{2}$")
                .expect("invalid backup suffix regex"),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Classify a directory name as a backup.
    ///
    /// A name is a backup if it contains `_backup` (any case) or ends in a
    /// `_DD-MM-YY_HH-MM-SS` timestamp. The rule is a heuristic over
    /// human-assigned names: a world deliberately named with a date-like
    /// suffix is misclassified, which is a known limitation.
    pub fn is_backup(&self, name: &str) -> bool {
        name.to_lowercase().contains("_backup") || self.backup_suffix.is_match(name)
    }

    fn validate_name(&self, name: &str) -> Result<(), WorldError> {
        if self.name_pattern.is_match(name) {
            Ok(())
        } else {
            Err(WorldError::InvalidName(name.to_string()))
        }
    }

    /// List every save directory, split into worlds and backups, most
    /// recently modified first.
    pub fn list_worlds(&self) -> Result<WorldListing, WorldError> {
        let mut worlds = Vec::new();
        let mut backups = Vec::new();

        for entry in self.read_saves_root()? {
            if self.is_backup(&entry.name) {
                backups.push(entry);
            } else {
                worlds.push(entry);
            }
        }

        worlds.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));
        backups.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));

        Ok(WorldListing {
            current: self.current_world()?,
            worlds,
            backups,
        })
    }

    /// The active world per the env file, or the server default.
    pub fn current_world(&self) -> Result<String, WorldError> {
        Ok(env_file::get(&self.env_file, SERVER_NAME_KEY)?
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_WORLD.to_string()))
    }

    /// Point the server at another world.
    ///
    /// The target directory does not have to exist; the server creates it
    /// on next start.
    pub fn switch_world(&self, name: &str) -> Result<(), WorldError> {
        self.validate_name(name)?;
        self.write_server_name(name)
    }

    /// Reserve a new world name and switch to it.
    ///
    /// The name must not collide with an existing world or backup
    /// directory, nor with the active world (whose directory may still be
    /// pending its first server start).
    pub fn create_world(&self, name: &str) -> Result<(), WorldError> {
        self.validate_name(name)?;

        let taken = self.current_world()? == name
            || self
                .read_saves_root()?
                .iter()
                .any(|entry| entry.name == name);
        if taken {
            return Err(WorldError::AlreadyExists(name.to_string()));
        }

        tracing::info!("creating world {}", name);
        self.write_server_name(name)
    }

    /// Copy the current world into a timestamped backup directory.
    ///
    /// Returns the backup name. The copy lands in a hidden temp sibling
    /// and is renamed into place on completion, so a crash mid-copy never
    /// leaves a directory that passes for a finished backup.
    pub async fn backup_world(&self) -> Result<String, WorldError> {
        let current = self.current_world()?;
        let lock = self.name_lock(&current).await;
        let _guard = lock.lock().await;

        let source = self.saves_root.join(&current);
        if !source.is_dir() {
            return Err(WorldError::SourceNotFound(current));
        }

        let timestamp = chrono::Local::now().format(BACKUP_TIMESTAMP_FORMAT);
        let backup_name = format!("{}_{}", current, timestamp);
        let dest = self.saves_root.join(&backup_name);

        tracing::info!("backing up world {} to {}", current, backup_name);
        self.copy_into_place(source, dest).await?;

        Ok(backup_name)
    }

    /// Copy a backup into a fresh world directory and switch to it.
    ///
    /// The backup is left untouched.
    pub async fn restore_backup(&self, backup: &str, target: &str) -> Result<(), WorldError> {
        self.validate_name(backup)?;
        self.validate_name(target)?;

        let lock = self.name_lock(target).await;
        let _guard = lock.lock().await;

        let source = self.saves_root.join(backup);
        if !source.is_dir() {
            return Err(WorldError::BackupNotFound(backup.to_string()));
        }

        let dest = self.saves_root.join(target);
        if dest.exists() {
            return Err(WorldError::TargetExists(target.to_string()));
        }

        tracing::info!("restoring backup {} into world {}", backup, target);
        self.copy_into_place(source, dest).await?;

        self.switch_world(target)
    }

    /// Recursive copy via a hidden temp sibling, renamed on completion.
    /// The copy itself runs on a blocking thread.
    async fn copy_into_place(&self, source: PathBuf, dest: PathBuf) -> Result<(), WorldError> {
        let dest_name = dest
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let staging = self.saves_root.join(format!(".{}.partial", dest_name));

        let result = tokio::task::spawn_blocking({
            let source = source.clone();
            let staging = staging.clone();
            move || copy_tree(&source, &staging)
        })
        .await?;

        if let Err(err) = result {
            let _ = std::fs::remove_dir_all(&staging);
            return Err(err);
        }

        std::fs::rename(&staging, &dest).map_err(|source| WorldError::Io {
            path: dest.display().to_string(),
            source,
        })
    }

    fn write_server_name(&self, name: &str) -> Result<(), WorldError> {
        let mut updates = IndexMap::new();
        updates.insert(SERVER_NAME_KEY.to_string(), name.to_string());
        env_file::merge_write(&self.env_file, &updates)?;
        Ok(())
    }

    fn read_saves_root(&self) -> Result<Vec<WorldEntry>, WorldError> {
        if !self.saves_root.is_dir() {
            return Ok(Vec::new());
        }

        let io_err = |source| WorldError::Io {
            path: self.saves_root.display().to_string(),
            source,
        };

        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&self.saves_root).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let name = entry.file_name().to_string_lossy().to_string();

            // Hidden entries include in-flight .partial copies.
            if name.starts_with('.') {
                continue;
            }

            let metadata = entry.metadata().map_err(io_err)?;
            if !metadata.is_dir() {
                continue;
            }

            let modified_at = metadata.modified().ok().map(DateTime::<Utc>::from);
            entries.push(WorldEntry { name, modified_at });
        }

        Ok(entries)
    }

    async fn name_lock(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

fn copy_tree(source: &Path, dest: &Path) -> Result<(), WorldError> {
    let io_err = |path: &Path| {
        let path = path.display().to_string();
        move |source| WorldError::Io { path, source }
    };

    std::fs::create_dir_all(dest).map_err(io_err(dest))?;

    for entry in std::fs::read_dir(source).map_err(io_err(source))? {
        let entry = entry.map_err(io_err(source))?;
        let from = entry.path();
        let to = dest.join(entry.file_name());

        if entry.metadata().map_err(io_err(&from))?.is_dir() {
            copy_tree(&from, &to)?;
        } else {
            std::fs::copy(&from, &to).map_err(io_err(&from))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> WorldManager {
        WorldManager::new(PathBuf::from("/tmp/saves"), PathBuf::from("/tmp/.env"))
    }

    #[test]
    fn backup_classification() {
        let m = manager();
        assert!(m.is_backup("myworld_backup"));
        assert!(m.is_backup("myworld_BACKUP_old"));
        assert!(m.is_backup("myworld_01-02-23_10-00-00"));
        assert!(!m.is_backup("myworld"));
        assert!(!m.is_backup("myworld_2"));
        assert!(!m.is_backup("myworld_1-2-23_10-00-00"));
        assert!(!m.is_backup("myworld_01-02-23_10-00-00_extra"));
    }

    #[test]
    fn name_validation() {
        let m = manager();
        assert!(m.validate_name("world-1_ok").is_ok());
        assert!(matches!(
            m.validate_name("world one"),
            Err(WorldError::InvalidName(_))
        ));
        assert!(matches!(m.validate_name(""), Err(WorldError::InvalidName(_))));
        assert!(matches!(
            m.validate_name("../escape"),
            Err(WorldError::InvalidName(_))
        ));
    }
}
