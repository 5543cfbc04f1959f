// Env file handling - the KEY=VALUE file read by the game server process

use indexmap::IndexMap;
use std::io;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnvFileError {
    #[error("failed to read {path}: {source}")]
    Read { path: String, source: io::Error },

    #[error("failed to write {path}: {source}")]
    Write { path: String, source: io::Error },
}

/// Parse the env file into an ordered key/value map.
///
/// Comment lines and blanks are skipped; values keep everything after the
/// first `=`. A missing file reads as empty.
pub fn read(path: &Path) -> Result<IndexMap<String, String>, EnvFileError> {
    let mut vars = IndexMap::new();

    if !path.exists() {
        return Ok(vars);
    }

    let content = std::fs::read_to_string(path).map_err(|source| EnvFileError::Read {
        path: path.display().to_string(),
        source,
    })?;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            vars.insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    Ok(vars)
}

/// Look up a single key without keeping the map around.
pub fn get(path: &Path, key: &str) -> Result<Option<String>, EnvFileError> {
    Ok(read(path)?.get(key).cloned())
}

/// Merge `updates` into the env file.
///
/// Existing keys are rewritten in place, comments and blank lines are kept
/// verbatim, untouched keys keep their lines, and keys not yet in the file
/// are appended at the end in `updates` order. The rewrite goes through a
/// temp sibling and a rename so the server process never sees a torn file.
pub fn merge_write(path: &Path, updates: &IndexMap<String, String>) -> Result<(), EnvFileError> {
    let mut lines: Vec<String> = Vec::new();
    let mut seen: Vec<String> = Vec::new();

    if path.exists() {
        let content = std::fs::read_to_string(path).map_err(|source| EnvFileError::Read {
            path: path.display().to_string(),
            source,
        })?;

        for line in content.lines() {
            let stripped = line.trim();
            if stripped.is_empty() || stripped.starts_with('#') {
                lines.push(line.to_string());
                continue;
            }
            match stripped.split_once('=') {
                Some((raw_key, _)) => {
                    let key = raw_key.trim();
                    seen.push(key.to_string());
                    match updates.get(key) {
                        Some(value) => lines.push(format!("{}={}", key, value)),
                        None => lines.push(line.to_string()),
                    }
                }
                None => lines.push(line.to_string()),
            }
        }
    }

    for (key, value) in updates {
        if !seen.iter().any(|k| k == key) {
            lines.push(format!("{}={}", key, value));
        }
    }

    let mut content = lines.join("\n");
    content.push('\n');

    write_atomic(path, &content)
}

fn write_atomic(path: &Path, content: &str) -> Result<(), EnvFileError> {
    let write_err = |source| EnvFileError::Write {
        path: path.display().to_string(),
        source,
    };

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "env".to_string());
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));

    std::fs::write(&tmp, content).map_err(write_err)?;
    std::fs::rename(&tmp, path).map_err(write_err)
}
