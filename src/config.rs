// Runtime configuration, resolved once at startup

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid bind address '{value}': {source}")]
    BadBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
}

/// Everything the dashboard needs to know about its environment.
///
/// Built from environment variables in `main` and passed by reference to
/// each component; no module-level globals.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory containing docker-compose.yml and the server env file.
    pub compose_dir: PathBuf,
    /// Name of the managed game server container.
    pub container_name: String,
    /// Command used for compose lifecycle calls, e.g. "docker compose"
    /// or the legacy "docker-compose" binary.
    pub compose_command: String,
    /// Directory holding the save-game world directories.
    pub saves_root: PathBuf,
    /// Path of the dashboard settings store.
    pub store_path: PathBuf,
    /// Path of the env file consumed by the game server process.
    pub env_file: PathBuf,
    pub bind_addr: SocketAddr,
    pub dashboard_password: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let compose_dir = std::env::var("COMPOSE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_compose_dir());

        let saves_root = std::env::var("SAVES_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| compose_dir.join("server-data").join("Saves"));

        let bind = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:5000".to_string());
        let bind_addr = bind
            .parse()
            .map_err(|source| ConfigError::BadBindAddr {
                value: bind.clone(),
                source,
            })?;

        Ok(Self {
            container_name: std::env::var("CONTAINER_NAME")
                .unwrap_or_else(|_| "gameserver".to_string()),
            compose_command: std::env::var("COMPOSE_COMMAND")
                .unwrap_or_else(|_| "docker compose".to_string()),
            store_path: compose_dir.join("dashboard-settings.json"),
            env_file: compose_dir.join(".env"),
            bind_addr,
            dashboard_password: std::env::var("DASHBOARD_PASSWORD")
                .unwrap_or_else(|_| "admin".to_string()),
            compose_dir,
            saves_root,
        })
    }

    pub fn password_is_default(&self) -> bool {
        self.dashboard_password == "admin"
    }
}

fn default_compose_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
        .join("game-server")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_paths_follow_compose_dir() {
        let config = AppConfig {
            compose_dir: PathBuf::from("/srv/game"),
            container_name: "gameserver".to_string(),
            compose_command: "docker compose".to_string(),
            saves_root: PathBuf::from("/srv/game/server-data/Saves"),
            store_path: PathBuf::from("/srv/game/dashboard-settings.json"),
            env_file: PathBuf::from("/srv/game/.env"),
            bind_addr: "127.0.0.1:5000".parse().unwrap(),
            dashboard_password: "admin".to_string(),
        };
        assert!(config.password_is_default());
        assert_eq!(config.env_file, PathBuf::from("/srv/game/.env"));
    }
}
