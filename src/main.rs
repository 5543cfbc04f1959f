// deckhand - web control panel for a containerized dedicated game server

use deckhand::config::AppConfig;
use deckhand::docker::ComposeRunner;
use deckhand::http::{self, auth::Sessions, AppContext};
use deckhand::mods::{ModRegistry, SteamWorkshopClient};
use deckhand::store::ConfigStore;
use deckhand::worlds::WorldManager;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("invalid configuration: {}", err);
            std::process::exit(1);
        }
    };

    if config.password_is_default() {
        tracing::warn!("DASHBOARD_PASSWORD is not set; the dashboard is using the default password");
    }

    std::fs::create_dir_all(&config.saves_root).ok();

    let compose = match ComposeRunner::new(config.compose_dir.clone(), &config.compose_command) {
        Ok(compose) => compose,
        Err(err) => {
            tracing::error!("invalid COMPOSE_COMMAND: {}", err);
            std::process::exit(1);
        }
    };

    let store = ConfigStore::new(config.store_path.clone(), config.env_file.clone());
    let registry = ModRegistry::new(
        store,
        config.env_file.clone(),
        Arc::new(SteamWorkshopClient::new()),
    );
    let worlds = WorldManager::new(config.saves_root.clone(), config.env_file.clone());

    let runtime = tokio::runtime::Runtime::new().expect("failed to start async runtime");

    tracing::info!(
        "dashboard for container '{}' listening on {}",
        config.container_name,
        config.bind_addr
    );

    let ctx = Arc::new(AppContext {
        config,
        registry,
        worlds,
        compose,
        sessions: Sessions::default(),
    });

    if let Err(err) = http::serve(ctx, runtime.handle().clone()) {
        tracing::error!("server error: {}", err);
        std::process::exit(1);
    }
}
