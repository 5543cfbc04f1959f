// Mod registry integration tests with a stubbed workshop provider

use async_trait::async_trait;
use deckhand::mods::{
    ItemDetails, ModError, ModRegistry, WorkshopError, WorkshopProvider,
};
use deckhand::store::ConfigStore;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

struct StubProvider {
    collections: HashMap<String, Vec<String>>,
}

impl StubProvider {
    fn new() -> Self {
        Self {
            collections: HashMap::new(),
        }
    }

    fn with_collection(mut self, id: &str, members: &[&str]) -> Self {
        self.collections
            .insert(id.to_string(), members.iter().map(|m| m.to_string()).collect());
        self
    }
}

#[async_trait]
impl WorkshopProvider for StubProvider {
    async fn fetch_item(&self, id: &str) -> Result<ItemDetails, WorkshopError> {
        if id == "missing" {
            return Err(WorkshopError::ItemNotFound(id.to_string()));
        }
        Ok(ItemDetails {
            title: format!("Item {}", id),
            description: "A test mod".to_string(),
            preview_url: String::new(),
            is_collection: self.collections.contains_key(id),
        })
    }

    async fn fetch_collection(&self, id: &str) -> Result<Vec<String>, WorkshopError> {
        self.collections
            .get(id)
            .cloned()
            .ok_or_else(|| WorkshopError::CollectionNotFound(id.to_string()))
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    env: PathBuf,
    registry: ModRegistry,
}

fn fixture(provider: StubProvider) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let env = dir.path().join(".env");
    std::fs::write(&env, "# server env\nSERVER_NAME=alpha\n").unwrap();

    let store = ConfigStore::new(dir.path().join("settings.json"), env.clone());
    let registry = ModRegistry::new(store, env.clone(), Arc::new(provider));
    Fixture {
        _dir: dir,
        env,
        registry,
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn save_then_get_round_trips_in_order() {
    let f = fixture(StubProvider::new());

    f.registry
        .save_mods(strings(&["30", "10", "20"]), strings(&["beta", "alpha"]))
        .await
        .unwrap();

    let list = f.registry.get_mods().unwrap();
    assert_eq!(list.workshop_items, strings(&["30", "10", "20"]));
    assert_eq!(list.mods, strings(&["beta", "alpha"]));
}

#[tokio::test]
async fn save_drops_duplicates_keeping_first_occurrence() {
    let f = fixture(StubProvider::new());

    f.registry
        .save_mods(strings(&["1", "2", "1"]), strings(&["m", "m"]))
        .await
        .unwrap();

    let list = f.registry.get_mods().unwrap();
    assert_eq!(list.workshop_items, strings(&["1", "2"]));
    assert_eq!(list.mods, strings(&["m"]));
}

#[tokio::test]
async fn add_mod_is_idempotent() {
    let f = fixture(StubProvider::new());

    assert!(f.registry.add_mod("100", Some("coolmod")).await.unwrap());
    assert!(!f.registry.add_mod("100", Some("coolmod")).await.unwrap());

    let list = f.registry.get_mods().unwrap();
    assert_eq!(list.workshop_items, strings(&["100"]));
    assert_eq!(list.mods, strings(&["coolmod"]));
}

#[tokio::test]
async fn remove_missing_mod_is_a_success_noop() {
    let f = fixture(StubProvider::new());
    f.registry
        .save_mods(strings(&["1"]), strings(&["m"]))
        .await
        .unwrap();

    let changed = f.registry.remove_mod(Some("999"), None).await.unwrap();
    assert!(!changed);
    assert_eq!(f.registry.get_mods().unwrap().workshop_items, strings(&["1"]));

    let changed = f.registry.remove_mod(Some("1"), Some("m")).await.unwrap();
    assert!(changed);
    let list = f.registry.get_mods().unwrap();
    assert!(list.workshop_items.is_empty());
    assert!(list.mods.is_empty());
}

#[tokio::test]
async fn import_collection_skips_existing_members() {
    let provider = StubProvider::new().with_collection("555", &["1", "2", "3"]);
    let f = fixture(provider);
    f.registry
        .save_mods(strings(&["2"]), strings(&[]))
        .await
        .unwrap();

    let report = f.registry.import_collection("555").await.unwrap();
    assert_eq!(report.added, 2);
    assert_eq!(report.already_present, 1);
    assert_eq!(report.total, 3);

    // Existing entries keep their position; new members append in order.
    let list = f.registry.get_mods().unwrap();
    assert_eq!(list.workshop_items, strings(&["2", "1", "3"]));
}

#[tokio::test]
async fn import_aborts_cleanly_on_provider_failure() {
    let f = fixture(StubProvider::new());
    f.registry
        .save_mods(strings(&["1"]), strings(&["m"]))
        .await
        .unwrap();

    let err = f.registry.import_collection("nope").await.unwrap_err();
    assert!(matches!(
        err,
        ModError::Workshop(WorkshopError::CollectionNotFound(_))
    ));

    // Nothing was applied.
    let list = f.registry.get_mods().unwrap();
    assert_eq!(list.workshop_items, strings(&["1"]));
    assert_eq!(list.mods, strings(&["m"]));
}

#[tokio::test]
async fn legacy_env_values_migrate_into_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let env = dir.path().join(".env");
    std::fs::write(&env, "WORKSHOP_ITEMS=111;222\nMODS=alpha; beta ;\n").unwrap();

    let store = ConfigStore::new(dir.path().join("settings.json"), env.clone());
    let registry = ModRegistry::new(store, env, Arc::new(StubProvider::new()));

    let list = registry.get_mods().unwrap();
    assert_eq!(list.workshop_items, strings(&["111", "222"]));
    assert_eq!(list.mods, strings(&["alpha", "beta"]));
}

#[tokio::test]
async fn mutations_project_into_the_env_file() {
    let f = fixture(StubProvider::new());

    f.registry
        .save_mods(strings(&["10", "20"]), strings(&["m1"]))
        .await
        .unwrap();

    let content = std::fs::read_to_string(&f.env).unwrap();
    assert!(content.starts_with("# server env\n"));
    assert!(content.contains("SERVER_NAME=alpha\n"));
    assert!(content.contains("WORKSHOP_ITEMS=10;20\n"));
    assert!(content.contains("MODS=m1\n"));
}

#[tokio::test]
async fn lookups_never_fail_hard() {
    let provider = StubProvider::new().with_collection("555", &["1"]);
    let f = fixture(provider);

    let hit = f.registry.lookup_item("42").await;
    assert!(hit.found);
    assert_eq!(hit.title.as_deref(), Some("Item 42"));
    assert_eq!(hit.is_collection, Some(false));

    let miss = f.registry.lookup_item("missing").await;
    assert!(!miss.found);
    assert!(miss.error.is_some());

    let collection = f.registry.lookup_collection("555").await;
    assert!(collection.found);
    assert_eq!(collection.count, Some(1));

    let missing = f.registry.lookup_collection("000").await;
    assert!(!missing.found);
    assert!(missing.error.is_some());
}
