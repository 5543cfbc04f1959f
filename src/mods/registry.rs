// Mod registry - the ordered workshop item and mod lists

use crate::env_file::EnvFileError;
use crate::mods::workshop::{WorkshopError, WorkshopProvider};
use crate::store::{ConfigStore, StoreError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

pub const WORKSHOP_ITEMS_KEY: &str = "WORKSHOP_ITEMS";
pub const MODS_KEY: &str = "MODS";

#[derive(Error, Debug)]
pub enum ModError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    EnvFile(#[from] EnvFileError),

    #[error(transparent)]
    Workshop(#[from] WorkshopError),
}

/// The two ordered identifier lists the game server loads mods from.
/// Order is load order; neither list holds duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModList {
    pub workshop_items: Vec<String>,
    pub mods: Vec<String>,
}

/// Workshop item lookup as returned to the dashboard. Lookups never fail
/// hard; a miss or provider error comes back with `found: false`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemLookup {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_collection: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionLookup {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of importing a collection into the workshop item list.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub added: usize,
    pub already_present: usize,
    pub total: usize,
}

impl ImportReport {
    pub fn summary(&self) -> String {
        format!(
            "Added {} mods from collection ({} total, {} already present)",
            self.added, self.total, self.already_present
        )
    }
}

/// Reads and writes the mod configuration.
///
/// The settings store is authoritative; every mutation also regenerates
/// the `WORKSHOP_ITEMS` and `MODS` keys in the env file for the server
/// process. Mutations are serialized behind an async mutex so two
/// dashboard requests cannot interleave a read-modify-write.
pub struct ModRegistry {
    store: ConfigStore,
    env_file: PathBuf,
    provider: Arc<dyn WorkshopProvider>,
    write_lock: Mutex<()>,
}

impl ModRegistry {
    pub fn new(store: ConfigStore, env_file: PathBuf, provider: Arc<dyn WorkshopProvider>) -> Self {
        Self {
            store,
            env_file,
            provider,
            write_lock: Mutex::new(()),
        }
    }

    /// Current mod configuration, in stored order.
    pub fn get_mods(&self) -> Result<ModList, ModError> {
        let workshop_items = self.store.get(WORKSHOP_ITEMS_KEY)?.unwrap_or_default();
        let mods = self.store.get(MODS_KEY)?.unwrap_or_default();

        Ok(ModList {
            workshop_items: split_list(&workshop_items),
            mods: split_list(&mods),
        })
    }

    /// Replace both lists wholesale, keeping order and dropping duplicates.
    pub async fn save_mods(
        &self,
        workshop_items: Vec<String>,
        mods: Vec<String>,
    ) -> Result<ModList, ModError> {
        let _guard = self.write_lock.lock().await;
        self.save_locked(workshop_items, mods)
    }

    /// Append a workshop item (and optionally its mod ID). Already-present
    /// entries make this a reported-success no-op.
    ///
    /// Returns whether anything changed.
    pub async fn add_mod(&self, workshop_id: &str, mod_id: Option<&str>) -> Result<bool, ModError> {
        let _guard = self.write_lock.lock().await;
        let mut list = self.get_mods()?;
        let mut changed = false;

        if !list.workshop_items.iter().any(|w| w == workshop_id) {
            list.workshop_items.push(workshop_id.to_string());
            changed = true;
        }
        if let Some(mod_id) = mod_id.filter(|m| !m.is_empty()) {
            if !list.mods.iter().any(|m| m == mod_id) {
                list.mods.push(mod_id.to_string());
                changed = true;
            }
        }

        if changed {
            self.save_locked(list.workshop_items, list.mods)?;
        }
        Ok(changed)
    }

    /// Remove matching entries. A missing match is not an error.
    pub async fn remove_mod(
        &self,
        workshop_id: Option<&str>,
        mod_id: Option<&str>,
    ) -> Result<bool, ModError> {
        let _guard = self.write_lock.lock().await;
        let mut list = self.get_mods()?;
        let before = (list.workshop_items.len(), list.mods.len());

        if let Some(workshop_id) = workshop_id.filter(|w| !w.is_empty()) {
            list.workshop_items.retain(|w| w != workshop_id);
        }
        if let Some(mod_id) = mod_id.filter(|m| !m.is_empty()) {
            list.mods.retain(|m| m != mod_id);
        }

        let changed = before != (list.workshop_items.len(), list.mods.len());
        if changed {
            self.save_locked(list.workshop_items, list.mods)?;
        }
        Ok(changed)
    }

    /// Single-item metadata lookup; never propagates provider failures.
    pub async fn lookup_item(&self, id: &str) -> ItemLookup {
        match self.provider.fetch_item(id).await {
            Ok(details) => ItemLookup {
                found: true,
                title: Some(details.title),
                description: Some(details.description),
                preview_url: Some(details.preview_url),
                is_collection: Some(details.is_collection),
                error: None,
            },
            Err(err) => {
                tracing::warn!("workshop lookup for {} failed: {}", id, err);
                ItemLookup {
                    found: false,
                    title: None,
                    description: None,
                    preview_url: None,
                    is_collection: None,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    /// Collection member lookup; never propagates provider failures.
    pub async fn lookup_collection(&self, id: &str) -> CollectionLookup {
        match self.provider.fetch_collection(id).await {
            Ok(items) => CollectionLookup {
                found: true,
                count: Some(items.len()),
                items: Some(items),
                error: None,
            },
            Err(err) => {
                tracing::warn!("collection lookup for {} failed: {}", id, err);
                CollectionLookup {
                    found: false,
                    items: None,
                    count: None,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    /// Add every member of a collection that is not already present.
    ///
    /// A provider failure aborts the whole import before anything is
    /// written; duplicates are skipped silently.
    pub async fn import_collection(&self, id: &str) -> Result<ImportReport, ModError> {
        let members = self.provider.fetch_collection(id).await?;

        let _guard = self.write_lock.lock().await;
        let mut list = self.get_mods()?;
        let total = members.len();
        let mut added = 0;

        for member in members {
            if !list.workshop_items.iter().any(|w| w == &member) {
                list.workshop_items.push(member);
                added += 1;
            }
        }

        if added > 0 {
            self.save_locked(list.workshop_items, list.mods)?;
        }

        let report = ImportReport {
            added,
            already_present: total - added,
            total,
        };
        tracing::info!("collection {} import: {}", id, report.summary());
        Ok(report)
    }

    fn save_locked(&self, workshop_items: Vec<String>, mods: Vec<String>) -> Result<ModList, ModError> {
        let list = ModList {
            workshop_items: dedup(workshop_items),
            mods: dedup(mods),
        };

        let workshop_value = list.workshop_items.join(";");
        let mods_value = list.mods.join(";");

        self.store.set(WORKSHOP_ITEMS_KEY, &workshop_value)?;
        self.store.set(MODS_KEY, &mods_value)?;

        let mut updates = IndexMap::new();
        updates.insert(WORKSHOP_ITEMS_KEY.to_string(), workshop_value);
        updates.insert(MODS_KEY.to_string(), mods_value);
        crate::env_file::merge_write(&self.env_file, &updates)?;

        Ok(list)
    }
}

/// Split a semicolon-joined stored value, trimming and dropping empties.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Drop duplicate entries, keeping the first occurrence in order.
fn dedup(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_trims_and_drops_empty_tokens() {
        assert_eq!(split_list("a; b ;;c;"), vec!["a", "b", "c"]);
        assert_eq!(split_list(""), Vec::<String>::new());
        assert_eq!(split_list(" ; ; "), Vec::<String>::new());
    }

    #[test]
    fn dedup_keeps_first_occurrence_order() {
        let items = vec!["b", "a", "b", "c", "a"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(dedup(items), vec!["b", "a", "c"]);
    }

    #[test]
    fn import_report_summary_counts() {
        let report = ImportReport {
            added: 3,
            already_present: 2,
            total: 5,
        };
        assert_eq!(
            report.summary(),
            "Added 3 mods from collection (5 total, 2 already present)"
        );
    }
}
