//! File-backed accessory host
//!
//! Registered accessories are persisted in a JSON manifest so they can be
//! restored on the next start. Entries are keyed by accessory identity and
//! tagged with the plugin and platform that registered them; only entries
//! belonging to this bridge are handed back at startup.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::accessory::{AccessoryCategory, AccessoryId, AccessoryRecord};
use crate::error::HostError;
use crate::host::AccessoryHost;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Manifest entry for a single registered accessory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedAccessory {
    /// Plugin that registered the accessory
    pub plugin: String,
    /// Platform within the plugin
    pub platform: String,
    pub display_name: String,
    pub category: AccessoryCategory,
    #[serde(default)]
    pub context: Map<String, Value>,
    /// When the accessory was registered (RFC 3339)
    pub registered_at: String,
    /// When the accessory was last updated (RFC 3339)
    pub updated_at: String,
}

impl CachedAccessory {
    fn to_record(&self, identity: AccessoryId) -> AccessoryRecord {
        AccessoryRecord {
            identity,
            display_name: self.display_name.clone(),
            category: self.category,
            context: self.context.clone(),
        }
    }
}

/// The accessory manifest tracks every registered accessory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessoryManifest {
    /// Version of the manifest format
    #[serde(default = "default_version")]
    pub version: String,
    /// Accessories keyed by identity
    #[serde(default)]
    pub accessories: BTreeMap<AccessoryId, CachedAccessory>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl AccessoryManifest {
    pub fn new() -> Self {
        Self {
            version: default_version(),
            accessories: BTreeMap::new(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path)?;
        let manifest: AccessoryManifest = serde_json::from_str(&content)?;
        Ok(manifest)
    }

    /// Load manifest or create new if file doesn't exist
    pub fn load_or_create(path: &Path) -> Result<Self, StoreError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::new())
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn contains(&self, identity: &AccessoryId) -> bool {
        self.accessories.contains_key(identity)
    }

    pub fn get(&self, identity: &AccessoryId) -> Option<&CachedAccessory> {
        self.accessories.get(identity)
    }
}

/// Accessory host persisting registered accessories to a manifest file
#[derive(Debug, Clone)]
pub struct FileAccessoryStore {
    /// Path to the manifest file
    pub manifest_path: PathBuf,
    /// The accessory manifest
    pub manifest: AccessoryManifest,
    plugin: String,
    platform: String,
}

impl FileAccessoryStore {
    /// Open the store at the given manifest path, loading any cached accessories
    pub fn open(
        manifest_path: PathBuf,
        plugin: impl Into<String>,
        platform: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let manifest = AccessoryManifest::load_or_create(&manifest_path)?;
        debug!(
            path = %manifest_path.display(),
            count = manifest.accessories.len(),
            "Opened accessory store"
        );

        Ok(Self {
            manifest_path,
            manifest,
            plugin: plugin.into(),
            platform: platform.into(),
        })
    }

    fn owns(&self, entry: &CachedAccessory) -> bool {
        entry.plugin == self.plugin && entry.platform == self.platform
    }

    /// Accessories belonging to this plugin/platform
    pub fn accessories(&self) -> Vec<AccessoryRecord> {
        self.manifest
            .accessories
            .iter()
            .filter(|(_, entry)| self.owns(entry))
            .map(|(identity, entry)| entry.to_record(*identity))
            .collect()
    }

    /// Save `staged` and adopt it as the current manifest only once it is on disk
    fn commit(&mut self, staged: AccessoryManifest) -> Result<(), HostError> {
        staged.save(&self.manifest_path)?;
        self.manifest = staged;
        Ok(())
    }

    fn register(&mut self, records: &[AccessoryRecord]) -> Result<(), HostError> {
        if let Some(existing) = records.iter().find(|r| self.manifest.contains(&r.identity)) {
            return Err(HostError::AlreadyRegistered(existing.identity));
        }

        let now = chrono::Utc::now().to_rfc3339();
        let mut staged = self.manifest.clone();
        for record in records {
            staged.accessories.insert(
                record.identity,
                CachedAccessory {
                    plugin: self.plugin.clone(),
                    platform: self.platform.clone(),
                    display_name: record.display_name.clone(),
                    category: record.category,
                    context: record.context.clone(),
                    registered_at: now.clone(),
                    updated_at: now.clone(),
                },
            );
        }

        self.commit(staged)?;
        for record in records {
            info!(identity = %record.identity, name = %record.display_name, "Registered accessory");
        }
        Ok(())
    }

    fn update(&mut self, records: &[AccessoryRecord]) -> Result<(), HostError> {
        for record in records {
            match self.manifest.get(&record.identity) {
                None => return Err(HostError::NotRegistered(record.identity)),
                Some(entry) if !self.owns(entry) => {
                    return Err(HostError::ForeignAccessory {
                        identity: record.identity,
                        plugin: entry.plugin.clone(),
                        platform: entry.platform.clone(),
                    })
                }
                Some(_) => {}
            }
        }

        let now = chrono::Utc::now().to_rfc3339();
        let mut staged = self.manifest.clone();
        for record in records {
            if let Some(entry) = staged.accessories.get_mut(&record.identity) {
                entry.display_name = record.display_name.clone();
                entry.category = record.category;
                entry.context = record.context.clone();
                entry.updated_at = now.clone();
            }
        }

        self.commit(staged)?;
        for record in records {
            debug!(identity = %record.identity, "Updated cached accessory");
        }
        Ok(())
    }
}

impl AccessoryHost for FileAccessoryStore {
    fn restored_accessories(&self) -> Vec<AccessoryRecord> {
        self.accessories()
    }

    fn create_accessory_record(
        &mut self,
        identity: AccessoryId,
        display_name: &str,
        category: AccessoryCategory,
    ) -> AccessoryRecord {
        AccessoryRecord::new(identity, display_name.to_string(), category)
    }

    async fn register_accessories(&mut self, records: &[AccessoryRecord]) -> Result<(), HostError> {
        self.register(records)
    }

    async fn update_accessories(&mut self, records: &[AccessoryRecord]) -> Result<(), HostError> {
        self.update(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessory::DeviceObservation;
    use crate::reconciler::{Reconciled, Reconciler};
    use crate::host::AccessoryHandler;
    use tempfile::TempDir;

    struct NoWiring;

    impl AccessoryHandler for NoWiring {
        fn on_reconciled(&mut self, _record: &AccessoryRecord, _observation: &DeviceObservation) {}
    }

    fn observed_record(store: &mut FileAccessoryStore) -> AccessoryRecord {
        let observation =
            DeviceObservation::new("20:F8:5E:E2:4C:98", "Master Bedroom Light", "HAIKU,LIGHT");
        let identity = store.compute_identity(&observation.identifier).unwrap();
        let mut record = store.create_accessory_record(
            identity,
            &observation.display_name,
            observation.category(),
        );
        record.refresh_device(&observation);
        record
    }

    #[tokio::test]
    async fn test_register_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("accessories").join("cachedAccessories.json");

        let mut store = FileAccessoryStore::open(path.clone(), "homebridge-haiku", "HaikuPlatform").unwrap();
        assert!(store.restored_accessories().is_empty());

        let record = observed_record(&mut store);
        store.register_accessories(&[record.clone()]).await.unwrap();

        let reopened = FileAccessoryStore::open(path, "homebridge-haiku", "HaikuPlatform").unwrap();
        let restored = reopened.restored_accessories();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0], record);
        assert_eq!(restored[0].device().unwrap().display_name, "Master Bedroom Light");
    }

    #[tokio::test]
    async fn test_register_twice_fails() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = FileAccessoryStore::open(
            temp_dir.path().join("cache.json"),
            "homebridge-haiku",
            "HaikuPlatform",
        )
        .unwrap();

        let record = observed_record(&mut store);
        store.register_accessories(&[record.clone()]).await.unwrap();
        let err = store.register_accessories(&[record]).await.unwrap_err();
        assert!(matches!(err, HostError::AlreadyRegistered(_)));
    }

    #[tokio::test]
    async fn test_update_requires_registration() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = FileAccessoryStore::open(
            temp_dir.path().join("cache.json"),
            "homebridge-haiku",
            "HaikuPlatform",
        )
        .unwrap();

        let mut record = observed_record(&mut store);
        let err = store.update_accessories(&[record.clone()]).await.unwrap_err();
        assert!(matches!(err, HostError::NotRegistered(_)));

        store.register_accessories(&[record.clone()]).await.unwrap();
        record.refresh_device(&DeviceObservation::new("20:F8:5E:E2:4C:98", "Bedroom", "LIGHT,HAIKU"));
        store.update_accessories(&[record.clone()]).await.unwrap();

        let cached = store.manifest.get(&record.identity).unwrap();
        assert_eq!(cached.context["device"]["name"], "Bedroom");
    }

    #[tokio::test]
    async fn test_restored_filters_foreign_platforms() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cache.json");

        let mut other = FileAccessoryStore::open(path.clone(), "homebridge-other", "OtherPlatform").unwrap();
        let record = observed_record(&mut other);
        other.register_accessories(&[record]).await.unwrap();

        let store = FileAccessoryStore::open(path, "homebridge-haiku", "HaikuPlatform").unwrap();
        assert!(store.restored_accessories().is_empty());
        assert_eq!(store.manifest.accessories.len(), 1);
    }

    #[tokio::test]
    async fn test_update_refuses_foreign_accessory() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cache.json");

        let mut other = FileAccessoryStore::open(path.clone(), "homebridge-other", "OtherPlatform").unwrap();
        let record = observed_record(&mut other);
        other.register_accessories(&[record]).await.unwrap();

        let store = FileAccessoryStore::open(path.clone(), "homebridge-haiku", "HaikuPlatform").unwrap();
        let mut reconciler = Reconciler::new(store, NoWiring);
        let hijack = DeviceObservation::new("20:F8:5E:E2:4C:98", "Hijacked", "FAN");

        let first = reconciler.reconcile(hijack.clone()).await.unwrap();
        let second = reconciler.reconcile(hijack).await.unwrap();
        assert!(matches!(first, Reconciled::Created { registered: false, .. }));
        assert!(matches!(second, Reconciled::Restored { updated: false, .. }));

        let reopened = FileAccessoryStore::open(path, "homebridge-other", "OtherPlatform").unwrap();
        let entry = reopened.manifest.accessories.values().next().unwrap();
        assert_eq!(entry.plugin, "homebridge-other");
        assert_eq!(entry.display_name, "Master Bedroom Light");
        assert_eq!(entry.context["device"]["name"], "Master Bedroom Light");
        assert_eq!(reconciler.host().manifest.accessories.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_save_leaves_manifest_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        // The parent "directory" is a regular file, so saving always fails
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();

        let mut store = FileAccessoryStore::open(
            blocker.join("cache.json"),
            "homebridge-haiku",
            "HaikuPlatform",
        )
        .unwrap();

        let record = observed_record(&mut store);
        let err = store.register_accessories(&[record.clone()]).await.unwrap_err();
        assert!(matches!(err, HostError::Store(_)));
        assert!(!store.manifest.contains(&record.identity));
    }

    #[tokio::test]
    async fn test_second_run_takes_restore_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cache.json");
        let light = DeviceObservation::new("20:F8:5E:E2:4C:98", "Master Bedroom Light", "HAIKU,LIGHT");

        let store = FileAccessoryStore::open(path.clone(), "homebridge-haiku", "HaikuPlatform").unwrap();
        let mut first_run = Reconciler::new(store, NoWiring);
        let created = first_run.reconcile(light.clone()).await.unwrap();
        assert!(matches!(created, Reconciled::Created { registered: true, .. }));
        drop(first_run);

        let store = FileAccessoryStore::open(path.clone(), "homebridge-haiku", "HaikuPlatform").unwrap();
        let mut second_run = Reconciler::new(store, NoWiring);
        assert_eq!(second_run.index().read().await.len(), 1);

        let renamed = DeviceObservation::new("20:F8:5E:E2:4C:98", "Bedroom Light", "LIGHT,HAIKU");
        let restored = second_run.reconcile(renamed).await.unwrap();
        assert_eq!(
            restored,
            Reconciled::Restored { identity: created.identity(), updated: true }
        );

        let reopened = FileAccessoryStore::open(path, "homebridge-haiku", "HaikuPlatform").unwrap();
        let records = reopened.restored_accessories();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].device().unwrap().display_name, "Bedroom Light");
    }
}
