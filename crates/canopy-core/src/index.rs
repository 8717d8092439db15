//! In-memory accessory index keyed by identity

use std::collections::HashMap;
use tracing::{info, warn};

use crate::accessory::{AccessoryId, AccessoryRecord};

/// Accessories known to this process, restored or created during the run.
///
/// Never holds two records with the same identity.
#[derive(Debug, Clone, Default)]
pub struct AccessoryIndex {
    records: HashMap<AccessoryId, AccessoryRecord>,
}

impl AccessoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the index from restored accessories; the first record per identity wins
    pub fn from_restored(restored: impl IntoIterator<Item = AccessoryRecord>) -> Self {
        let mut index = Self::new();
        for record in restored {
            info!(
                identity = %record.identity,
                name = %record.display_name,
                "Loading accessory from cache"
            );
            if let Err(duplicate) = index.insert(record) {
                warn!(
                    identity = %duplicate.identity,
                    name = %duplicate.display_name,
                    "Ignoring restored accessory with duplicate identity"
                );
            }
        }
        index
    }

    /// Insert a new record, handing it back if the identity is already taken
    pub fn insert(&mut self, record: AccessoryRecord) -> Result<(), AccessoryRecord> {
        if self.records.contains_key(&record.identity) {
            return Err(record);
        }
        self.records.insert(record.identity, record);
        Ok(())
    }

    pub fn get(&self, identity: &AccessoryId) -> Option<&AccessoryRecord> {
        self.records.get(identity)
    }

    pub fn get_mut(&mut self, identity: &AccessoryId) -> Option<&mut AccessoryRecord> {
        self.records.get_mut(identity)
    }

    pub fn contains(&self, identity: &AccessoryId) -> bool {
        self.records.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &AccessoryRecord> {
        self.records.values()
    }
}
