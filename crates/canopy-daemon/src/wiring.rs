//! Per-accessory handler binding

use canopy_core::{AccessoryCategory, AccessoryHandler, AccessoryId, AccessoryRecord, DeviceObservation};
use std::collections::HashMap;
use tracing::{debug, info};

/// Handler state for an accessory bound during this run
#[derive(Debug, Clone)]
pub struct BoundAccessory {
    pub display_name: String,
    pub category: AccessoryCategory,
    /// Latest reported device kind
    pub kind: String,
    /// Number of observations reconciled into this accessory
    pub observations: u32,
}

/// Binds a handler to every reconciled accessory
#[derive(Debug, Default)]
pub struct AccessoryWiring {
    bound: HashMap<AccessoryId, BoundAccessory>,
}

impl AccessoryWiring {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bound(&self) -> impl Iterator<Item = (&AccessoryId, &BoundAccessory)> {
        self.bound.iter()
    }

    pub fn len(&self) -> usize {
        self.bound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }
}

impl AccessoryHandler for AccessoryWiring {
    fn on_reconciled(&mut self, record: &AccessoryRecord, observation: &DeviceObservation) {
        match self.bound.get_mut(&record.identity) {
            Some(bound) => {
                bound.kind = observation.kind.clone();
                bound.observations += 1;
                debug!(identity = %record.identity, "Refreshed accessory handler");
            }
            None => {
                info!(
                    identity = %record.identity,
                    name = %record.display_name,
                    category = ?record.category,
                    "Binding accessory handler"
                );
                self.bound.insert(
                    record.identity,
                    BoundAccessory {
                        display_name: record.display_name.clone(),
                        category: record.category,
                        kind: observation.kind.clone(),
                        observations: 1,
                    },
                );
            }
        }
    }
}
