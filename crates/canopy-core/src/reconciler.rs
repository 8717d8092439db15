//! Accessory reconciler
//!
//! Matches each device observation against the accessory index by identity.
//! Known identities take the restore path (context refresh + host update),
//! unknown identities take the create path (insert + host register). The index
//! is always mutated before the host call is issued, so a repeated observation
//! of a new device never triggers a second registration, even if the first
//! registration failed or has not completed.

use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::accessory::{AccessoryId, AccessoryRecord, DeviceObservation};
use crate::error::CoreError;
use crate::host::{AccessoryHandler, AccessoryHost};
use crate::index::AccessoryIndex;

/// Which path a reconciliation took, and whether the host accepted it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// First sighting: the record was created and registration attempted
    Created { identity: AccessoryId, registered: bool },
    /// Known accessory: the context was refreshed and an update attempted
    Restored { identity: AccessoryId, updated: bool },
}

impl Reconciled {
    pub fn identity(&self) -> AccessoryId {
        match self {
            Self::Created { identity, .. } | Self::Restored { identity, .. } => *identity,
        }
    }

    /// Whether the host-side call succeeded
    pub fn host_synced(&self) -> bool {
        match self {
            Self::Created { registered, .. } => *registered,
            Self::Restored { updated, .. } => *updated,
        }
    }
}

/// Reconciles device observations into accessories
pub struct Reconciler<H, W> {
    host: H,
    handler: W,
    index: Arc<RwLock<AccessoryIndex>>,
}

impl<H, W> Reconciler<H, W>
where
    H: AccessoryHost,
    W: AccessoryHandler,
{
    /// Create a reconciler, building the index from the host's restored accessories
    pub fn new(host: H, handler: W) -> Self {
        let index = AccessoryIndex::from_restored(host.restored_accessories());
        info!(count = index.len(), "Restored accessories from host cache");

        Self {
            host,
            handler,
            index: Arc::new(RwLock::new(index)),
        }
    }

    /// Shared handle to the accessory index
    pub fn index(&self) -> Arc<RwLock<AccessoryIndex>> {
        self.index.clone()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn handler(&self) -> &W {
        &self.handler
    }

    /// Reconcile a single observation.
    ///
    /// Only a malformed identifier is returned as an error; host failures are
    /// logged and reported through the returned [`Reconciled`].
    pub async fn reconcile(&mut self, observation: DeviceObservation) -> Result<Reconciled, CoreError> {
        let identity = self.host.compute_identity(&observation.identifier)?;
        debug!(id = %observation.identifier, identity = %identity, "Computed accessory identity");

        let restored = {
            let mut index = self.index.write().await;
            match index.get_mut(&identity) {
                Some(existing) => {
                    info!(
                        identity = %identity,
                        name = %existing.display_name,
                        "Restoring existing accessory from cache"
                    );
                    existing.refresh_device(&observation);
                    Some(existing.clone())
                }
                None => None,
            }
        };

        let (record, outcome) = match restored {
            Some(record) => {
                let updated = self.update(&record).await;
                (record, Reconciled::Restored { identity, updated })
            }
            None => {
                let record = self.create(identity, &observation).await;
                let registered = self.register(&record).await;
                (record, Reconciled::Created { identity, registered })
            }
        };

        self.handler.on_reconciled(&record, &observation);
        Ok(outcome)
    }

    /// Allocate a record for a new identity and insert it into the index
    async fn create(&mut self, identity: AccessoryId, observation: &DeviceObservation) -> AccessoryRecord {
        info!(identity = %identity, name = %observation.display_name, "Adding new accessory");

        let mut record = self.host.create_accessory_record(
            identity,
            &observation.display_name,
            observation.category(),
        );
        record.identity = identity;
        record.refresh_device(observation);

        let mut index = self.index.write().await;
        match index.insert(record.clone()) {
            Ok(()) => record,
            Err(_) => {
                // Unreachable while reconciliations are serialized through &mut self
                warn!(identity = %identity, "Accessory appeared in index during create");
                index.get(&identity).cloned().unwrap_or(record)
            }
        }
    }

    async fn register(&mut self, record: &AccessoryRecord) -> bool {
        match self.host.register_accessories(std::slice::from_ref(record)).await {
            Ok(()) => true,
            Err(e) => {
                let error = CoreError::HostRegistration(e);
                warn!(identity = %record.identity, error = %error, "Accessory registration failed");
                false
            }
        }
    }

    async fn update(&mut self, record: &AccessoryRecord) -> bool {
        match self.host.update_accessories(std::slice::from_ref(record)).await {
            Ok(()) => true,
            Err(e) => {
                let error = CoreError::HostUpdate(e);
                warn!(identity = %record.identity, error = %error, "Accessory update failed");
                false
            }
        }
    }

    /// Drain the observation feed, reconciling one observation at a time.
    ///
    /// Returns the reconciler once every feed sender has been dropped.
    pub async fn run(mut self, mut observations: mpsc::Receiver<DeviceObservation>) -> Self {
        let mut reconciled = 0usize;
        while let Some(observation) = observations.recv().await {
            let id = observation.identifier.clone();
            match self.reconcile(observation).await {
                Ok(_) => reconciled += 1,
                Err(e) => warn!(id = %id, error = %e, "Dropping observation"),
            }
        }

        info!(reconciled, "Observation feed closed");
        self
    }
}
