//! Collaborator traits: the accessory host and downstream accessory wiring

use std::future::Future;

use crate::accessory::{AccessoryCategory, AccessoryId, AccessoryRecord, DeviceObservation};
use crate::error::{CoreError, HostError};

/// The home-automation host that owns accessory persistence and registration
pub trait AccessoryHost {
    /// Accessories restored from the host cache, supplied once at startup
    fn restored_accessories(&self) -> Vec<AccessoryRecord>;

    /// Derive the identity for a device identifier
    fn compute_identity(&self, identifier: &str) -> Result<AccessoryId, CoreError> {
        AccessoryId::from_identifier(identifier)
    }

    /// Allocate a new, unregistered accessory record
    fn create_accessory_record(
        &mut self,
        identity: AccessoryId,
        display_name: &str,
        category: AccessoryCategory,
    ) -> AccessoryRecord;

    /// Register newly created accessories with the host
    fn register_accessories(
        &mut self,
        records: &[AccessoryRecord],
    ) -> impl Future<Output = Result<(), HostError>> + Send;

    /// Push updated accessories (e.g. refreshed context) to the host
    fn update_accessories(
        &mut self,
        records: &[AccessoryRecord],
    ) -> impl Future<Output = Result<(), HostError>> + Send;
}

/// Downstream per-accessory wiring, invoked once per reconciled observation
pub trait AccessoryHandler {
    fn on_reconciled(&mut self, record: &AccessoryRecord, observation: &DeviceObservation);
}
