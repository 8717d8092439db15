//! Errors raised while reconciling observations

use thiserror::Error;

use crate::accessory::AccessoryId;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid device identifier: {0:?}")]
    InvalidIdentifier(String),
    #[error("Host registration failed: {0}")]
    HostRegistration(#[source] HostError),
    #[error("Host update failed: {0}")]
    HostUpdate(#[source] HostError),
}

/// Failure reported by an accessory host
#[derive(Error, Debug)]
pub enum HostError {
    #[error("Accessory {0} is already registered")]
    AlreadyRegistered(AccessoryId),
    #[error("Accessory {0} is not registered")]
    NotRegistered(AccessoryId),
    #[error("Accessory {identity} belongs to {plugin}/{platform}")]
    ForeignAccessory {
        identity: AccessoryId,
        plugin: String,
        platform: String,
    },
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    Rejected(String),
}
