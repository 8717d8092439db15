//! Canopy Core - Accessory identity, index, persistence and reconciliation
//!
//! This crate provides the accessory lifecycle engine for the Canopy bridge:
//! - Deterministic accessory identities derived from stable device identifiers
//! - The in-memory accessory index built from restored records
//! - The reconciler deciding between restore (refresh) and create (register)
//! - A file-backed accessory host persisting records across restarts

pub mod accessory;
pub mod error;
pub mod feed;
pub mod host;
pub mod index;
pub mod reconciler;
pub mod store;

pub use accessory::{AccessoryCategory, AccessoryId, AccessoryRecord, DeviceObservation};
pub use error::{CoreError, HostError};
pub use feed::{feed, ObservationFeed};
pub use host::{AccessoryHandler, AccessoryHost};
pub use index::AccessoryIndex;
pub use reconciler::{Reconciled, Reconciler};
pub use store::{FileAccessoryStore, StoreError};
