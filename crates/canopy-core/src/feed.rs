//! Observation feed between discovery sources and the reconciler

use tokio::sync::mpsc;
use tracing::warn;

use crate::accessory::DeviceObservation;

/// Default number of observations buffered between sources and the reconciler
pub const DEFAULT_FEED_CAPACITY: usize = 64;

/// Sending half handed to observation sources; cheap to clone
#[derive(Debug, Clone)]
pub struct ObservationFeed {
    tx: mpsc::Sender<DeviceObservation>,
}

/// Create a feed and the receiver the reconciler drains in order
pub fn feed(capacity: usize) -> (ObservationFeed, mpsc::Receiver<DeviceObservation>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ObservationFeed { tx }, rx)
}

impl ObservationFeed {
    /// Queue an observation, waiting for buffer space.
    ///
    /// Returns false once the reconciler has shut down.
    pub async fn observe(&self, observation: DeviceObservation) -> bool {
        match self.tx.send(observation).await {
            Ok(()) => true,
            Err(mpsc::error::SendError(observation)) => {
                warn!(
                    id = %observation.identifier,
                    "Observation feed closed, dropping observation"
                );
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
