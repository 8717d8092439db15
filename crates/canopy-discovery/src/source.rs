//! Static observation source

use canopy_core::{DeviceObservation, ObservationFeed};
use tracing::{debug, info};

/// Push each configured device into the feed once.
///
/// Returns the number of observations accepted before the feed closed.
pub async fn publish_static(devices: &[DeviceObservation], feed: &ObservationFeed) -> usize {
    let mut published = 0;
    for device in devices {
        debug!(id = %device.identifier, name = %device.display_name, "Publishing configured device");
        if !feed.observe(device.clone()).await {
            break;
        }
        published += 1;
    }

    info!(count = published, "Published configured devices");
    published
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_core::feed;

    #[tokio::test]
    async fn test_publish_static() {
        let (feed, mut rx) = feed(8);
        let devices = vec![
            DeviceObservation::new("20:F8:5E:E2:4C:90", "Master Bedroom Light", "LIGHT,HAIKU"),
            DeviceObservation::new("20:F8:5E:E2:4D:80", "Entryway Light", "LIGHT,HAIKU"),
        ];

        assert_eq!(publish_static(&devices, &feed).await, 2);
        drop(feed);

        assert_eq!(rx.recv().await.unwrap(), devices[0]);
        assert_eq!(rx.recv().await.unwrap(), devices[1]);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_publish_static_stops_on_closed_feed() {
        let (feed, rx) = feed(8);
        drop(rx);
        let devices = vec![DeviceObservation::new("20:F8:5E:E2:4C:90", "Light", "LIGHT")];
        assert_eq!(publish_static(&devices, &feed).await, 0);
    }
}
