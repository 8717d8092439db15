//! SenseME discovery scanner
//!
//! Broadcasts the SenseME ID query for a bounded discovery window, turns every
//! reply into a device observation and forwards it to the reconciler feed.

use anyhow::Result;
use canopy_core::{DeviceObservation, ObservationFeed};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{sleep, timeout, Duration, Instant};
use tracing::{debug, info, warn};

use crate::senseme::{parse_reply, DISCOVERY_QUERY, SENSEME_PORT};

/// Scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Address the ID query is broadcast to
    pub broadcast_address: Ipv4Addr,
    /// SenseME UDP port
    pub port: u16,
    /// Length of each discovery window in seconds
    pub window_secs: u64,
    /// How often the query is re-broadcast within a window
    pub query_interval_secs: u64,
    /// Pause between discovery windows (0 runs a single window)
    pub rescan_interval_secs: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            broadcast_address: Ipv4Addr::BROADCAST,
            port: SENSEME_PORT,
            window_secs: 30,
            query_interval_secs: 5,
            rescan_interval_secs: 300,
        }
    }
}

/// Discovery event for real-time updates
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    /// Device answered the ID query
    DeviceFound(DeviceObservation),
    /// Device seen in an earlier window did not answer in the latest one
    DeviceLost(DeviceObservation),
    /// Discovery window opened
    ScanStarted,
    /// Discovery window closed
    ScanCompleted { found: usize, lost: usize },
}

/// Discovery scanner service
pub struct DiscoveryScanner {
    config: ScannerConfig,
    devices: Arc<RwLock<HashMap<String, DeviceObservation>>>,
    event_tx: broadcast::Sender<DiscoveryEvent>,
    feed: ObservationFeed,
}

impl DiscoveryScanner {
    /// Create a new scanner forwarding observations into `feed`
    pub fn new(config: ScannerConfig, feed: ObservationFeed) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            config,
            devices: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
            feed,
        }
    }

    /// Subscribe to discovery events
    pub fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.event_tx.subscribe()
    }

    /// Devices that answered the most recent discovery window
    pub async fn devices(&self) -> Vec<DeviceObservation> {
        self.devices.read().await.values().cloned().collect()
    }

    /// Run a single discovery window
    pub async fn scan_once(&self) -> Result<Vec<DeviceObservation>> {
        let _ = self.event_tx.send(DiscoveryEvent::ScanStarted);

        let target = SocketAddr::from((self.config.broadcast_address, self.config.port));
        let window = Duration::from_secs(self.config.window_secs);
        let query_interval = Duration::from_secs(self.config.query_interval_secs.max(1));

        info!(addr = %target, window_secs = self.config.window_secs, "Starting SenseME discovery");

        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.set_broadcast(true)?;

        let deadline = Instant::now() + window;
        let mut next_query = Instant::now();
        let mut seen: HashMap<String, DeviceObservation> = HashMap::new();
        let mut buf = [0u8; 1024];

        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }

            if now >= next_query {
                socket.send_to(DISCOVERY_QUERY.as_bytes(), target).await?;
                next_query = now + query_interval;
            }

            let wait = deadline.min(next_query).saturating_duration_since(now);
            let (len, from) = match timeout(wait, socket.recv_from(&mut buf)).await {
                Ok(Ok(received)) => received,
                Ok(Err(e)) => {
                    warn!(error = %e, "Discovery receive failed");
                    continue;
                }
                Err(_) => continue,
            };

            let reply = String::from_utf8_lossy(&buf[..len]);
            let Some(device) = parse_reply(&reply) else {
                debug!(from = %from, reply = %reply, "Ignoring unrecognized discovery reply");
                continue;
            };

            if seen.contains_key(&device.identifier) {
                continue;
            }

            info!(name = %device.display_name, id = %device.identifier, from = %from, "Found a device");
            seen.insert(device.identifier.clone(), device.clone());
            let _ = self.event_tx.send(DiscoveryEvent::DeviceFound(device.clone()));
            if !self.feed.observe(device).await {
                info!("Observation feed closed, ending discovery window early");
                break;
            }
        }

        let mut devices = self.devices.write().await;
        let lost: Vec<DeviceObservation> = devices
            .values()
            .filter(|d| !seen.contains_key(&d.identifier))
            .cloned()
            .collect();

        for device in &lost {
            // No unregistration: the accessory stays registered until removed by hand
            info!(name = %device.display_name, id = %device.identifier, "Lost a device");
            let _ = self.event_tx.send(DiscoveryEvent::DeviceLost(device.clone()));
        }

        *devices = seen;
        let found: Vec<DeviceObservation> = devices.values().cloned().collect();

        let _ = self.event_tx.send(DiscoveryEvent::ScanCompleted {
            found: found.len(),
            lost: lost.len(),
        });

        info!(found = found.len(), lost = lost.len(), "Discovery window closed");

        Ok(found)
    }

    /// Run discovery windows until the feed closes, or once if rescanning is disabled
    pub async fn run(&self) -> Result<()> {
        loop {
            if let Err(e) = self.scan_once().await {
                warn!(error = %e, "Discovery scan failed");
            }

            if self.config.rescan_interval_secs == 0 || self.feed.is_closed() {
                return Ok(());
            }

            debug!(secs = self.config.rescan_interval_secs, "Waiting for next discovery window");
            sleep(Duration::from_secs(self.config.rescan_interval_secs)).await;
        }
    }
}
