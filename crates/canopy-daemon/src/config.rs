//! Configuration loading and validation

use anyhow::Result;
use canopy_core::DeviceObservation;
use canopy_discovery::ScannerConfig;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    /// Devices reconciled at startup without discovery
    #[serde(default, rename = "device")]
    pub devices: Vec<DeviceObservation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Bridge name shown in logs
    #[serde(default = "default_name")]
    pub name: String,
    /// Plugin name accessories are registered under
    #[serde(default = "default_plugin")]
    pub plugin: String,
    /// Platform name accessories are registered under
    #[serde(default = "default_platform")]
    pub platform: String,
    /// Path to the accessory cache file
    #[serde(default = "default_cache_path")]
    pub cache_path: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            plugin: default_plugin(),
            platform: default_platform(),
            cache_path: default_cache_path(),
        }
    }
}

fn default_name() -> String {
    "Canopy".to_string()
}

fn default_plugin() -> String {
    "homebridge-haiku".to_string()
}

fn default_platform() -> String {
    "HaikuPlatform".to_string()
}

fn default_cache_path() -> String {
    "./accessories/cachedAccessories.json".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Run SenseME broadcast discovery
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Address the discovery query is broadcast to
    #[serde(default = "default_broadcast")]
    pub broadcast_address: Ipv4Addr,
    /// SenseME UDP port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Discovery window length in seconds
    #[serde(default = "default_window")]
    pub window_secs: u64,
    /// Query re-broadcast interval within a window
    #[serde(default = "default_query_interval")]
    pub query_interval_secs: u64,
    /// Pause between discovery windows (0 to run a single window)
    #[serde(default = "default_rescan_interval")]
    pub rescan_interval_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            broadcast_address: default_broadcast(),
            port: default_port(),
            window_secs: default_window(),
            query_interval_secs: default_query_interval(),
            rescan_interval_secs: default_rescan_interval(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_broadcast() -> Ipv4Addr {
    Ipv4Addr::BROADCAST
}

fn default_port() -> u16 {
    31415
}

fn default_window() -> u64 {
    30
}

fn default_query_interval() -> u64 {
    5
}

fn default_rescan_interval() -> u64 {
    300
}

impl Config {
    /// Convert to ScannerConfig; `single_window` disables rescanning
    pub fn to_scanner_config(&self, single_window: bool) -> ScannerConfig {
        ScannerConfig {
            broadcast_address: self.discovery.broadcast_address,
            port: self.discovery.port,
            window_secs: self.discovery.window_secs,
            query_interval_secs: self.discovery.query_interval_secs,
            rescan_interval_secs: if single_window {
                0
            } else {
                self.discovery.rescan_interval_secs
            },
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

/// Save default configuration to file
pub fn save_default_config(path: &Path) -> Result<()> {
    let config = Config {
        devices: vec![DeviceObservation::new(
            "20:F8:5E:E2:4C:98",
            "Master Bedroom Light",
            "HAIKU,LIGHT",
        )],
        ..Default::default()
    };

    let content = toml::to_string_pretty(&config)?;
    std::fs::write(path, content)?;
    Ok(())
}
