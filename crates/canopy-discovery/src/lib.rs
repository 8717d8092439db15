//! Canopy Discovery - Device observation sources
//!
//! This crate provides the sources feeding observations to the reconciler:
//! - Static device lists from configuration
//! - SenseME broadcast discovery for Haiku fans and lights

pub mod scanner;
pub mod senseme;
pub mod source;

pub use scanner::{DiscoveryEvent, DiscoveryScanner, ScannerConfig};
pub use source::publish_static;
