//! Canopy Daemon - Main entry point
//!
//! Restores cached accessories, then reconciles configured and discovered
//! devices into them.

mod config;
mod wiring;

use anyhow::Result;
use canopy_core::feed::DEFAULT_FEED_CAPACITY;
use canopy_core::{AccessoryHost, FileAccessoryStore, Reconciler};
use canopy_discovery::{publish_static, DiscoveryScanner};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::wiring::AccessoryWiring;

#[derive(Parser, Debug)]
#[command(name = "canopy")]
#[command(about = "Haiku device discovery and accessory reconciliation bridge")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "canopy.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Write a default configuration file and exit
    #[arg(long)]
    init: bool,

    /// List cached accessories and exit
    #[arg(long)]
    list: bool,

    /// Run a single discovery window and exit
    #[arg(long)]
    scan_once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Canopy v{}", env!("CARGO_PKG_VERSION"));

    if args.init {
        config::save_default_config(&args.config)?;
        println!("Wrote default configuration to {}", args.config.display());
        return Ok(());
    }

    let config = config::load_config(&args.config)?;

    info!(
        bridge = %config.bridge.name,
        cache = %config.bridge.cache_path,
        devices = config.devices.len(),
        discovery = config.discovery.enabled,
        "Configuration loaded"
    );

    let store = FileAccessoryStore::open(
        PathBuf::from(&config.bridge.cache_path),
        &config.bridge.plugin,
        &config.bridge.platform,
    )?;

    if args.list {
        let records = store.restored_accessories();
        println!("{} cached accessories:", records.len());
        for record in records {
            println!(
                "  - {} ({}) [{:?}]",
                record.display_name, record.identity, record.category
            );
            if let Some(device) = record.device() {
                println!("    Device: {} {}", device.identifier, device.kind);
            }
        }
        return Ok(());
    }

    let reconciler = Reconciler::new(store, AccessoryWiring::new());
    let (feed, observations) = canopy_core::feed(DEFAULT_FEED_CAPACITY);
    let reconciler_task = tokio::spawn(reconciler.run(observations));

    publish_static(&config.devices, &feed).await;

    if config.discovery.enabled {
        let scanner = DiscoveryScanner::new(config.to_scanner_config(args.scan_once), feed.clone());
        tokio::select! {
            result = scanner.run() => result?,
            _ = tokio::signal::ctrl_c() => info!("Interrupted, stopping discovery"),
        }
    }

    // Closing the feed lets the reconciler drain what is queued and stop
    drop(feed);
    let reconciler = reconciler_task.await?;

    let accessories = reconciler.index().read().await.len();
    info!(
        accessories,
        bound = reconciler.handler().len(),
        "Reconciliation finished"
    );

    for (identity, bound) in reconciler.handler().bound() {
        println!(
            "  - {} ({}) [{:?}] observed {}x as {}",
            bound.display_name, identity, bound.category, bound.observations, bound.kind
        );
    }

    Ok(())
}
