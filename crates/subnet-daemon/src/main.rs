// crates/subnet-daemon/src/main.rs
//
// Binary entrypoint for the subnet daemon.
//
// Loads configuration, initializes tracing, seeds the in-memory registry with
// the configured subnets, opens the epoch store, and drives the epoch engine
// from a simulated block loop.

mod config;
mod scheduler;

use std::time::Duration;

use clap::Parser;
use config::{DaemonConfig, StorageBackend};
use scheduler::BlockScheduler;

use subnet_consensus::EpochEngine;
use subnet_core::EpochStore;
use subnet_store::{MemoryRegistry, MemoryStore, RocksStore};

/// Subnet daemon: runs the epoch engine against a simulated chain.
#[derive(Parser, Debug)]
#[command(name = "subnet-daemon", version = "0.1.0", about = "Subnet epoch engine daemon")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "~/.subnet/config.toml")]
    config: String,

    /// Stop after producing this many blocks.
    #[arg(long)]
    blocks: Option<u64>,

    /// Keep epoch state in memory instead of RocksDB.
    #[arg(long)]
    memory: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration from TOML file, falling back to defaults if the file
    // is not found. Tracing is not up yet, so the outcome is logged below.
    let config_path = expand_tilde(&args.config);
    let loaded = DaemonConfig::load(&config_path);
    let mut daemon_config = match &loaded {
        Ok(cfg) => cfg.clone(),
        Err(_) => DaemonConfig::default(),
    };

    // Initialize tracing subscriber for structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&daemon_config.log_level)),
        )
        .init();

    match &loaded {
        Ok(_) => tracing::info!("Loaded configuration from {}", config_path),
        Err(e) => tracing::warn!(
            "Could not load config from {}: {}. Using defaults.",
            config_path,
            e
        ),
    }

    // CLI --memory flag overrides the config file value.
    if args.memory {
        daemon_config.storage = StorageBackend::Memory;
    }

    tracing::info!("Subnet daemon v0.1.0");
    tracing::info!("Storage: {:?}", daemon_config.storage);
    tracing::info!("Schedule: {:?}", daemon_config.engine.schedule);
    tracing::info!("Pool split: {:?}", daemon_config.engine.pool_split);

    match daemon_config.storage {
        StorageBackend::Memory => run(&daemon_config, MemoryStore::new(), args.blocks).await,
        StorageBackend::Rocksdb => {
            let data_dir = expand_tilde(&daemon_config.data_dir);
            let db_path = format!("{}/epoch_rocksdb", data_dir);
            std::fs::create_dir_all(&data_dir)?;
            let store = RocksStore::open(&db_path)?;
            tracing::info!("RocksStore opened at {}", db_path);
            run(&daemon_config, store, args.blocks).await
        }
    }
}

async fn run<S: EpochStore>(
    config: &DaemonConfig,
    store: S,
    blocks: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    // Resume the simulated chain after the latest persisted epoch. Seeding
    // happens at that height so resumed participants count as active.
    let registry = MemoryRegistry::new();
    let mut resume_from = 0;
    for subnet in &config.subnets {
        resume_from = resume_from.max(store.last_epoch_block(subnet.netuid)?);
    }
    if resume_from > 0 {
        tracing::info!(block = resume_from, "Resuming from persisted epoch state");
        registry.set_block(resume_from);
    }
    config.seed_registry(&registry)?;

    let engine = EpochEngine::new(registry, store, config.engine.clone());
    let scheduler = BlockScheduler::new(
        engine,
        config.subnets.clone(),
        Duration::from_millis(config.block_time_ms),
        blocks,
    );
    scheduler.run().await?;

    for subnet in &config.subnets {
        let last_epoch = scheduler.engine().store().last_epoch_block(subnet.netuid)?;
        tracing::info!(netuid = subnet.netuid, last_epoch, "Final epoch state");
    }

    tracing::info!("Subnet daemon shut down");
    Ok(())
}

/// Expand a leading `~/` to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}/{}", home.display(), rest);
        }
    }
    path.to_string()
}
