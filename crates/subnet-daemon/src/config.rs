// crates/subnet-daemon/src/config.rs
//
// Runtime configuration for the subnet daemon.
// Loaded from a TOML file or populated with sensible defaults.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;

use subnet_consensus::EngineConfig;
use subnet_core::{EpochError, Fixed, NetUid, Participant, RawParams};
use subnet_store::MemoryRegistry;

/// Backend holding bonds and epoch markers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Rocksdb,
    Memory,
}

/// Runtime configuration for the daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    /// Log level used when RUST_LOG is unset: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory for local data storage (RocksDB).
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default)]
    pub storage: StorageBackend,

    /// Simulated block interval in milliseconds.
    #[serde(default = "default_block_time_ms")]
    pub block_time_ms: u64,

    /// Epoch schedule and pool split policy.
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub subnets: Vec<SubnetConfig>,
}

/// One subnet registered at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct SubnetConfig {
    pub netuid: NetUid,

    /// Emission budget handed to each epoch, in the smallest denomination.
    #[serde(default = "default_emission")]
    pub emission: u64,

    /// Raw epoch parameters. Strings, integers, floats and booleans are accepted.
    #[serde(default)]
    pub params: BTreeMap<String, toml::Value>,

    #[serde(default)]
    pub participants: Vec<ParticipantConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParticipantConfig {
    pub address: String,
    pub stake: u64,
    #[serde(default)]
    pub registration_block: u64,
    /// Target address -> weight (decimal string or number).
    #[serde(default)]
    pub weights: BTreeMap<String, toml::Value>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> String {
    "~/.subnet/data".to_string()
}

fn default_block_time_ms() -> u64 {
    1_000
}

fn default_emission() -> u64 {
    1_000_000_000
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_dir: default_data_dir(),
            storage: StorageBackend::default(),
            block_time_ms: default_block_time_ms(),
            engine: EngineConfig::default(),
            subnets: Vec::new(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from a TOML file at the given path.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let config: DaemonConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Register every configured subnet, participant and weight vector.
    pub fn seed_registry(&self, registry: &MemoryRegistry) -> Result<(), EpochError> {
        for subnet in &self.subnets {
            let raw: RawParams = subnet
                .params
                .iter()
                .filter_map(|(key, value)| match raw_value(value) {
                    Some(v) => Some((key.clone(), v)),
                    None => {
                        tracing::warn!(netuid = subnet.netuid, key = %key, "Ignoring non-scalar epoch parameter");
                        None
                    }
                })
                .collect();
            registry.add_subnet(subnet.netuid, raw)?;

            for p in &subnet.participants {
                let mut participant = Participant::new(p.address.clone(), p.stake);
                participant.registration_block = p.registration_block;
                registry.register(subnet.netuid, participant)?;
            }
            subnet.submit_weights(registry)?;

            tracing::info!(
                netuid = subnet.netuid,
                participants = subnet.participants.len(),
                emission = subnet.emission,
                "Registered subnet"
            );
        }
        Ok(())
    }
}

impl SubnetConfig {
    /// Submit every participant's configured weights at the registry's
    /// current block, which also marks the participant active.
    pub fn submit_weights(&self, registry: &MemoryRegistry) -> Result<(), EpochError> {
        for p in &self.participants {
            let weights = p
                .weights
                .iter()
                .filter_map(|(target, value)| {
                    match raw_value(value).and_then(|v| v.parse::<Fixed>().ok()) {
                        Some(w) => Some((target.clone(), w)),
                        None => {
                            tracing::warn!(address = %p.address, target = %target, "Ignoring unparseable weight");
                            None
                        }
                    }
                })
                .collect();
            registry.set_weights(self.netuid, &p.address, weights)?;
        }
        Ok(())
    }
}

/// Render a scalar TOML value as the decimal string the resolver expects.
fn raw_value(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}
