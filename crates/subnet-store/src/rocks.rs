// crates/subnet-store/src/rocks.rs
//
// RocksDB-backed persistent storage for epoch state.
//
// Key format:
//   - Bonds:  `bonds:{netuid}:{from_len}:{from}:{to}` -> JSON-serialized BondRecord
//   - Marker: `epoch:{netuid}`             -> JSON-serialized u64
//
// Zero bonds are never written; a missing key means a zero bond. The byte
// length of `from` keeps keys unique when addresses contain `:`. Addresses
// are kept in the value so keys never need to be parsed back.

use rocksdb::{DBWithThreadMode, MultiThreaded, Options, WriteBatch};
use serde::{Deserialize, Serialize};

use subnet_core::{BondsMatrix, EpochError, EpochStore, Fixed, NetUid};

#[derive(Debug, Serialize, Deserialize)]
struct BondRecord {
    from: String,
    to: String,
    value: Fixed,
}

/// RocksDB wrapper implementing the `EpochStore` trait.
#[derive(Debug)]
pub struct RocksStore {
    db: DBWithThreadMode<MultiThreaded>,
}

impl RocksStore {
    /// Open a RocksDB database at the given filesystem path.
    ///
    /// Creates the database directory if it does not exist.
    pub fn open(path: &str) -> Result<Self, EpochError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DBWithThreadMode::<MultiThreaded>::open(&opts, path).map_err(|e| {
            EpochError::Persistence(format!("Failed to open RocksDB at {}: {}", path, e))
        })?;

        Ok(Self { db })
    }

    /// Prefix shared by every bond of a subnet: `bonds:{netuid}:`.
    fn bonds_prefix(netuid: NetUid) -> Vec<u8> {
        format!("bonds:{}:", netuid).into_bytes()
    }

    fn bond_key(netuid: NetUid, from: &str, to: &str) -> Vec<u8> {
        format!("bonds:{}:{}:{}:{}", netuid, from.len(), from, to).into_bytes()
    }

    fn epoch_key(netuid: NetUid) -> Vec<u8> {
        format!("epoch:{}", netuid).into_bytes()
    }

    /// Get raw bytes from RocksDB, mapping errors to EpochError::Persistence.
    fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>, EpochError> {
        self.db
            .get(key)
            .map_err(|e| EpochError::Persistence(format!("RocksDB get failed: {}", e)))
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<(), EpochError> {
        self.db
            .write(batch)
            .map_err(|e| EpochError::Persistence(format!("RocksDB write failed: {}", e)))
    }

    /// Every stored bond key of a subnet.
    fn bond_keys(&self, netuid: NetUid) -> Result<Vec<Box<[u8]>>, EpochError> {
        let prefix = Self::bonds_prefix(netuid);
        let mut keys = Vec::new();
        for item in self.db.prefix_iterator(&prefix) {
            let (key, _value) = item
                .map_err(|e| EpochError::Persistence(format!("RocksDB iteration error: {}", e)))?;
            // Stop when the prefix no longer matches.
            if !key.starts_with(&prefix) {
                break;
            }
            keys.push(key);
        }
        Ok(keys)
    }

    /// Stage a full replacement of the subnet's bonds into `batch`.
    fn stage_bonds(&self, batch: &mut WriteBatch, netuid: NetUid, bonds: &BondsMatrix) -> Result<(), EpochError> {
        for key in self.bond_keys(netuid)? {
            batch.delete(key);
        }
        for (from, to, value) in bonds.iter() {
            let record = BondRecord {
                from: from.to_string(),
                to: to.to_string(),
                value,
            };
            batch.put(Self::bond_key(netuid, from, to), serde_json::to_vec(&record)?);
        }
        Ok(())
    }
}

impl EpochStore for RocksStore {
    fn prior_bonds(&self, netuid: NetUid) -> Result<BondsMatrix, EpochError> {
        let prefix = Self::bonds_prefix(netuid);
        let mut bonds = BondsMatrix::new();
        for item in self.db.prefix_iterator(&prefix) {
            let (key, value) = item
                .map_err(|e| EpochError::Persistence(format!("RocksDB iteration error: {}", e)))?;
            if !key.starts_with(&prefix) {
                break;
            }
            let record: BondRecord = serde_json::from_slice(&value)?;
            bonds.set(record.from, record.to, record.value);
        }
        Ok(bonds)
    }

    fn put_bonds(&self, netuid: NetUid, bonds: &BondsMatrix) -> Result<(), EpochError> {
        let mut batch = WriteBatch::default();
        self.stage_bonds(&mut batch, netuid, bonds)?;
        self.write_batch(batch)
    }

    fn last_epoch_block(&self, netuid: NetUid) -> Result<u64, EpochError> {
        match self.get_raw(&Self::epoch_key(netuid))? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(0),
        }
    }

    fn set_last_epoch_block(&self, netuid: NetUid, block: u64) -> Result<(), EpochError> {
        let mut batch = WriteBatch::default();
        batch.put(Self::epoch_key(netuid), serde_json::to_vec(&block)?);
        self.write_batch(batch)
    }

    /// Bonds replacement and marker update land in one write batch.
    fn commit_epoch(&self, netuid: NetUid, bonds: Option<&BondsMatrix>, block: u64) -> Result<(), EpochError> {
        let mut batch = WriteBatch::default();
        if let Some(bonds) = bonds {
            self.stage_bonds(&mut batch, netuid, bonds)?;
        }
        batch.put(Self::epoch_key(netuid), serde_json::to_vec(&block)?);
        self.write_batch(batch)?;
        tracing::debug!(netuid, block, bonds = ?bonds.map(|b| b.len()), "Committed epoch state");
        Ok(())
    }
}
