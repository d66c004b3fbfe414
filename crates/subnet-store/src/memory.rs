// crates/subnet-store/src/memory.rs
//
// In-memory host collaborators.
//
// `MemoryRegistry` plays the host chain's registration pallet: subnets, their
// raw parameters, participants, submitted weights, and the current block.
// `MemoryStore` keeps bonds and epoch markers per subnet behind locks so an
// epoch commit is applied as one step.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use subnet_core::{
    BondsMatrix, EpochError, EpochStore, Fixed, NetUid, Participant, ParticipantRegistry, RawParams,
    WeightEntry,
};

#[derive(Debug, Default)]
struct Subnet {
    params: RawParams,
    participants: BTreeMap<String, Participant>,
}

/// In-memory participant registry with a settable block height.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    subnets: RwLock<HashMap<NetUid, Subnet>>,
    block: AtomicU64,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<NetUid, Subnet>>, EpochError> {
        self.subnets
            .read()
            .map_err(|e| EpochError::Registry(format!("Registry lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<NetUid, Subnet>>, EpochError> {
        self.subnets
            .write()
            .map_err(|e| EpochError::Registry(format!("Registry lock poisoned: {}", e)))
    }

    /// Create a subnet, or replace the parameters of an existing one.
    pub fn add_subnet(&self, netuid: NetUid, params: RawParams) -> Result<(), EpochError> {
        self.write()?.entry(netuid).or_default().params = params;
        Ok(())
    }

    /// Set a single raw parameter on an existing subnet.
    pub fn set_param(&self, netuid: NetUid, key: &str, value: &str) -> Result<(), EpochError> {
        let mut subnets = self.write()?;
        let subnet = subnets.get_mut(&netuid).ok_or(EpochError::SubnetNotFound(netuid))?;
        subnet.params.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Ids of every registered subnet, ascending.
    pub fn subnets(&self) -> Result<Vec<NetUid>, EpochError> {
        let mut ids: Vec<NetUid> = self.read()?.keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    /// Register a participant, replacing any previous record at that address.
    pub fn register(&self, netuid: NetUid, participant: Participant) -> Result<(), EpochError> {
        let mut subnets = self.write()?;
        let subnet = subnets.get_mut(&netuid).ok_or(EpochError::SubnetNotFound(netuid))?;
        tracing::debug!(netuid, address = %participant.address, "Registered participant");
        subnet.participants.insert(participant.address.clone(), participant);
        Ok(())
    }

    /// Remove a participant. Returns the removed record, if any.
    pub fn deregister(&self, netuid: NetUid, address: &str) -> Result<Option<Participant>, EpochError> {
        let mut subnets = self.write()?;
        let subnet = subnets.get_mut(&netuid).ok_or(EpochError::SubnetNotFound(netuid))?;
        Ok(subnet.participants.remove(address))
    }

    /// Replace a participant's stake.
    pub fn set_stake(&self, netuid: NetUid, address: &str, stake: u64) -> Result<(), EpochError> {
        self.with_participant(netuid, address, |p| p.stake = stake)
    }

    /// Record a weight submission at the current block.
    ///
    /// Submitting weights also counts as activity.
    pub fn set_weights(
        &self,
        netuid: NetUid,
        address: &str,
        weights: Vec<(String, Fixed)>,
    ) -> Result<(), EpochError> {
        let block = self.current_block();
        self.with_participant(netuid, address, |p| {
            p.weights = weights
                .into_iter()
                .map(|(target, weight)| WeightEntry { target, weight })
                .collect();
            p.weights_set_block = block;
            p.last_activity_block = block;
        })
    }

    fn with_participant(
        &self,
        netuid: NetUid,
        address: &str,
        update: impl FnOnce(&mut Participant),
    ) -> Result<(), EpochError> {
        let mut subnets = self.write()?;
        let subnet = subnets.get_mut(&netuid).ok_or(EpochError::SubnetNotFound(netuid))?;
        let participant = subnet.participants.get_mut(address).ok_or_else(|| {
            EpochError::Registry(format!("No participant {} on subnet {}", address, netuid))
        })?;
        update(participant);
        Ok(())
    }

    pub fn set_block(&self, block: u64) {
        self.block.store(block, Ordering::SeqCst);
    }

    /// Advance the block height by `blocks`, returning the new height.
    pub fn advance(&self, blocks: u64) -> u64 {
        self.block.fetch_add(blocks, Ordering::SeqCst).saturating_add(blocks)
    }
}

impl ParticipantRegistry for MemoryRegistry {
    fn participants(&self, netuid: NetUid) -> Result<Vec<Participant>, EpochError> {
        let subnets = self.read()?;
        let subnet = subnets.get(&netuid).ok_or(EpochError::SubnetNotFound(netuid))?;
        Ok(subnet.participants.values().cloned().collect())
    }

    fn weights(&self, netuid: NetUid, address: &str) -> Result<Vec<(String, Fixed)>, EpochError> {
        let subnets = self.read()?;
        let subnet = subnets.get(&netuid).ok_or(EpochError::SubnetNotFound(netuid))?;
        Ok(subnet
            .participants
            .get(address)
            .map(|p| p.weights.iter().map(|w| (w.target.clone(), w.weight)).collect())
            .unwrap_or_default())
    }

    fn raw_params(&self, netuid: NetUid) -> Result<RawParams, EpochError> {
        let subnets = self.read()?;
        subnets
            .get(&netuid)
            .map(|s| s.params.clone())
            .ok_or(EpochError::SubnetNotFound(netuid))
    }

    fn current_block(&self) -> u64 {
        self.block.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct EpochState {
    bonds: HashMap<NetUid, BondsMatrix>,
    last_epoch: HashMap<NetUid, u64>,
}

/// In-memory epoch store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<EpochState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, EpochState>, EpochError> {
        self.state
            .read()
            .map_err(|e| EpochError::Persistence(format!("Store lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, EpochState>, EpochError> {
        self.state
            .write()
            .map_err(|e| EpochError::Persistence(format!("Store lock poisoned: {}", e)))
    }
}

impl EpochStore for MemoryStore {
    fn prior_bonds(&self, netuid: NetUid) -> Result<BondsMatrix, EpochError> {
        Ok(self.read()?.bonds.get(&netuid).cloned().unwrap_or_default())
    }

    fn put_bonds(&self, netuid: NetUid, bonds: &BondsMatrix) -> Result<(), EpochError> {
        self.write()?.bonds.insert(netuid, bonds.clone());
        Ok(())
    }

    fn last_epoch_block(&self, netuid: NetUid) -> Result<u64, EpochError> {
        Ok(self.read()?.last_epoch.get(&netuid).copied().unwrap_or(0))
    }

    fn set_last_epoch_block(&self, netuid: NetUid, block: u64) -> Result<(), EpochError> {
        self.write()?.last_epoch.insert(netuid, block);
        Ok(())
    }

    fn commit_epoch(&self, netuid: NetUid, bonds: Option<&BondsMatrix>, block: u64) -> Result<(), EpochError> {
        let mut state = self.write()?;
        if let Some(bonds) = bonds {
            state.bonds.insert(netuid, bonds.clone());
        }
        state.last_epoch.insert(netuid, block);
        Ok(())
    }
}
