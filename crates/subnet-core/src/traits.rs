// crates/subnet-core/src/traits.rs
//
// Interfaces the host chain implements for the epoch engine.
//
// All calls are synchronous key-value style reads and writes: the engine runs
// inside a single deterministic block-processing step with no suspension
// points.

use crate::bonds::BondsMatrix;
use crate::error::EpochError;
use crate::math::Fixed;
use crate::params::RawParams;
use crate::participant::Participant;
use crate::NetUid;

/// Read-only view of subnet registrations.
///
/// Implemented by the host chain (subnet-store provides an in-memory version).
pub trait ParticipantRegistry: Send + Sync {
    /// All participants registered on the subnet. The `weights` field may be
    /// left empty; the engine fetches weights through [`Self::weights`].
    fn participants(&self, netuid: NetUid) -> Result<Vec<Participant>, EpochError>;

    /// Weights submitted by `address` on the subnet, keyed by target address.
    fn weights(&self, netuid: NetUid, address: &str) -> Result<Vec<(String, Fixed)>, EpochError>;

    /// Raw subnet configuration. Returns `SubnetNotFound` for unknown subnets.
    fn raw_params(&self, netuid: NetUid) -> Result<RawParams, EpochError>;

    /// Current block height.
    fn current_block(&self) -> u64;
}

/// Persistent epoch state: the bonds matrix and the last-epoch marker.
///
/// Implemented by subnet-store (in-memory and RocksDB backends).
pub trait EpochStore: Send + Sync {
    /// Bonds carried over from the previous epoch. Empty if none.
    fn prior_bonds(&self, netuid: NetUid) -> Result<BondsMatrix, EpochError>;

    /// Replace the subnet's bonds matrix.
    fn put_bonds(&self, netuid: NetUid, bonds: &BondsMatrix) -> Result<(), EpochError>;

    /// Block of the subnet's last completed epoch, zero if it never ran.
    fn last_epoch_block(&self, netuid: NetUid) -> Result<u64, EpochError>;

    /// Record the block of the subnet's last completed epoch.
    fn set_last_epoch_block(&self, netuid: NetUid, block: u64) -> Result<(), EpochError>;

    /// Commit the outcome of an epoch: new bonds (if any) and the epoch marker.
    ///
    /// All-or-nothing: on error neither the bonds nor the marker may have
    /// changed, so the next block recomputes from the same prior bonds.
    fn commit_epoch(&self, netuid: NetUid, bonds: Option<&BondsMatrix>, block: u64) -> Result<(), EpochError>;
}
