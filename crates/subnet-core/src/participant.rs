// crates/subnet-core/src/participant.rs

use serde::{Deserialize, Serialize};

use crate::math::Fixed;

/// One weight submitted by a participant: how much it rates `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightEntry {
    /// Address of the rated participant.
    pub target: String,
    /// Submitted weight. Not trusted to be normalized or non-negative.
    pub weight: Fixed,
}

impl WeightEntry {
    pub fn new(target: impl Into<String>, weight: Fixed) -> Self {
        Self {
            target: target.into(),
            weight,
        }
    }
}

/// A registered participant of a subnet, as seen by one epoch run.
///
/// Analogous to a neuron in a Bittensor metagraph. The engine orders
/// participants by address, so matrix indices are positional within a run
/// and must never be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Unique chain account address.
    pub address: String,
    /// Raw stake in the smallest denomination.
    pub stake: u64,
    /// Block of the participant's last observed activity.
    #[serde(default)]
    pub last_activity_block: u64,
    /// Block at which the participant registered on the subnet.
    #[serde(default)]
    pub registration_block: u64,
    /// Block of the participant's last weight submission.
    #[serde(default)]
    pub weights_set_block: u64,
    /// Submitted weight vector, keyed by target address.
    #[serde(default)]
    pub weights: Vec<WeightEntry>,
}

impl Participant {
    /// Create a participant with the given stake, registered and active at block 0.
    pub fn new(address: impl Into<String>, stake: u64) -> Self {
        Self {
            address: address.into(),
            stake,
            last_activity_block: 0,
            registration_block: 0,
            weights_set_block: 0,
            weights: Vec::new(),
        }
    }

    /// Whether the participant is still inside its post-registration immunity window.
    pub fn is_immune(&self, current_block: u64, immunity_period: u64) -> bool {
        current_block.saturating_sub(self.registration_block) < immunity_period
    }

    /// Whether the participant counts as active at `current_block`.
    ///
    /// Active if it was seen within `activity_cutoff` blocks, or if it is
    /// immune (immunity always implies activity).
    pub fn is_active(&self, current_block: u64, activity_cutoff: u64, immunity_period: u64) -> bool {
        current_block.saturating_sub(self.last_activity_block) <= activity_cutoff
            || self.is_immune(current_block, immunity_period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_activity_is_active() {
        let mut p = Participant::new("alice", 10);
        p.registration_block = 0;
        p.last_activity_block = 900;
        assert!(p.is_active(1_000, 100, 0));
        assert!(!p.is_active(1_001, 100, 0));
    }

    #[test]
    fn test_immunity_implies_active() {
        let mut p = Participant::new("bob", 10);
        p.registration_block = 950;
        p.last_activity_block = 0;
        assert!(p.is_immune(1_000, 100));
        assert!(p.is_active(1_000, 10, 100));
        assert!(!p.is_active(1_050, 10, 100));
    }

    #[test]
    fn test_future_activity_block_saturates() {
        let mut p = Participant::new("carol", 10);
        p.last_activity_block = 2_000;
        assert!(p.is_active(1_000, 0, 0));
    }
}
