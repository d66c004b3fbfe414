// crates/subnet-core/src/result.rs

use serde::{Deserialize, Serialize};

use crate::math::Fixed;
use crate::NetUid;

/// Why an epoch produced an all-zero result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegenerateReason {
    /// The subnet has no registered participants.
    NoParticipants,
    /// No participant is active.
    NoActiveParticipants,
    /// Active participants hold no stake.
    ZeroActiveStake,
    /// No non-zero weight survived validation.
    NoWeights,
}

/// Per-participant output of one epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantOutcome {
    /// Participant address.
    pub address: String,
    /// Whether the participant counted as active this epoch.
    pub active: bool,
    /// Normalized active stake.
    pub stake: Fixed,
    /// Stake-weighted median of the weights directed at this participant.
    pub consensus: Fixed,
    /// Stake-weighted sum of clipped weights directed at this participant.
    pub rank: Fixed,
    /// Rank after clipping divided by rank before clipping.
    pub trust: Fixed,
    /// Sum of this participant's clipped outgoing weights.
    pub validator_trust: Fixed,
    /// Normalized incentive share.
    pub incentive_share: Fixed,
    /// Normalized dividend share.
    pub dividend_share: Fixed,
    /// Incentive payout in the smallest denomination.
    pub incentive: u64,
    /// Dividend payout in the smallest denomination.
    pub dividend: u64,
    /// This participant's row of the updated bonds matrix, in result order.
    pub bonds: Vec<Fixed>,
}

impl ParticipantOutcome {
    /// Total payout for this participant.
    pub fn emission(&self) -> u64 {
        self.incentive.saturating_add(self.dividend)
    }
}

/// Output of one completed epoch run for a subnet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochResult {
    /// Subnet the epoch ran for.
    pub netuid: NetUid,
    /// Block height at which the epoch ran.
    pub block: u64,
    /// Emission budget supplied by the caller.
    pub emission_budget: u64,
    /// Portion of the budget assigned to the incentive pool.
    pub incentive_pool: u64,
    /// Portion of the budget assigned to the dividend pool.
    pub dividend_pool: u64,
    /// Weight entries dropped or clamped during validation.
    pub malformed_weights: usize,
    /// Set when the epoch short-circuited to an all-zero result.
    pub degenerate: Option<DegenerateReason>,
    /// One record per participant, ordered by address.
    pub participants: Vec<ParticipantOutcome>,
}

impl EpochResult {
    /// Sum of every incentive and dividend payout.
    pub fn total_emitted(&self) -> u64 {
        self.participants
            .iter()
            .fold(0_u64, |acc, p| acc.saturating_add(p.emission()))
    }

    pub fn is_degenerate(&self) -> bool {
        self.degenerate.is_some()
    }

    /// Look up a participant's record by address.
    pub fn participant(&self, address: &str) -> Option<&ParticipantOutcome> {
        self.participants.iter().find(|p| p.address == address)
    }
}

/// What `run_epoch` did for a subnet at the current block.
#[derive(Debug, Clone, PartialEq)]
pub enum EpochOutcome {
    /// The subnet is not due this block. A normal, frequent outcome.
    NotDue,
    /// The epoch ran and its state was committed.
    Completed(Box<EpochResult>),
}

impl EpochOutcome {
    pub fn is_due(&self) -> bool {
        matches!(self, EpochOutcome::Completed(_))
    }

    /// The completed result, if the epoch ran.
    pub fn into_result(self) -> Option<EpochResult> {
        match self {
            EpochOutcome::Completed(result) => Some(*result),
            EpochOutcome::NotDue => None,
        }
    }
}
