// crates/subnet-consensus/src/epoch.rs
//
// Epoch scheduling and the engine entry point.
//
// Each subnet sits in one of two states: Idle or Due. The schedule decides
// from the current block and the subnet's tempo whether an epoch should run.
// A due epoch reads the registry, runs the pipeline, and commits the new
// bonds together with the epoch marker before returning the result.

use serde::{Deserialize, Serialize};

use subnet_core::{
    EpochError, EpochOutcome, EpochParams, EpochStore, NetUid, ParticipantRegistry, WeightEntry,
};

use crate::allocation::PoolSplitPolicy;
use crate::weights::order_participants;
use crate::yuma::yuma_consensus;

/// Rule deciding whether a subnet's epoch is due at a block.
///
/// One deployment uses exactly one variant; they are not numerically
/// interchangeable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpochSchedule {
    /// Due once `tempo` blocks have elapsed since the last epoch.
    #[default]
    Elapsed,
    /// Due when `(block + netuid + 1) % (tempo + 1) == 0`, staggering subnets.
    Modular,
}

impl EpochSchedule {
    /// Whether an epoch should run at `current` given the last epoch block.
    ///
    /// Never due at block zero or at or before the last epoch, so a second
    /// call within the same block is always NotDue.
    pub fn is_due(&self, netuid: NetUid, current: u64, last: u64, tempo: u64) -> bool {
        if current == 0 || current <= last {
            return false;
        }
        match self {
            EpochSchedule::Elapsed => current - last >= tempo,
            EpochSchedule::Modular => {
                let period = tempo.saturating_add(1);
                current
                    .checked_add(u64::from(netuid))
                    .and_then(|v| v.checked_add(1))
                    .is_some_and(|v| v % period == 0)
            }
        }
    }
}

/// Deployment-wide engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub schedule: EpochSchedule,
    #[serde(default)]
    pub pool_split: PoolSplitPolicy,
}

/// The epoch engine bound to a host registry and an epoch store.
pub struct EpochEngine<R, S> {
    registry: R,
    store: S,
    config: EngineConfig,
}

impl<R, S> EpochEngine<R, S>
where
    R: ParticipantRegistry,
    S: EpochStore,
{
    pub fn new(registry: R, store: S, config: EngineConfig) -> Self {
        Self {
            registry,
            store,
            config,
        }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run the subnet's epoch if it is due at the registry's current block.
    ///
    /// Returns `NotDue` without touching any state when the schedule says so.
    /// Registry failures abort before anything is written; a persistence
    /// failure leaves the previous bonds and marker in place.
    pub fn run_epoch(&self, netuid: NetUid, emission_budget: u64) -> Result<EpochOutcome, EpochError> {
        let params = EpochParams::resolve(&self.registry.raw_params(netuid)?);
        let current = self.registry.current_block();
        let last = self.store.last_epoch_block(netuid)?;

        if !self.config.schedule.is_due(netuid, current, last, params.tempo) {
            tracing::trace!(netuid, current, last, tempo = params.tempo, "Epoch not due");
            return Ok(EpochOutcome::NotDue);
        }

        let mut participants = self.registry.participants(netuid)?;
        for participant in &mut participants {
            participant.weights = self
                .registry
                .weights(netuid, &participant.address)?
                .into_iter()
                .map(|(target, weight)| WeightEntry { target, weight })
                .collect();
        }
        let participants = order_participants(participants);
        let prior_bonds = self.store.prior_bonds(netuid)?;

        tracing::debug!(
            netuid,
            block = current,
            participants = participants.len(),
            prior_bonds = prior_bonds.len(),
            "Running epoch"
        );

        let computation = yuma_consensus(
            netuid,
            current,
            &participants,
            &prior_bonds,
            &params,
            emission_budget,
            &self.config.pool_split,
        );

        self.store
            .commit_epoch(netuid, computation.bonds.as_ref(), current)?;

        let result = computation.result;
        tracing::info!(
            netuid,
            block = current,
            participants = result.participants.len(),
            incentive_pool = result.incentive_pool,
            dividend_pool = result.dividend_pool,
            emitted = result.total_emitted(),
            malformed = result.malformed_weights,
            "Epoch completed"
        );

        Ok(EpochOutcome::Completed(Box::new(result)))
    }
}
