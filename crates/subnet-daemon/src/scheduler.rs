// crates/subnet-daemon/src/scheduler.rs
//
// Block scheduler for the subnet daemon.
//
// Simulates block progression at the configured interval and invokes the
// epoch engine for every configured subnet on every block, the way a host
// chain's per-block hook would. Participants resubmit their configured
// weights after each completed epoch so they stay active.

use std::time::Duration;

use subnet_consensus::EpochEngine;
use subnet_core::{EpochError, EpochOutcome, EpochStore, NetUid};
use subnet_store::MemoryRegistry;

use crate::config::SubnetConfig;

/// Drives one engine over a fixed set of subnets.
pub struct BlockScheduler<S> {
    engine: EpochEngine<MemoryRegistry, S>,
    subnets: Vec<SubnetConfig>,
    block_time: Duration,
    /// Stop after this many blocks; run until Ctrl-C when unset.
    max_blocks: Option<u64>,
}

impl<S: EpochStore> BlockScheduler<S> {
    pub fn new(
        engine: EpochEngine<MemoryRegistry, S>,
        subnets: Vec<SubnetConfig>,
        block_time: Duration,
        max_blocks: Option<u64>,
    ) -> Self {
        Self {
            engine,
            subnets,
            block_time,
            max_blocks,
        }
    }

    pub fn engine(&self) -> &EpochEngine<MemoryRegistry, S> {
        &self.engine
    }

    /// Run the scheduler loop, advancing one block per interval.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        tracing::info!(
            subnets = self.subnets.len(),
            block_time_ms = self.block_time.as_millis() as u64,
            "Block scheduler started"
        );

        let mut produced = 0u64;
        loop {
            if self.max_blocks.is_some_and(|max| produced >= max) {
                tracing::info!(blocks = produced, "Block limit reached");
                break;
            }
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Block scheduler received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(self.block_time) => {
                    self.process_block();
                    produced += 1;
                }
            }
        }

        Ok(())
    }

    /// Advance the chain by one block and give every subnet its epoch hook.
    ///
    /// Failures are logged and retried naturally on the next block.
    pub fn process_block(&self) -> Vec<(NetUid, Result<EpochOutcome, EpochError>)> {
        let block = self.engine.registry().advance(1);
        tracing::trace!(block, "Block");

        self.subnets
            .iter()
            .map(|subnet| {
                let netuid = subnet.netuid;
                let outcome = self.engine.run_epoch(netuid, subnet.emission);
                match &outcome {
                    Ok(EpochOutcome::Completed(result)) => {
                        if let Err(e) = subnet.submit_weights(self.engine.registry()) {
                            tracing::warn!(netuid, block, error = %e, "Weight resubmission failed");
                        }
                        for p in &result.participants {
                            tracing::debug!(
                                netuid,
                                address = %p.address,
                                consensus = %p.consensus,
                                incentive = p.incentive,
                                dividend = p.dividend,
                                "Epoch payout"
                            );
                        }
                    }
                    Ok(EpochOutcome::NotDue) => {}
                    Err(e) => tracing::error!(netuid, block, error = %e, "Epoch failed"),
                }
                (netuid, outcome)
            })
            .collect()
    }
}
