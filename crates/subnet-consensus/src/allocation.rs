// crates/subnet-consensus/src/allocation.rs
//
// Allocation stage: turns incentive and dividend shares into integer payouts.
//
// The epoch emission budget is split as follows:
//   1. The pool split policy divides the budget into an incentive pool and a
//      dividend pool. If one side has no mass the other side takes it all.
//   2. Individual incentives are floor(incentive_share * incentive_pool).
//   3. Individual dividends are floor(dividend_share * dividend_pool).
//
// Flooring means a few units of the budget may remain undistributed; they
// are never borrowed across participants or pools.

use serde::{Deserialize, Serialize};

use subnet_core::math::{self, Fixed};

/// How the emission budget is divided between the two pools.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum PoolSplitPolicy {
    /// Incentive pool is `floor(rho * budget)`; dividends take the remainder.
    #[default]
    Rho,
    /// Incentive pool is a fixed configured fraction of the budget.
    Fraction { incentive: Fixed },
}

/// Budget assigned to each pool for one epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pools {
    pub incentive: u64,
    pub dividend: u64,
}

impl PoolSplitPolicy {
    /// Divide `budget` between the pools.
    ///
    /// `has_incentive` / `has_dividend` report whether the respective share
    /// vector carries any mass; an empty side cedes its pool to the other.
    pub fn split(&self, budget: u64, rho: Fixed, has_incentive: bool, has_dividend: bool) -> Pools {
        match (has_incentive, has_dividend) {
            (false, false) => Pools::default(),
            (true, false) => Pools {
                incentive: budget,
                dividend: 0,
            },
            (false, true) => Pools {
                incentive: 0,
                dividend: budget,
            },
            (true, true) => {
                let share = match self {
                    PoolSplitPolicy::Rho => rho,
                    PoolSplitPolicy::Fraction { incentive } => *incentive,
                };
                let incentive = math::mul_floor_int(share.clamp(Fixed::ZERO, Fixed::ONE), budget);
                Pools {
                    incentive,
                    dividend: budget - incentive,
                }
            }
        }
    }
}

/// Mask `raw` to active participants and normalize it to sum to 1.0.
///
/// All zeros when no active participant has positive mass.
pub fn active_shares(raw: &[Fixed], active: &[bool]) -> Vec<Fixed> {
    let mut shares: Vec<Fixed> = raw.iter().map(|v| (*v).max(Fixed::ZERO)).collect();
    math::inplace_mask(&mut shares, active);
    math::inplace_normalize(&mut shares);
    shares
}

/// Integer payouts `floor(share * pool)`, never exceeding `pool` in total.
pub fn payouts(shares: &[Fixed], pool: u64) -> Vec<u64> {
    let mut remaining = pool;
    shares
        .iter()
        .map(|share| {
            let amount = math::mul_floor_int(*share, pool).min(remaining);
            remaining -= amount;
            amount
        })
        .collect()
}
