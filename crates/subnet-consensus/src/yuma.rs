// crates/subnet-consensus/src/yuma.rs
//
// Yuma consensus for subnets.
//
// Adapts Bittensor's Yuma Consensus: the consensus score of each participant
// is the stake-weighted median of the weights directed at it, individual
// weights are clipped toward that consensus, and the clipped matrix drives
// both the bonds update and the incentive (rank) computation.

use subnet_core::math::{self, Fixed};
use subnet_core::{
    BondsMatrix, DegenerateReason, EpochParams, EpochResult, NetUid, Participant, ParticipantOutcome,
};

use crate::allocation::{self, PoolSplitPolicy};
use crate::bonds::DenseBonds;
use crate::weights::{preprocess, Preprocessed, WeightMatrix};

/// Everything one epoch run produces: the result handed to the caller and the
/// bonds matrix to persist (`None` when nobody could be scored and the prior
/// bonds stay authoritative).
#[derive(Debug, Clone, PartialEq)]
pub struct EpochComputation {
    pub result: EpochResult,
    pub bonds: Option<BondsMatrix>,
}

/// Run the pure epoch pipeline for one subnet.
///
/// `participants` must already be in matrix order (see
/// [`crate::weights::order_participants`]). No state is read or written here.
///
/// Steps:
/// 1. Preprocess: activity, active stake normalization, weight validation
/// 2. Stake-weighted median per column (consensus)
/// 3. Clip weights into `[consensus - delta, consensus + delta]`
/// 4. Ranks before and after clipping, trust, validator trust
/// 5. Bonds EMA update (fixed or liquid alpha)
/// 6. Incentive and dividend shares over active participants
/// 7. Pool split and floor payouts
pub fn yuma_consensus(
    netuid: NetUid,
    block: u64,
    participants: &[Participant],
    prior_bonds: &BondsMatrix,
    params: &EpochParams,
    emission_budget: u64,
    pool_split: &PoolSplitPolicy,
) -> EpochComputation {
    // Step 1: Preprocess
    let prep = preprocess(participants, params, block);

    if let Some(reason) = degenerate_reason(&prep) {
        tracing::warn!(netuid, block, ?reason, "Degenerate epoch, emitting all-zero result");
        // Silent voters still pull their bonds toward zero.
        let decayed = (reason == DegenerateReason::NoWeights).then(|| {
            let mut bonds = DenseBonds::from_matrix(prior_bonds.to_dense(&prep.addresses));
            bonds.update_ema(&prep.weights, &vec![Fixed::ZERO; prep.addresses.len()], params);
            bonds
        });
        return EpochComputation {
            result: degenerate_result(netuid, block, emission_budget, &prep, reason, decayed.as_ref()),
            bonds: decayed.map(|b| BondsMatrix::from_dense(&prep.addresses, &b.bonds)),
        };
    }

    // Step 2: Consensus
    let consensus = weighted_median_col(&prep.stake, &prep.weights, params.kappa);
    tracing::trace!(?consensus, "Consensus");

    // Step 3: Clipping
    let clipped = clip_weights(&prep.weights, &consensus, params.delta);

    // Step 4: Ranks and trust
    let preranks = matmul(&prep.weights, &prep.stake);
    let ranks = matmul(&clipped, &prep.stake);
    let trust: Vec<Fixed> = ranks
        .iter()
        .zip(&preranks)
        .map(|(r, p)| r.checked_div(*p).unwrap_or(Fixed::ZERO))
        .collect();
    let validator_trust = clipped.row_sums();

    // Step 5: Bonds
    let mut bonds = DenseBonds::from_matrix(prior_bonds.to_dense(&prep.addresses));
    bonds.update_ema(&clipped, &consensus, params);

    // Step 6: Shares
    let incentive_shares = allocation::active_shares(&ranks, &prep.active);
    let dividend_shares = allocation::active_shares(&bonds.column_sums(), &prep.active);

    // Step 7: Payouts
    let pools = pool_split.split(
        emission_budget,
        params.rho,
        has_mass(&incentive_shares),
        has_mass(&dividend_shares),
    );
    let incentives = allocation::payouts(&incentive_shares, pools.incentive);
    let dividends = allocation::payouts(&dividend_shares, pools.dividend);

    let outcomes = (0..prep.addresses.len())
        .map(|i| ParticipantOutcome {
            address: prep.addresses[i].clone(),
            active: prep.active[i],
            stake: prep.stake[i],
            consensus: consensus[i],
            rank: ranks[i],
            trust: trust[i],
            validator_trust: validator_trust[i],
            incentive_share: incentive_shares[i],
            dividend_share: dividend_shares[i],
            incentive: incentives[i],
            dividend: dividends[i],
            bonds: bonds.bonds[i].clone(),
        })
        .collect();

    let persisted = BondsMatrix::from_dense(&prep.addresses, &bonds.bonds);

    EpochComputation {
        result: EpochResult {
            netuid,
            block,
            emission_budget,
            incentive_pool: pools.incentive,
            dividend_pool: pools.dividend,
            malformed_weights: prep.malformed,
            degenerate: None,
            participants: outcomes,
        },
        bonds: Some(persisted),
    }
}

/// Stake-weighted median of each column of `weights`.
///
/// For column j the (weight, stake) pairs of every voter with positive stake
/// are sorted ascending by weight; the consensus is the weight at which the
/// cumulative stake first reaches `kappa` of the voters' total stake. Zero
/// when no voter holds stake.
pub fn weighted_median_col(stake: &[Fixed], weights: &WeightMatrix, kappa: Fixed) -> Vec<Fixed> {
    let n = weights.len();
    (0..n)
        .map(|j| {
            let mut pairs: Vec<(Fixed, Fixed)> = (0..n)
                .filter(|&i| stake[i] > Fixed::ZERO)
                .map(|i| (weights.get(i, j), stake[i]))
                .collect();
            weighted_median(&mut pairs, kappa)
        })
        .collect()
}

/// Weighted median of `(value, weight)` pairs at quantile `kappa`.
pub fn weighted_median(pairs: &mut [(Fixed, Fixed)], kappa: Fixed) -> Fixed {
    let total = pairs
        .iter()
        .fold(Fixed::ZERO, |acc, (_, s)| acc.saturating_add(*s));
    if total <= Fixed::ZERO {
        return Fixed::ZERO;
    }
    let threshold = math::mul_floor(kappa, total);

    // Stable sort: equal weights keep participant order.
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let mut cumulative = Fixed::ZERO;
    for (value, s) in pairs.iter() {
        cumulative = cumulative.saturating_add(*s);
        if cumulative >= threshold {
            return *value;
        }
    }
    Fixed::ZERO
}

/// Clamp each weight into `[consensus[j] - delta, consensus[j] + delta]`.
///
/// Rows without any weight stay all-zero so non-voters never gain weight.
pub fn clip_weights(weights: &WeightMatrix, consensus: &[Fixed], delta: Fixed) -> WeightMatrix {
    let mut clipped = weights.clone();
    for (i, row) in clipped.weights.iter_mut().enumerate() {
        if !weights.row_has_weights(i) {
            continue;
        }
        for (w, c) in row.iter_mut().zip(consensus) {
            let lo = c.saturating_sub(delta);
            let hi = c.saturating_add(delta);
            *w = (*w).clamp(lo, hi);
        }
    }
    clipped
}

/// Stake-weighted column sums: `out[j] = SUM(i) W[i][j] * stake[i]`.
pub fn matmul(weights: &WeightMatrix, stake: &[Fixed]) -> Vec<Fixed> {
    let n = weights.len();
    let mut out = vec![Fixed::ZERO; n];
    for (row, &s) in weights.weights.iter().zip(stake) {
        if s <= Fixed::ZERO {
            continue;
        }
        for (acc, &w) in out.iter_mut().zip(row) {
            *acc = acc.saturating_add(math::mul_floor(w, s));
        }
    }
    out
}

fn has_mass(values: &[Fixed]) -> bool {
    values.iter().any(|v| *v > Fixed::ZERO)
}

fn degenerate_reason(prep: &Preprocessed) -> Option<DegenerateReason> {
    if prep.addresses.is_empty() {
        Some(DegenerateReason::NoParticipants)
    } else if !prep.active.iter().any(|a| *a) {
        Some(DegenerateReason::NoActiveParticipants)
    } else if !has_mass(&prep.stake) {
        Some(DegenerateReason::ZeroActiveStake)
    } else if !prep.weights.has_weights() {
        Some(DegenerateReason::NoWeights)
    } else {
        None
    }
}

fn degenerate_result(
    netuid: NetUid,
    block: u64,
    emission_budget: u64,
    prep: &Preprocessed,
    reason: DegenerateReason,
    bonds: Option<&DenseBonds>,
) -> EpochResult {
    let n = prep.addresses.len();
    let participants = (0..n)
        .map(|i| ParticipantOutcome {
            address: prep.addresses[i].clone(),
            active: prep.active[i],
            stake: prep.stake[i],
            consensus: Fixed::ZERO,
            rank: Fixed::ZERO,
            trust: Fixed::ZERO,
            validator_trust: Fixed::ZERO,
            incentive_share: Fixed::ZERO,
            dividend_share: Fixed::ZERO,
            incentive: 0,
            dividend: 0,
            bonds: bonds.map_or_else(|| vec![Fixed::ZERO; n], |b| b.bonds[i].clone()),
        })
        .collect();

    EpochResult {
        netuid,
        block,
        emission_budget,
        incentive_pool: 0,
        dividend_pool: 0,
        malformed_weights: prep.malformed,
        degenerate: Some(reason),
        participants,
    }
}
