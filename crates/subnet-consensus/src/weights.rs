// crates/subnet-consensus/src/weights.rs
//
// Preprocessing stage: activity, stake normalization, and weight validation.
//
// The weight matrix W[i][j] stores the weight participant i assigns to
// participant j for the current epoch. Raw submissions are untrusted: unknown
// targets are dropped, negative weights clamped, and every row is validated
// against the subnet limits before being normalized to sum to 1.0.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use subnet_core::math::{self, Fixed};
use subnet_core::{EpochParams, Participant};

/// A dense square weight matrix where W[i][j] = weight i assigns to j.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightMatrix {
    /// Dense weight matrix: weights[from_idx][to_idx].
    pub weights: Vec<Vec<Fixed>>,
}

impl WeightMatrix {
    /// Create a new zero-initialized `n x n` weight matrix.
    pub fn new(n: usize) -> Self {
        Self {
            weights: vec![vec![Fixed::ZERO; n]; n],
        }
    }

    /// Number of participants (rows).
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Set the weight participant `i` assigns to `j`.
    pub fn set(&mut self, i: usize, j: usize, w: Fixed) {
        self.weights[i][j] = w;
    }

    /// Get the weight participant `i` assigns to `j`.
    pub fn get(&self, i: usize, j: usize) -> Fixed {
        self.weights[i][j]
    }

    /// Whether row `i` carries at least one non-zero weight.
    pub fn row_has_weights(&self, i: usize) -> bool {
        self.weights[i].iter().any(|w| *w != Fixed::ZERO)
    }

    /// Whether any row carries a non-zero weight.
    pub fn has_weights(&self) -> bool {
        (0..self.len()).any(|i| self.row_has_weights(i))
    }

    /// Sum of each row.
    pub fn row_sums(&self) -> Vec<Fixed> {
        self.weights.iter().map(|row| math::sum(row)).collect()
    }

    /// Normalize each row to sum to 1.0.
    ///
    /// A row that sums to zero remains all zeros (the participant
    /// submitted no usable weights this epoch).
    pub fn normalize(&mut self) {
        for row in &mut self.weights {
            math::inplace_normalize(row);
        }
    }
}

/// Output of the preprocessing stage, indexed by participant position.
#[derive(Debug, Clone)]
pub struct Preprocessed {
    /// Participant addresses in matrix order.
    pub addresses: Vec<String>,
    /// Activity flag per participant.
    pub active: Vec<bool>,
    /// Stake normalized over active participants; zero for inactive ones.
    pub stake: Vec<Fixed>,
    /// Validated, row-normalized weights.
    pub weights: WeightMatrix,
    /// Weight entries dropped or clamped as malformed.
    pub malformed: usize,
}

/// Sort participants by address and drop duplicate addresses.
///
/// Matrix indices are positional, so every node must see the same order.
/// The first record for a duplicated address wins.
pub fn order_participants(mut participants: Vec<Participant>) -> Vec<Participant> {
    participants.sort_by(|a, b| a.address.cmp(&b.address));
    let before = participants.len();
    participants.dedup_by(|later, earlier| later.address == earlier.address);
    if participants.len() != before {
        tracing::warn!(
            dropped = before - participants.len(),
            "Dropped participants with duplicate addresses"
        );
    }
    participants
}

/// Run the preprocessing stage over participants already in matrix order.
pub fn preprocess(participants: &[Participant], params: &EpochParams, current_block: u64) -> Preprocessed {
    let n = participants.len();
    let addresses: Vec<String> = participants.iter().map(|p| p.address.clone()).collect();

    let active: Vec<bool> = participants
        .iter()
        .map(|p| p.is_active(current_block, params.activity_cutoff, params.immunity_period))
        .collect();

    let stake = normalize_active_stake(participants, &active);

    let index: HashMap<&str, usize> = addresses
        .iter()
        .enumerate()
        .map(|(i, a)| (a.as_str(), i))
        .collect();

    let mut weights = WeightMatrix::new(n);
    let mut malformed = 0;

    for (i, participant) in participants.iter().enumerate() {
        if !active[i] {
            continue;
        }

        let mut row = vec![Fixed::ZERO; n];
        for entry in &participant.weights {
            let Some(&j) = index.get(entry.target.as_str()) else {
                malformed += 1;
                continue;
            };
            if entry.weight < Fixed::ZERO {
                malformed += 1;
                continue;
            }
            // Weights set before the target registered point at a previous occupant.
            if participant.weights_set_block < participants[j].registration_block {
                continue;
            }
            row[j] = row[j].saturating_add(entry.weight);
        }

        validate_row(&mut row, participant, params, current_block);
        weights.weights[i] = row;
    }

    weights.normalize();

    tracing::trace!(
        participants = n,
        active = active.iter().filter(|a| **a).count(),
        malformed,
        "Preprocessed weights"
    );

    Preprocessed {
        addresses,
        active,
        stake,
        weights,
        malformed,
    }
}

/// Stake divided by the total active stake; zero for inactive participants.
///
/// If active stake sums to zero every entry is zero.
pub fn normalize_active_stake(participants: &[Participant], active: &[bool]) -> Vec<Fixed> {
    let total: u128 = participants
        .iter()
        .zip(active)
        .filter(|(_, a)| **a)
        .map(|(p, _)| u128::from(p.stake))
        .sum();

    participants
        .iter()
        .zip(active)
        .map(|(p, &a)| if a { math::fraction(p.stake, total) } else { Fixed::ZERO })
        .collect()
}

/// Apply the per-row limits in order: truncation to `max_weights_limit`,
/// the `min_allowed_weights` floor, then the submission rate limit.
pub fn validate_row(row: &mut [Fixed], participant: &Participant, params: &EpochParams, current_block: u64) {
    let mut nonzero: Vec<(usize, Fixed)> = row
        .iter()
        .enumerate()
        .filter(|(_, w)| **w > Fixed::ZERO)
        .map(|(j, w)| (j, *w))
        .collect();

    let limit = params.max_weights_limit as usize;
    if nonzero.len() > limit {
        // Highest weights first; ties keep the lower index.
        nonzero.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        for &(j, _) in &nonzero[limit..] {
            row[j] = Fixed::ZERO;
        }
        nonzero.truncate(limit);
    }

    if !nonzero.is_empty() && nonzero.len() < params.min_allowed_weights as usize {
        tracing::trace!(
            address = %participant.address,
            count = nonzero.len(),
            min = params.min_allowed_weights,
            "Row below min_allowed_weights"
        );
        row.iter_mut().for_each(|w| *w = Fixed::ZERO);
        return;
    }

    if current_block.saturating_sub(participant.weights_set_block) < params.weights_set_rate_limit {
        tracing::trace!(
            address = %participant.address,
            weights_set_block = participant.weights_set_block,
            "Row rate limited"
        );
        row.iter_mut().for_each(|w| *w = Fixed::ZERO);
    }
}
