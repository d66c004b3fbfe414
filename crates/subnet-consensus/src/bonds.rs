// crates/subnet-consensus/src/bonds.rs
//
// Bonds stage: EMA update of the persistent bonds matrix.
//
// Bonds represent a participant's accumulated commitment to another
// participant, built up from clipped weights over epochs. Higher bonds
// toward a participant mean a higher dividend share for it.

use serde::{Deserialize, Serialize};

use subnet_core::math::{self, Fixed};
use subnet_core::EpochParams;

use crate::weights::WeightMatrix;

/// A dense bonds matrix where B[i][j] = bond participant i holds toward j.
///
/// Rows are not normalized; bonds are absolute accumulated trust.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseBonds {
    /// Dense bond matrix: bonds[from_idx][to_idx].
    pub bonds: Vec<Vec<Fixed>>,
}

impl DenseBonds {
    pub fn from_matrix(bonds: Vec<Vec<Fixed>>) -> Self {
        Self { bonds }
    }

    /// Move each bond toward the clipped weight.
    ///
    /// For each (i, j) pair:
    ///   alpha = 1 - bonds_moving_average               (fixed mode)
    ///   alpha = alpha_sigmoid(C[j], W[i][j], B[i][j])  (liquid mode)
    ///   B[i][j] = (1 - alpha) * B[i][j] + alpha * W[i][j]
    pub fn update_ema(&mut self, clipped: &WeightMatrix, consensus: &[Fixed], params: &EpochParams) {
        let fixed_alpha = params.fixed_alpha();
        for (i, row) in self.bonds.iter_mut().enumerate() {
            for (j, bond) in row.iter_mut().enumerate() {
                let weight = clipped.get(i, j);
                let alpha = if params.liquid_alpha_enabled {
                    alpha_sigmoid(consensus[j], weight, *bond, params)
                } else {
                    fixed_alpha
                };
                *bond = ema_step(*bond, weight, alpha);
            }
        }
    }

    /// Sum of each column: the total bond held toward each participant.
    pub fn column_sums(&self) -> Vec<Fixed> {
        let n = self.bonds.len();
        let mut sums = vec![Fixed::ZERO; n];
        for row in &self.bonds {
            for (acc, b) in sums.iter_mut().zip(row) {
                *acc = acc.saturating_add(*b);
            }
        }
        sums
    }
}

/// One EMA step `(1 - alpha) * prior + alpha * target`.
///
/// Computed as `prior +/- floor(alpha * |target - prior|)` and clamped
/// between `prior` and `target`, so the result is always a convex
/// combination of the two.
pub fn ema_step(prior: Fixed, target: Fixed, alpha: Fixed) -> Fixed {
    let alpha = alpha.clamp(Fixed::ZERO, Fixed::ONE);
    let (lo, hi) = if prior <= target { (prior, target) } else { (target, prior) };
    let step = math::mul_floor(alpha, hi.saturating_sub(lo));
    let next = if target >= prior {
        prior.saturating_add(step)
    } else {
        prior.saturating_sub(step)
    };
    next.clamp(lo, hi)
}

/// Per-cell liquid EMA rate.
///
/// Bonds move faster when the weight exceeds consensus (buying) or when the
/// bond overshoots the current weight (selling). The divergence is mapped
/// through a sigmoid into `[alpha_low, alpha_high]`.
pub fn alpha_sigmoid(consensus: Fixed, weight: Fixed, bond: Fixed, params: &EpochParams) -> Fixed {
    let diff_buy = weight.saturating_sub(consensus).clamp(Fixed::ZERO, Fixed::ONE);
    let diff_sell = bond.saturating_sub(weight).clamp(Fixed::ZERO, Fixed::ONE);
    let combined = if weight >= bond { diff_buy } else { diff_sell };

    let half = Fixed::ONE >> 1u32;
    let t = params
        .alpha_sigmoid_steepness
        .saturating_mul(combined - half);
    let s = math::sigmoid(t);

    let span = params.alpha_high.saturating_sub(params.alpha_low);
    params
        .alpha_low
        .saturating_add(math::mul_floor(s, span))
        .clamp(params.alpha_low, params.alpha_high)
}
