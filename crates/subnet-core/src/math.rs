// crates/subnet-core/src/math.rs
//
// Deterministic fixed-point arithmetic for the epoch engine.
//
// Every validating node must compute bit-identical results, so the engine
// never touches native floating point. Values are I64F64 (64 integer bits,
// 64 fractional bits) and every rounding step below is a floor on the raw
// 128-bit representation.

use fixed::types::I64F64;

/// The engine's real-number type.
pub type Fixed = I64F64;

/// Number of fractional bits in [`Fixed`].
const FRAC_BITS: u32 = 64;

/// `exp` saturates its input to `[-EXP_LIMIT, EXP_LIMIT]`.
/// `e^40` (~2.35e17) still fits comfortably in the 63 integer bits.
const EXP_LIMIT: Fixed = Fixed::from_bits(40_i128 << FRAC_BITS);

/// Upper bound on Taylor terms for `e^r` with `|r| <= ln(2)/2`.
/// The series reaches one ULP well before this.
pub const EXP_TAYLOR_TERMS: u32 = 32;

/// `part / whole` rounded down, computed on integers.
///
/// Returns zero when `whole` is zero and one when `part >= whole`.
pub fn fraction(part: u64, whole: u128) -> Fixed {
    if whole == 0 {
        return Fixed::ZERO;
    }
    let part = u128::from(part);
    if part >= whole {
        return Fixed::ONE;
    }
    // part < 2^64, so the shift cannot overflow; the quotient is < 2^64.
    let bits = (part << FRAC_BITS) / whole;
    Fixed::from_bits(bits as i128)
}

/// Floor of `a * b` for non-negative operands, saturating at `Fixed::MAX`.
///
/// Negative operands are treated as zero.
pub fn mul_floor(a: Fixed, b: Fixed) -> Fixed {
    if a <= Fixed::ZERO || b <= Fixed::ZERO {
        return Fixed::ZERO;
    }
    let (a_bits, b_bits) = (a.to_bits() as u128, b.to_bits() as u128);
    let mask = (1_u128 << FRAC_BITS) - 1;
    let (a_hi, a_lo) = (a_bits >> FRAC_BITS, a_bits & mask);
    let (b_hi, b_lo) = (b_bits >> FRAC_BITS, b_bits & mask);

    // (a_hi*2^64 + a_lo)(b_hi*2^64 + b_lo) / 2^64; only the low*low term
    // carries a fractional remainder, which is dropped.
    let product = a_hi
        .checked_mul(b_hi)
        .and_then(|hh| hh.checked_shl(FRAC_BITS).filter(|v| v >> FRAC_BITS == hh))
        .and_then(|hh| hh.checked_add(a_hi * b_lo))
        .and_then(|acc| acc.checked_add(a_lo * b_hi))
        .and_then(|acc| acc.checked_add((a_lo * b_lo) >> FRAC_BITS));

    match product {
        Some(bits) if bits <= i128::MAX as u128 => Fixed::from_bits(bits as i128),
        _ => Fixed::MAX,
    }
}

/// Floor of `share * amount` as an integer, saturating at `u64::MAX`.
///
/// Negative shares yield zero.
pub fn mul_floor_int(share: Fixed, amount: u64) -> u64 {
    if share <= Fixed::ZERO || amount == 0 {
        return 0;
    }
    let bits = share.to_bits() as u128;
    let int_part = bits >> FRAC_BITS;
    let frac_part = bits & ((1_u128 << FRAC_BITS) - 1);
    let amount = u128::from(amount);

    // int_part < 2^63 and frac_part < 2^64, so neither product overflows.
    let whole = int_part * amount;
    let partial = (frac_part * amount) >> FRAC_BITS;
    u64::try_from(whole.saturating_add(partial)).unwrap_or(u64::MAX)
}

/// Deterministic `e^x`.
///
/// Range reduction `x = k*ln(2) + r` with `k = round(x / ln(2))`, a Taylor
/// series for `e^r` truncated after [`EXP_TAYLOR_TERMS`] terms or the first
/// term that rounds to zero, then scaling by `2^k` with shifts.
pub fn exp(x: Fixed) -> Fixed {
    let x = x.clamp(-EXP_LIMIT, EXP_LIMIT);
    let ln2 = Fixed::LN_2;

    let k: i32 = (x / ln2).round().to_num();
    let r = x - ln2 * Fixed::from_num(k);

    let mut term = Fixed::ONE;
    let mut sum = Fixed::ONE;
    for n in 1..=EXP_TAYLOR_TERMS {
        term = term * r / Fixed::from_num(n);
        if term == Fixed::ZERO {
            break;
        }
        sum += term;
    }

    if k >= 0 {
        sum << k.unsigned_abs()
    } else {
        sum >> k.unsigned_abs()
    }
}

/// Logistic function `1 / (1 + e^-t)`, always within `[0, 1]`.
pub fn sigmoid(t: Fixed) -> Fixed {
    let denominator = Fixed::ONE + exp(-t);
    Fixed::ONE
        .checked_div(denominator)
        .unwrap_or(Fixed::ZERO)
        .clamp(Fixed::ZERO, Fixed::ONE)
}

/// Saturating sum of a slice.
pub fn sum(values: &[Fixed]) -> Fixed {
    values
        .iter()
        .fold(Fixed::ZERO, |acc, &v| acc.saturating_add(v))
}

/// Scale non-negative entries so they sum to one.
///
/// A vector whose sum is not positive is set to all zeros.
pub fn inplace_normalize(values: &mut [Fixed]) {
    let total = sum(values);
    if total <= Fixed::ZERO {
        values.iter_mut().for_each(|v| *v = Fixed::ZERO);
        return;
    }
    for v in values.iter_mut() {
        *v = v.checked_div(total).unwrap_or(Fixed::ZERO);
    }
}

/// Zero every entry whose mask flag is false.
pub fn inplace_mask(values: &mut [Fixed], keep: &[bool]) {
    for (v, &k) in values.iter_mut().zip(keep) {
        if !k {
            *v = Fixed::ZERO;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(v: f64) -> Fixed {
        Fixed::from_num(v)
    }

    #[test]
    fn test_fraction_thirds() {
        let total: u128 = 600;
        let a = fraction(100, total);
        let b = fraction(200, total);
        let c = fraction(300, total);
        assert_eq!(c, f(0.5));
        assert!((a.to_num::<f64>() - 1.0 / 6.0).abs() < 1e-15);
        assert!((b.to_num::<f64>() - 1.0 / 3.0).abs() < 1e-15);
        // Floors never overshoot one.
        assert!(a + b + c <= Fixed::ONE);
    }

    #[test]
    fn test_fraction_degenerate() {
        assert_eq!(fraction(5, 0), Fixed::ZERO);
        assert_eq!(fraction(10, 10), Fixed::ONE);
        assert_eq!(fraction(u64::MAX, u128::from(u64::MAX)), Fixed::ONE);
    }

    #[test]
    fn test_mul_floor_matches_exact_products() {
        assert_eq!(mul_floor(f(0.5), f(0.5)), f(0.25));
        assert_eq!(mul_floor(f(3.0), f(2.5)), f(7.5));
        assert_eq!(mul_floor(Fixed::ONE, Fixed::ONE), Fixed::ONE);
        assert_eq!(mul_floor(f(-1.0), f(2.0)), Fixed::ZERO);
    }

    #[test]
    fn test_mul_floor_rounds_down() {
        // 0.5 * (1 - ulp) = 0.5 - ulp/2, floored to 0.5 - ulp.
        let almost_one = Fixed::ONE - Fixed::DELTA;
        assert_eq!(mul_floor(f(0.5), almost_one), f(0.5) - Fixed::DELTA);
    }

    #[test]
    fn test_mul_floor_saturates() {
        let big = Fixed::from_num(1_u64 << 40);
        assert_eq!(mul_floor(big, big), Fixed::MAX);
    }

    #[test]
    fn test_mul_floor_int() {
        assert_eq!(mul_floor_int(f(0.5), 1_000), 500);
        assert_eq!(mul_floor_int(fraction(1, 3), 3_000), 999);
        assert_eq!(mul_floor_int(Fixed::ONE, u64::MAX), u64::MAX);
        assert_eq!(mul_floor_int(f(2.0), u64::MAX), u64::MAX);
        assert_eq!(mul_floor_int(f(-0.5), 1_000), 0);
    }

    #[test]
    fn test_exp_known_values() {
        assert_eq!(exp(Fixed::ZERO), Fixed::ONE);
        assert!((exp(f(1.0)).to_num::<f64>() - std::f64::consts::E).abs() < 1e-12);
        assert!((exp(f(-1.0)).to_num::<f64>() - (-1.0f64).exp()).abs() < 1e-12);
        assert!((exp(f(5.5)).to_num::<f64>() - 5.5f64.exp()).abs() < 1e-9);
        assert!((exp(f(-12.25)).to_num::<f64>() - (-12.25f64).exp()).abs() < 1e-15);
    }

    #[test]
    fn test_exp_saturates_at_limit() {
        assert_eq!(exp(f(1_000.0)), exp(f(40.0)));
        assert_eq!(exp(f(-1_000.0)), exp(f(-40.0)));
        assert!(exp(f(-40.0)) > Fixed::ZERO);
    }

    #[test]
    fn test_sigmoid_shape() {
        assert_eq!(sigmoid(Fixed::ZERO), f(0.5));
        assert!(sigmoid(f(2.0)) > sigmoid(f(1.0)));
        assert!(sigmoid(f(-2.0)) < sigmoid(f(-1.0)));
        assert!(sigmoid(f(100.0)) <= Fixed::ONE);
        assert!(sigmoid(f(-100.0)) >= Fixed::ZERO);
        let s = sigmoid(f(1.5)).to_num::<f64>();
        assert!((s - 1.0 / (1.0 + (-1.5f64).exp())).abs() < 1e-12);
    }

    #[test]
    fn test_sigmoid_is_bit_reproducible() {
        let a = sigmoid(f(0.3712));
        let b = sigmoid(f(0.3712));
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn test_normalize() {
        let mut v = vec![f(1.0), f(3.0), f(0.0)];
        inplace_normalize(&mut v);
        assert_eq!(v, vec![f(0.25), f(0.75), f(0.0)]);

        let mut zeros = vec![Fixed::ZERO; 3];
        inplace_normalize(&mut zeros);
        assert!(zeros.iter().all(|v| *v == Fixed::ZERO));
    }

    #[test]
    fn test_mask() {
        let mut v = vec![f(0.2), f(0.3), f(0.5)];
        inplace_mask(&mut v, &[true, false, true]);
        assert_eq!(v, vec![f(0.2), Fixed::ZERO, f(0.5)]);
    }
}
