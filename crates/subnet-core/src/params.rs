// crates/subnet-core/src/params.rs
//
// Per-subnet epoch tuning parameters.
//
// Subnet configuration arrives from the host as a string-keyed map. The
// resolver parses it into a typed `EpochParams`, applying defaults for unset
// keys and falling back to defaults (with a warning) for values that do not
// parse or fall outside their valid range. Resolution never fails.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::math::Fixed;

/// Raw subnet configuration as stored by the host: key -> decimal string.
pub type RawParams = BTreeMap<String, String>;

/// Typed epoch parameters for one subnet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochParams {
    /// Stake fraction at which the weighted median stops (default 0.5).
    pub kappa: Fixed,
    /// Share of the emission budget routed to the incentive pool (default 0.5).
    pub rho: Fixed,
    /// Half-width of the clipping band around consensus (default 1.0).
    pub delta: Fixed,
    /// Blocks without activity after which a participant becomes inactive.
    pub activity_cutoff: u64,
    /// Blocks after registration during which a participant is always active.
    pub immunity_period: u64,
    /// Blocks between epochs.
    pub tempo: u64,
    /// Maximum non-zero weights retained per row.
    pub max_weights_limit: u32,
    /// Minimum non-zero weights a row needs to count.
    pub min_allowed_weights: u32,
    /// Rows submitted fewer than this many blocks ago are ignored for the epoch.
    pub weights_set_rate_limit: u64,
    /// Fixed-mode bond retention; the EMA rate is `1 - bonds_moving_average`.
    pub bonds_moving_average: Fixed,
    /// Use per-cell sigmoid-derived EMA rates instead of the fixed rate.
    pub liquid_alpha_enabled: bool,
    /// Lower bound of the liquid EMA rate.
    pub alpha_low: Fixed,
    /// Upper bound of the liquid EMA rate.
    pub alpha_high: Fixed,
    /// Steepness of the liquid-alpha sigmoid.
    pub alpha_sigmoid_steepness: Fixed,
}

impl Default for EpochParams {
    fn default() -> Self {
        Self {
            kappa: ratio(1, 2),
            rho: ratio(1, 2),
            delta: Fixed::ONE,
            activity_cutoff: 5_000,
            immunity_period: 4_096,
            tempo: 360,
            max_weights_limit: 1_024,
            min_allowed_weights: 1,
            weights_set_rate_limit: 0,
            bonds_moving_average: ratio(9, 10),
            liquid_alpha_enabled: false,
            alpha_low: ratio(7, 10),
            alpha_high: ratio(9, 10),
            alpha_sigmoid_steepness: Fixed::from_num(10),
        }
    }
}

/// `numerator / denominator` as a fixed-point constant.
fn ratio(numerator: i32, denominator: i32) -> Fixed {
    Fixed::from_num(numerator) / Fixed::from_num(denominator)
}

impl EpochParams {
    /// Resolve typed parameters from a raw subnet configuration map.
    pub fn resolve(raw: &RawParams) -> Self {
        let defaults = Self::default();
        let mut params = defaults.clone();

        for (key, value) in raw {
            match key.as_str() {
                "kappa" => params.kappa = parse_unit(key, value, defaults.kappa),
                "rho" => params.rho = parse_unit(key, value, defaults.rho),
                "delta" => {
                    params.delta = parse_checked(key, value, defaults.delta, |d| *d >= Fixed::ZERO)
                }
                "activity_cutoff" => {
                    params.activity_cutoff = parse_checked(key, value, defaults.activity_cutoff, |_| true)
                }
                "immunity_period" => {
                    params.immunity_period = parse_checked(key, value, defaults.immunity_period, |_| true)
                }
                "tempo" => params.tempo = parse_checked(key, value, defaults.tempo, |t| *t >= 1),
                "max_weights_limit" => {
                    params.max_weights_limit =
                        parse_checked(key, value, defaults.max_weights_limit, |m| *m >= 1)
                }
                "min_allowed_weights" => {
                    params.min_allowed_weights =
                        parse_checked(key, value, defaults.min_allowed_weights, |_| true)
                }
                "weights_set_rate_limit" => {
                    params.weights_set_rate_limit =
                        parse_checked(key, value, defaults.weights_set_rate_limit, |_| true)
                }
                "bonds_moving_average" => {
                    params.bonds_moving_average =
                        parse_unit(key, value, defaults.bonds_moving_average)
                }
                "liquid_alpha_enabled" => {
                    params.liquid_alpha_enabled =
                        parse_checked(key, value, defaults.liquid_alpha_enabled, |_| true)
                }
                "alpha_low" => params.alpha_low = parse_unit(key, value, defaults.alpha_low),
                "alpha_high" => params.alpha_high = parse_unit(key, value, defaults.alpha_high),
                "alpha_sigmoid_steepness" => {
                    params.alpha_sigmoid_steepness = parse_checked(
                        key,
                        value,
                        defaults.alpha_sigmoid_steepness,
                        |s| *s >= Fixed::ZERO,
                    )
                }
                other => tracing::debug!(key = other, "Ignoring unknown epoch parameter"),
            }
        }

        if params.alpha_low > params.alpha_high {
            tracing::warn!(
                alpha_low = %params.alpha_low,
                alpha_high = %params.alpha_high,
                "alpha_low exceeds alpha_high, using default liquid alpha bounds"
            );
            params.alpha_low = defaults.alpha_low;
            params.alpha_high = defaults.alpha_high;
        }

        params
    }

    /// EMA rate used by fixed-mode bonds: `1 - bonds_moving_average`.
    pub fn fixed_alpha(&self) -> Fixed {
        (Fixed::ONE - self.bonds_moving_average).clamp(Fixed::ZERO, Fixed::ONE)
    }
}

/// Parse a value that must lie in `[0, 1]`.
fn parse_unit(key: &str, value: &str, default: Fixed) -> Fixed {
    parse_checked(key, value, default, |v| *v >= Fixed::ZERO && *v <= Fixed::ONE)
}

/// Parse `value`, falling back to `default` when it does not parse or fails `valid`.
fn parse_checked<T>(key: &str, value: &str, default: T, valid: impl Fn(&T) -> bool) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match value.trim().parse::<T>() {
        Ok(parsed) if valid(&parsed) => parsed,
        Ok(parsed) => {
            tracing::warn!(key, value = %parsed, fallback = %default, "Epoch parameter out of range");
            default
        }
        Err(e) => {
            tracing::warn!(key, value, fallback = %default, error = %e, "Unparseable epoch parameter");
            default
        }
    }
}
