// crates/subnet-core/src/bonds.rs
//
// Persistent bonds matrix for a subnet.
//
// Bonds are keyed by the ordered pair of participant addresses rather than by
// matrix index, because the participant set can change between epochs. An
// absent entry means a bond of zero.

use std::collections::{BTreeMap, HashMap};

use crate::math::Fixed;

/// Sparse bonds matrix: B(from, to) = accumulated trust `from` holds in `to`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BondsMatrix {
    entries: BTreeMap<(String, String), Fixed>,
}

impl BondsMatrix {
    /// Create an empty bonds matrix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bond held by `from` in `to`, zero if absent.
    pub fn get(&self, from: &str, to: &str) -> Fixed {
        self.entries
            .get(&(from.to_string(), to.to_string()))
            .copied()
            .unwrap_or(Fixed::ZERO)
    }

    /// Set the bond held by `from` in `to`.
    ///
    /// Non-positive values remove the entry.
    pub fn set(&mut self, from: impl Into<String>, to: impl Into<String>, value: Fixed) {
        let key = (from.into(), to.into());
        if value > Fixed::ZERO {
            self.entries.insert(key, value);
        } else {
            self.entries.remove(&key);
        }
    }

    /// Iterate over all non-zero entries in address order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, Fixed)> {
        self.entries
            .iter()
            .map(|((from, to), value)| (from.as_str(), to.as_str(), *value))
    }

    /// Number of non-zero entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Project onto a dense `n x n` matrix in the order of `addresses`.
    ///
    /// Entries that reference an address outside the list are ignored.
    pub fn to_dense(&self, addresses: &[String]) -> Vec<Vec<Fixed>> {
        let n = addresses.len();
        let index: HashMap<&str, usize> = addresses
            .iter()
            .enumerate()
            .map(|(i, a)| (a.as_str(), i))
            .collect();

        let mut dense = vec![vec![Fixed::ZERO; n]; n];
        for (from, to, value) in self.iter() {
            if let (Some(&i), Some(&j)) = (index.get(from), index.get(to)) {
                dense[i][j] = value;
            }
        }
        dense
    }

    /// Build from a dense matrix indexed in the order of `addresses`.
    pub fn from_dense(addresses: &[String], dense: &[Vec<Fixed>]) -> Self {
        let mut bonds = Self::new();
        for (i, row) in dense.iter().enumerate().take(addresses.len()) {
            for (j, &value) in row.iter().enumerate().take(addresses.len()) {
                bonds.set(addresses[i].clone(), addresses[j].clone(), value);
            }
        }
        bonds
    }
}
