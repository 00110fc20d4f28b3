//! Vector and distribution helpers
//!
//! Vectors are plain slices of `f64`. Distributions are sparse maps from a
//! label to its probability; labels absent from the map have probability 0.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::hash::Hash;

use crate::error::{Result, SsbqError};

/// Sum of pairwise products of two equal-length vectors
pub fn inner_product(a: &[f64], b: &[f64]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(SsbqError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    Ok(a.iter().zip(b).map(|(x, y)| x * y).sum())
}

/// Exponentially-weighted running mean step towards `element`.
///
/// Every other label is scaled by `1 - coefficient` and `element` receives
/// the freed mass, so a distribution summing to one keeps summing to one.
/// A distribution that is zero everywhere is treated as never updated: the
/// first observation becomes certain.
pub fn running_mean_update<K>(
    distribution: &mut HashMap<K, f64>,
    element: &K,
    coefficient: f64,
) -> Result<()>
where
    K: Eq + Hash + Clone,
{
    if !(coefficient > 0.0 && coefficient <= 1.0) {
        return Err(SsbqError::InvalidCoefficient(coefficient));
    }

    if distribution.values().all(|p| *p == 0.0) {
        distribution.insert(element.clone(), 1.0);
        return Ok(());
    }

    distribution.entry(element.clone()).or_insert(0.0);
    for (key, p) in distribution.iter_mut() {
        *p *= 1.0 - coefficient;
        if key == element {
            *p += coefficient;
        }
    }
    Ok(())
}

/// Dense view of a distribution in the given label order
pub fn distribution_to_vector<K>(distribution: &HashMap<K, f64>, order: &[K]) -> Vec<f64>
where
    K: Eq + Hash,
{
    order
        .iter()
        .map(|k| distribution.get(k).copied().unwrap_or(0.0))
        .collect()
}

/// Renders a vector as `| 0.25 | 0.75 |`
pub fn format_vector(vector: &[f64]) -> String {
    let mut out = String::from("| ");
    for value in vector {
        let _ = write!(out, "{value:.2} | ");
    }
    out
}
