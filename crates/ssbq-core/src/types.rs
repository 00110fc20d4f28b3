//! Common types used throughout SSBQ

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

/// Tolerance used when checking that a transition distribution sums to one
pub const PROBABILITY_TOLERANCE: f64 = 1e-9;

/// Label of a distinguishable terminal result (a "wealth level").
///
/// Levels carry no order themselves; an environment declares them as an
/// ordered list and the rank of a level is its index in that list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutcomeLevel(pub String);

impl OutcomeLevel {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OutcomeLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OutcomeLevel {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

/// Sparse distribution over next states, in a fixed order.
///
/// Entries with zero probability are dropped at construction, so
/// iteration only ever yields reachable successors.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<S> {
    outcomes: Vec<(S, f64)>,
}

impl<S> Transition<S> {
    pub fn new(outcomes: Vec<(S, f64)>) -> Self {
        Self {
            outcomes: outcomes.into_iter().filter(|(_, p)| *p != 0.0).collect(),
        }
    }

    /// Deterministic move to `state`
    pub fn certain(state: S) -> Self {
        Self {
            outcomes: vec![(state, 1.0)],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&S, f64)> {
        self.outcomes.iter().map(|(s, p)| (s, *p))
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn total_mass(&self) -> f64 {
        self.outcomes.iter().map(|(_, p)| p).sum()
    }

    /// Draw a successor by walking the cumulative mass.
    ///
    /// If rounding leaves the cumulative mass just below the drawn number,
    /// the last successor is returned.
    pub fn sample(&self, rng: &mut dyn RngCore) -> Option<&S> {
        let draw: f64 = rng.gen();
        let mut mass = 0.0;
        for (state, probability) in &self.outcomes {
            mass += probability;
            if draw <= mass {
                return Some(state);
            }
        }
        self.outcomes.last().map(|(s, _)| s)
    }

    pub fn into_inner(self) -> Vec<(S, f64)> {
        self.outcomes
    }
}

impl<S: PartialEq> Transition<S> {
    pub fn probability(&self, state: &S) -> f64 {
        self.outcomes
            .iter()
            .filter(|(s, _)| s == state)
            .map(|(_, p)| p)
            .sum()
    }
}
