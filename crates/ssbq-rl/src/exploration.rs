//! Exploration strategies
//!
//! The strategy is chosen once, when a learner is built. Only the
//! epsilon-greedy-trajectory strategy carries state between decisions: the
//! explore/exploit coin is tossed at each trajectory restart and holds
//! until the next one.

use std::fmt;
use std::str::FromStr;

use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::warn;

use ssbq_core::{Result, SsbqError};

/// Softmax temperature used when none is given
pub const DEFAULT_TEMPERATURE: f64 = 5.0;

/// How a learner trades exploration against exploitation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ExplorationStrategy {
    /// Explore uniformly with probability epsilon at every decision
    EpsilonGreedy,

    /// Explore for a whole trajectory with probability epsilon
    #[serde(rename = "epsilon-greedy-traj")]
    EpsilonGreedyTrajectory,

    /// Softmax over Q-values at a fixed temperature
    Boltzmann { temperature: f64 },
}

impl Default for ExplorationStrategy {
    fn default() -> Self {
        Self::EpsilonGreedy
    }
}

impl ExplorationStrategy {
    pub fn validate(&self) -> Result<()> {
        if let Self::Boltzmann { temperature } = self {
            if !(temperature.is_finite() && *temperature > 0.0) {
                return Err(SsbqError::Config(format!(
                    "Boltzmann temperature must be positive, got {temperature}"
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for ExplorationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EpsilonGreedy => write!(f, "epsilon-greedy"),
            Self::EpsilonGreedyTrajectory => write!(f, "epsilon-greedy-traj"),
            Self::Boltzmann { temperature } => write!(f, "boltzmann(T={temperature})"),
        }
    }
}

impl FromStr for ExplorationStrategy {
    type Err = SsbqError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "epsilon-greedy" => Ok(Self::EpsilonGreedy),
            "epsilon-greedy-traj" | "epsilon-greedy-trajectory" => {
                Ok(Self::EpsilonGreedyTrajectory)
            }
            "boltzmann" => Ok(Self::Boltzmann {
                temperature: DEFAULT_TEMPERATURE,
            }),
            other => Err(SsbqError::Config(format!(
                "Unknown exploration strategy: {other}"
            ))),
        }
    }
}

/// Why an action was picked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionKind {
    /// Only one legal action
    Sole,
    /// Uniform exploratory pick
    Explore,
    /// Greedy pick among maximal Q-values
    Exploit,
    /// Boltzmann draw
    Softmax,
}

/// Applies an [`ExplorationStrategy`] and tracks whether the current
/// trajectory is exploratory
#[derive(Debug, Clone)]
pub struct ActionSelector {
    strategy: ExplorationStrategy,
    epsilon: f64,
    exploratory_trajectory: bool,
    trajectory_started: bool,
}

impl ActionSelector {
    pub fn new(strategy: ExplorationStrategy, epsilon: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&epsilon) {
            return Err(SsbqError::Config(format!(
                "epsilon must lie in [0, 1], got {epsilon}"
            )));
        }
        strategy.validate()?;
        Ok(Self {
            strategy,
            epsilon,
            exploratory_trajectory: false,
            trajectory_started: false,
        })
    }

    pub fn strategy(&self) -> ExplorationStrategy {
        self.strategy
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Whether an exploratory choice shaped the current trajectory
    pub fn is_exploratory_trajectory(&self) -> bool {
        self.exploratory_trajectory
    }

    /// Start a new trajectory. The trajectory strategy tosses its coin
    /// here; the others clear the flag.
    pub fn restart_trajectory(&mut self, rng: &mut dyn RngCore) {
        self.trajectory_started = true;
        self.exploratory_trajectory = match self.strategy {
            ExplorationStrategy::EpsilonGreedyTrajectory => rng.gen::<f64>() < self.epsilon,
            _ => false,
        };
    }

    /// Toss the trajectory coin for the very first trajectory
    pub fn ensure_trajectory_started(&mut self, rng: &mut dyn RngCore) {
        if !self.trajectory_started {
            self.restart_trajectory(rng);
        }
    }

    /// Pick one of `actions`, `q_values[i]` being the value of `actions[i]`
    pub fn select<A: Clone>(
        &mut self,
        actions: &[A],
        q_values: &[f64],
        rng: &mut dyn RngCore,
    ) -> Result<(A, SelectionKind)> {
        if actions.len() != q_values.len() {
            return Err(SsbqError::DimensionMismatch {
                left: actions.len(),
                right: q_values.len(),
            });
        }
        if actions.len() == 1 {
            return Ok((actions[0].clone(), SelectionKind::Sole));
        }

        match self.strategy {
            ExplorationStrategy::EpsilonGreedy => {
                if rng.gen::<f64>() < self.epsilon {
                    self.exploratory_trajectory = true;
                    Ok((uniform(actions, rng)?, SelectionKind::Explore))
                } else {
                    Ok((greedy(actions, q_values, rng)?, SelectionKind::Exploit))
                }
            }
            ExplorationStrategy::EpsilonGreedyTrajectory => {
                if self.exploratory_trajectory {
                    Ok((uniform(actions, rng)?, SelectionKind::Explore))
                } else {
                    Ok((greedy(actions, q_values, rng)?, SelectionKind::Exploit))
                }
            }
            ExplorationStrategy::Boltzmann { temperature } => {
                match boltzmann_weights(q_values, temperature)
                    .and_then(|w| weighted_index(&w))
                {
                    Ok(dist) => Ok((actions[dist.sample(rng)].clone(), SelectionKind::Softmax)),
                    Err(e) => {
                        warn!("{}, falling back to a uniform choice", e);
                        Ok((uniform(actions, rng)?, SelectionKind::Softmax))
                    }
                }
            }
        }
    }
}

fn uniform<A: Clone>(actions: &[A], rng: &mut dyn RngCore) -> Result<A> {
    actions
        .choose(rng)
        .cloned()
        .ok_or_else(|| SsbqError::Config("no action to choose from".to_string()))
}

/// Action with maximal Q-value, ties broken uniformly at random
pub fn greedy<A: Clone>(actions: &[A], q_values: &[f64], rng: &mut dyn RngCore) -> Result<A> {
    let best = q_values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let maximisers: Vec<&A> = actions
        .iter()
        .zip(q_values)
        .filter(|(_, q)| **q == best)
        .map(|(a, _)| a)
        .collect();
    maximisers
        .choose(rng)
        .map(|a| (*a).clone())
        .ok_or_else(|| SsbqError::Config("no action to choose from".to_string()))
}

/// Unnormalised softmax weights `exp(q / temperature)`.
///
/// Fails with `DegenerateDistribution` when the weights cannot be
/// normalised (they underflow to a zero sum or overflow).
pub fn boltzmann_weights(q_values: &[f64], temperature: f64) -> Result<Vec<f64>> {
    let weights: Vec<f64> = q_values.iter().map(|q| (q / temperature).exp()).collect();
    let total: f64 = weights.iter().sum();
    if total == 0.0 || !total.is_finite() {
        return Err(SsbqError::DegenerateDistribution(format!(
            "softmax weights sum to {total}"
        )));
    }
    Ok(weights)
}

fn weighted_index(weights: &[f64]) -> Result<WeightedIndex<f64>> {
    WeightedIndex::new(weights).map_err(|e| SsbqError::DegenerateDistribution(e.to_string()))
}
