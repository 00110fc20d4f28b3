//! Policy evaluation by value iteration
//!
//! Used as an oracle for diagnostics: given a reward for every terminal
//! state, compute the best achievable expected reward from the initial
//! state under the environment's own dynamics. Never part of the control
//! loop.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::environment::Environment;
use crate::error::{Result, SsbqError};

/// Value iteration settings.
///
/// Sweeps stop once the largest change within a sweep is at most
/// `tolerance`. A tolerance of zero asks for an exact floating point fixed
/// point, which may never be reached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueIteration {
    pub tolerance: f64,
    pub max_sweeps: usize,
}

impl Default for ValueIteration {
    fn default() -> Self {
        Self {
            tolerance: 1e-12,
            max_sweeps: 100_000,
        }
    }
}

/// Successor lists of one non-terminal state, one per legal action
struct Backup {
    state: usize,
    actions: Vec<Vec<(usize, f64)>>,
}

impl ValueIteration {
    pub fn new(tolerance: f64, max_sweeps: usize) -> Self {
        Self {
            tolerance,
            max_sweeps,
        }
    }

    /// Optimal expected terminal reward from the initial state.
    ///
    /// `rewards` must hold an entry for every terminal state. A table in
    /// which every reward is 1 short-circuits to 1.
    pub fn solve<E: Environment + ?Sized>(
        &self,
        env: &E,
        rewards: &HashMap<E::State, f64>,
    ) -> Result<f64> {
        if !rewards.is_empty() && rewards.values().all(|r| *r == 1.0) {
            return Ok(1.0);
        }

        let states = env.states();
        let index: HashMap<&E::State, usize> =
            states.iter().enumerate().map(|(i, s)| (s, i)).collect();
        let initial = *index
            .get(env.initial_state())
            .ok_or_else(|| SsbqError::unrecognized_state(env.initial_state()))?;

        let mut values = vec![0.0; states.len()];
        let mut backups = Vec::new();
        for (i, state) in states.iter().enumerate() {
            if env.is_terminal(state) {
                values[i] = *rewards.get(state).ok_or_else(|| {
                    SsbqError::UnrecognizedState(format!("no reward for terminal state {state:?}"))
                })?;
                continue;
            }

            let mut actions = Vec::new();
            for action in env.legal_actions(state)? {
                let successors = env
                    .transition(state, &action)?
                    .iter()
                    .map(|(next, p)| {
                        index
                            .get(next)
                            .map(|j| (*j, p))
                            .ok_or_else(|| SsbqError::unrecognized_state(next))
                    })
                    .collect::<Result<Vec<_>>>()?;
                actions.push(successors);
            }
            if actions.is_empty() {
                return Err(SsbqError::InvalidTransition(format!(
                    "no legal action in {state:?}"
                )));
            }
            backups.push(Backup { state: i, actions });
        }

        for sweep in 1..=self.max_sweeps {
            let mut delta: f64 = 0.0;
            for backup in &backups {
                let best = backup
                    .actions
                    .iter()
                    .map(|successors| successors.iter().map(|(j, p)| p * values[*j]).sum::<f64>())
                    .fold(f64::NEG_INFINITY, f64::max);
                delta = delta.max((values[backup.state] - best).abs());
                values[backup.state] = best;
            }
            if delta <= self.tolerance {
                debug!("Value iteration converged after {} sweeps", sweep);
                return Ok(values[initial]);
            }
        }

        Err(SsbqError::NotConverged(self.max_sweeps))
    }
}
