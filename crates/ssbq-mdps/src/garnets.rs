//! Garnets: randomly generated MDPs
//!
//! A garnet has `states` states of which the last `terminals` end the
//! episode, `actions` actions in every other state, and for every
//! (state, action) pair `successors` distinct successors drawn from the
//! other states. Successor masses are obtained by stick breaking: each
//! successor but the last takes a uniform share of the remaining mass, the
//! last takes whatever is left. The table is generated once from a seeded
//! generator, so a given configuration always yields the same MDP.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use ssbq_core::{Environment, OutcomeLevel, Result, SsbqError, Transition};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GarnetsConfig {
    pub states: usize,
    pub terminals: usize,
    pub actions: u8,
    pub successors: usize,
    pub horizon: usize,
    pub seed: u64,
}

impl Default for GarnetsConfig {
    fn default() -> Self {
        Self {
            states: 100,
            terminals: 20,
            actions: 5,
            successors: 7,
            horizon: 50,
            seed: 8,
        }
    }
}

impl GarnetsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.terminals == 0 || self.terminals >= self.states {
            return Err(SsbqError::Config(format!(
                "a garnet needs between 1 and {} terminal states, got {}",
                self.states.saturating_sub(1),
                self.terminals
            )));
        }
        if self.actions == 0 {
            return Err(SsbqError::Config("a garnet needs at least one action".to_string()));
        }
        if self.successors == 0 || self.successors >= self.states {
            return Err(SsbqError::Config(format!(
                "successor count must lie in [1, {}], got {}",
                self.states - 1,
                self.successors
            )));
        }
        if self.horizon == 0 {
            return Err(SsbqError::Config("horizon must be positive".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GarnetMove {
    /// Action `1..=actions`
    Pick(u8),
    Reinit,
}

#[derive(Debug, Clone)]
pub struct Garnets {
    config: GarnetsConfig,
    states: Vec<usize>,
    actions: Vec<GarnetMove>,
    levels: Vec<OutcomeLevel>,
    /// `table[state][action - 1]` for every non-terminal state
    table: Vec<Vec<Vec<(usize, f64)>>>,
}

impl Garnets {
    pub fn new(config: GarnetsConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let live = config.states - config.terminals;

        let table = (0..live)
            .map(|state| {
                (0..config.actions)
                    .map(|_| Self::draw_successors(&config, state, &mut rng))
                    .collect()
            })
            .collect();

        debug!(
            "Generated garnet with {} states, {} actions, {} successors (seed {})",
            config.states, config.actions, config.successors, config.seed
        );

        Ok(Self {
            config,
            states: (0..config.states).collect(),
            actions: std::iter::once(GarnetMove::Reinit)
                .chain((1..=config.actions).map(GarnetMove::Pick))
                .collect(),
            levels: (1..=config.terminals)
                .map(|i| OutcomeLevel::new(format!("w{i}")))
                .collect(),
            table,
        })
    }

    pub fn config(&self) -> &GarnetsConfig {
        &self.config
    }

    fn draw_successors(config: &GarnetsConfig, state: usize, rng: &mut StdRng) -> Vec<(usize, f64)> {
        // Sample among the other states, then shift past `state`
        let picks = index::sample(rng, config.states - 1, config.successors);
        let mut rest = 1.0;
        let mut successors = Vec::with_capacity(config.successors);
        for (k, pick) in picks.into_iter().enumerate() {
            let next = if pick >= state { pick + 1 } else { pick };
            let p = if k + 1 < config.successors {
                rng.gen::<f64>() * rest
            } else {
                rest
            };
            rest -= p;
            if p > 0.0 {
                successors.push((next, p));
            }
        }
        successors
    }

    fn first_terminal(&self) -> usize {
        self.config.states - self.config.terminals
    }

    fn check_state(&self, state: usize) -> Result<()> {
        if state < self.config.states {
            Ok(())
        } else {
            Err(SsbqError::unrecognized_state(&state))
        }
    }
}

impl Environment for Garnets {
    type State = usize;
    type Action = GarnetMove;

    fn name(&self) -> &str {
        "garnets"
    }

    fn states(&self) -> &[usize] {
        &self.states
    }

    fn actions(&self) -> &[GarnetMove] {
        &self.actions
    }

    fn outcome_levels(&self) -> &[OutcomeLevel] {
        &self.levels
    }

    fn legal_actions(&self, state: &usize) -> Result<Vec<GarnetMove>> {
        self.check_state(*state)?;
        Ok(if self.is_terminal(state) {
            vec![GarnetMove::Reinit]
        } else {
            self.actions[1..].to_vec()
        })
    }

    fn is_terminal(&self, state: &usize) -> bool {
        (self.first_terminal()..self.config.states).contains(state)
    }

    fn outcome_of(&self, state: &usize) -> Result<OutcomeLevel> {
        state
            .checked_sub(self.first_terminal())
            .and_then(|i| self.levels.get(i))
            .cloned()
            .ok_or_else(|| SsbqError::unrecognized_state(state))
    }

    fn transition(&self, state: &usize, action: &GarnetMove) -> Result<Transition<usize>> {
        self.check_state(*state)?;
        match action {
            GarnetMove::Reinit => Ok(Transition::certain(0)),
            GarnetMove::Pick(a) => self
                .table
                .get(*state)
                .and_then(|row| row.get(usize::from(*a).checked_sub(1)?))
                .map(|successors| Transition::new(successors.clone()))
                .ok_or_else(|| SsbqError::illegal_action(state, action)),
        }
    }

    fn initial_state(&self) -> &usize {
        &self.states[0]
    }

    fn reinit_action(&self) -> GarnetMove {
        GarnetMove::Reinit
    }

    fn horizon(&self) -> Option<usize> {
        Some(self.config.horizon)
    }
}
