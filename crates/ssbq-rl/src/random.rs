//! Uniform random baseline

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::RngCore;

use ssbq_core::{EpisodeContext, Environment, Result, Scoring, SsbqError};

use crate::algorithm::{accrue_cost, gamma, Learner};
use crate::exploration::SelectionKind;
use crate::state::TabularState;

/// Plays uniformly among legal actions and never updates a Q-value.
///
/// Visits, experiences and the real outcome frequencies are still recorded
/// so a random run can be compared with a learning one.
pub struct RandomLearner<E: Environment> {
    env: Arc<E>,
    tables: TabularState<E::State, E::Action>,
}

impl<E: Environment> RandomLearner<E> {
    pub fn new(env: Arc<E>, history_capacity: usize) -> Result<Self> {
        let tables = TabularState::from_environment(env.as_ref(), history_capacity)?;
        Ok(Self { env, tables })
    }
}

impl<E: Environment> Learner<E> for RandomLearner<E> {
    fn name(&self) -> &str {
        "random"
    }

    fn choose_action(
        &mut self,
        state: &E::State,
        ctx: &mut EpisodeContext,
        rng: &mut dyn RngCore,
    ) -> Result<E::Action> {
        if ctx.begin_decision() {
            self.tables.record_forced_reset();
            return Ok(self.env.reinit_action());
        }
        let actions = self.tables.legal_actions(state)?;
        let action = actions
            .choose(rng)
            .cloned()
            .ok_or_else(|| SsbqError::unrecognized_state(state))?;
        let kind = if actions.len() == 1 {
            SelectionKind::Sole
        } else {
            SelectionKind::Explore
        };
        self.tables.record_selection(kind);
        Ok(action)
    }

    fn inform(
        &mut self,
        state: &E::State,
        action: &E::Action,
        next_state: &E::State,
        ctx: &mut EpisodeContext,
        _rng: &mut dyn RngCore,
    ) -> Result<()> {
        self.tables.check_transition(state, action, next_state)?;
        let terminal_rank =
            if self.env.scoring() == Scoring::Outcome && self.env.is_terminal(next_state) {
                Some(self.env.outcome_rank(next_state)?)
            } else {
                None
            };

        self.tables.record_experience(state, action)?;
        match self.env.scoring() {
            Scoring::Outcome => {
                if let Some(rank) = terminal_rank {
                    let level = self.tables.outcome_levels()[rank].clone();
                    self.tables.record_outcome(rank as f64);
                    let n = self.tables.count_episode();
                    self.tables.update_real(&level, gamma(n))?;
                }
            }
            Scoring::CostBudget { budget } => {
                if !self.env.is_reinit(action) {
                    if let Some(score) =
                        accrue_cost(self.env.as_ref(), ctx, budget, state, next_state)?
                    {
                        self.tables.record_outcome(score);
                        self.tables.count_episode();
                    }
                }
            }
        }
        Ok(())
    }

    fn tables(&self) -> &TabularState<E::State, E::Action> {
        &self.tables
    }

    fn reward_for_rank(&self, _rank: f64) -> f64 {
        0.0
    }

    fn params(&self) -> serde_json::Value {
        serde_json::json!({
            "algorithm": self.name(),
            "history_capacity": self.tables.history().capacity(),
        })
    }
}
