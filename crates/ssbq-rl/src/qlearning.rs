//! Standard tabular Q-learning baseline

use std::sync::Arc;

use rand::RngCore;
use tracing::debug;

use ssbq_core::{EpisodeContext, Environment, Result, Scoring, SsbqError};

use crate::algorithm::{accrue_cost, alpha, beta, choose_with, gamma, Learner, LearnerConfig};
use crate::exploration::ActionSelector;
use crate::state::TabularState;

/// Undiscounted Q-learning with step size `alpha(n)`.
///
/// Terminal transitions pay nothing unless a per-outcome reward table is
/// supplied. Cost-budget environments pay `budget - cost` at the horizon.
pub struct StandardLearner<E: Environment> {
    env: Arc<E>,
    config: LearnerConfig,
    selector: ActionSelector,
    tables: TabularState<E::State, E::Action>,
    outcome_rewards: Option<Vec<f64>>,
}

impl<E: Environment> StandardLearner<E> {
    pub fn new(env: Arc<E>, config: LearnerConfig) -> Result<Self> {
        config.validate()?;
        let selector = config.selector()?;
        let tables = TabularState::from_environment(env.as_ref(), config.history_capacity)?;
        Ok(Self {
            env,
            config,
            selector,
            tables,
            outcome_rewards: None,
        })
    }

    /// Pay `rewards[rank]` on reaching a terminal state of that rank
    pub fn with_outcome_rewards(mut self, rewards: Vec<f64>) -> Result<Self> {
        let levels = self.tables.outcome_levels().len();
        if rewards.len() != levels {
            return Err(SsbqError::DimensionMismatch {
                left: rewards.len(),
                right: levels,
            });
        }
        self.outcome_rewards = Some(rewards);
        Ok(self)
    }

    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    fn record_terminal(&mut self, rank: usize) -> Result<f64> {
        let level = self.tables.outcome_levels()[rank].clone();
        self.tables.record_outcome(rank as f64);

        let n = self.tables.count_episode();
        if !self.selector.is_exploratory_trajectory() {
            let m = self.tables.count_on_policy_episode();
            self.tables.update_on_policy(&level, beta(m))?;
        }
        self.tables.update_real(&level, gamma(n))?;

        debug!("Episode {} ended in {}", n, level);
        Ok(self.reward_for_rank(rank as f64))
    }
}

impl<E: Environment> Learner<E> for StandardLearner<E> {
    fn name(&self) -> &str {
        "q_learning"
    }

    fn choose_action(
        &mut self,
        state: &E::State,
        ctx: &mut EpisodeContext,
        rng: &mut dyn RngCore,
    ) -> Result<E::Action> {
        choose_with(
            self.env.as_ref(),
            &mut self.tables,
            &mut self.selector,
            state,
            ctx,
            rng,
        )
    }

    fn inform(
        &mut self,
        state: &E::State,
        action: &E::Action,
        next_state: &E::State,
        ctx: &mut EpisodeContext,
        rng: &mut dyn RngCore,
    ) -> Result<()> {
        self.tables.check_transition(state, action, next_state)?;
        let scoring = self.env.scoring();
        let terminal_rank = if scoring == Scoring::Outcome && self.env.is_terminal(next_state) {
            Some(self.env.outcome_rank(next_state)?)
        } else {
            None
        };

        let reinit = self.env.is_reinit(action);
        if reinit {
            self.selector.restart_trajectory(rng);
        }

        let mut reward = 0.0;
        if let Some(rank) = terminal_rank {
            reward = self.record_terminal(rank)?;
        }

        let n = self.tables.record_experience(state, action)?;
        let mut bootstrap = self.tables.max_q(next_state)?;

        match scoring {
            Scoring::CostBudget { budget } if !reinit => {
                if let Some(score) = accrue_cost(self.env.as_ref(), ctx, budget, state, next_state)? {
                    reward = score;
                    bootstrap = 0.0;
                    self.tables.record_outcome(score);
                    let episode = self.tables.count_episode();
                    debug!("Episode {} scored {:.2}", episode, score);
                }
                self.tables.update_q(state, action, reward + bootstrap, alpha(n))?;
            }
            _ => {
                if !self.env.is_terminal(state) {
                    self.tables.update_q(state, action, reward + bootstrap, alpha(n))?;
                }
            }
        }
        Ok(())
    }

    fn tables(&self) -> &TabularState<E::State, E::Action> {
        &self.tables
    }

    fn reward_for_rank(&self, rank: f64) -> f64 {
        if let Scoring::CostBudget { .. } = self.env.scoring() {
            return rank;
        }
        if rank < 0.0 {
            return 0.0;
        }
        self.outcome_rewards
            .as_ref()
            .and_then(|rewards| rewards.get(rank.round() as usize))
            .copied()
            .unwrap_or(0.0)
    }

    fn params(&self) -> serde_json::Value {
        serde_json::json!({
            "algorithm": self.name(),
            "epsilon": self.config.epsilon,
            "strategy": self.config.strategy.to_string(),
            "outcome_rewards": self.outcome_rewards,
            "history_capacity": self.config.history_capacity,
        })
    }
}
