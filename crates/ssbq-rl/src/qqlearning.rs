//! SSB Q-learning with an adaptive threshold ("QQ-learning")
//!
//! Outcomes are rewarded through a ramp centred on a threshold `theta`:
//! `reward(rank) = clamp(rank - theta + 1, 0, 1)`. After every finished
//! episode the threshold moves so that the best achievable ramp value at
//! the initial state tracks the target quantile `q = 1 - tau`.

use std::sync::Arc;

use rand::RngCore;
use tracing::{debug, trace};

use ssbq_core::{EpisodeContext, Environment, OutcomeLevel, Result, Scoring};

use crate::algorithm::{accrue_cost, alpha, beta, choose_with, gamma, Learner, LearnerConfig};
use crate::exploration::ActionSelector;
use crate::history::History;
use crate::state::TabularState;

pub struct DistributionalLearner<E: Environment> {
    env: Arc<E>,
    config: LearnerConfig,
    selector: ActionSelector,
    tables: TabularState<E::State, E::Action>,
    theta: f64,
    q: f64,
    theta_trace: History<f64>,
}

impl<E: Environment> DistributionalLearner<E> {
    pub fn new(env: Arc<E>, config: LearnerConfig) -> Result<Self> {
        config.validate()?;
        let selector = config.selector()?;
        let tables = TabularState::from_environment(env.as_ref(), config.history_capacity)?;
        Ok(Self {
            env,
            selector,
            tables,
            theta: config.initial_theta,
            q: 1.0 - config.tau,
            theta_trace: History::new(config.history_capacity),
            config,
        })
    }

    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    /// Target quantile `1 - tau`
    pub fn target_quantile(&self) -> f64 {
        self.q
    }

    /// Threshold after each informed transition, oldest first
    pub fn theta_trace(&self) -> &History<f64> {
        &self.theta_trace
    }

    fn ramp(&self, rank: f64) -> f64 {
        (rank - self.theta + 1.0).clamp(0.0, 1.0)
    }

    /// Move theta after the `n`-th finished episode
    fn update_theta(&mut self, n: u64) -> Result<()> {
        let best_q = self.tables.max_q(self.tables.initial_state())?;
        if self.env.scoring() == Scoring::Outcome {
            trace!(
                "Expected ramp reward {:.4} under theta {:.4}",
                self.expected_reward()?,
                self.theta
            );
        }

        let step = gamma(n) * self.config.theta_step;
        if best_q == 0.0 {
            return Ok(());
        }
        if best_q < self.q {
            self.theta -= (1.0 - self.q) * step;
        } else {
            self.theta += self.q * step;
        }
        trace!("theta -> {:.6} (best Q {:.4}, episode {})", self.theta, best_q, n);
        Ok(())
    }

    /// Ramp reward of a terminal transition, computed before theta moves
    fn close_outcome_episode(&mut self, rank: usize) -> Result<f64> {
        let level = self.tables.outcome_levels()[rank].clone();
        self.tables.record_outcome(rank as f64);
        let reward = self.ramp(rank as f64);

        let n = self.tables.count_episode();
        if !self.selector.is_exploratory_trajectory() {
            let m = self.tables.count_on_policy_episode();
            self.tables.update_on_policy(&level, beta(m))?;
        }
        self.update_theta(n)?;
        self.tables.update_real(&level, gamma(n))?;

        debug!("Episode {} ended in {}, theta {:.4}", n, level, self.theta);
        Ok(reward)
    }
}

impl<E: Environment> Learner<E> for DistributionalLearner<E> {
    fn name(&self) -> &str {
        "ssb_q_learning"
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
            reward = self.close_outcome_episode(rank)?;
        }
        self.theta_trace.push(self.theta);

        let n = self.tables.record_experience(state, action)?;
        let mut bootstrap = self.tables.max_q(next_state)?;

        match scoring {
            Scoring::CostBudget { budget } if !reinit => {
                let closed = accrue_cost(self.env.as_ref(), ctx, budget, state, next_state)?;
                if let Some(score) = closed {
                    reward = self.ramp(score);
                    bootstrap = 0.0;
                    self.tables.record_outcome(score);
                }
                self.tables.update_q(state, action, reward + bootstrap, alpha(n))?;

                if let Some(score) = closed {
                    let episode = self.tables.count_episode();
                    if !self.selector.is_exploratory_trajectory() {
                        self.tables.count_on_policy_episode();
                    }
                    self.update_theta(episode)?;
                    debug!(
                        "Episode {} scored {:.2}, theta {:.4}",
                        episode, score, self.theta
                    );
                }
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
        self.ramp(rank)
    }

    fn theta(&self) -> Option<f64> {
        Some(self.theta)
    }

    fn quantile_level(&self) -> Option<&OutcomeLevel> {
        self.tables.quantile_level(self.q)
    }

    fn params(&self) -> serde_json::Value {
        serde_json::json!({
            "algorithm": self.name(),
            "epsilon": self.config.epsilon,
            "strategy": self.config.strategy.to_string(),
            "tau": self.config.tau,
            "initial_theta": self.config.initial_theta,
            "theta_step": self.config.theta_step,
            "theta": self.theta,
            "history_capacity": self.config.history_capacity,
        })
    }
}
