//! Learner trait, shared configuration and step-size schedules

use std::collections::HashMap;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use ssbq_core::{
    distribution_to_vector, inner_product, Environment, EpisodeContext, OutcomeLevel, Result,
    SsbqError,
};

use crate::exploration::{ActionSelector, ExplorationStrategy, SelectionKind};
use crate::history::History;
use crate::state::TabularState;

/// Q-value learning rate `n^(-11/20)`
pub fn alpha(n: u64) -> f64 {
    (n as f64).powf(-11.0 / 20.0)
}

/// On-policy frequency step `n^(-4/6)`
pub fn beta(n: u64) -> f64 {
    (n as f64).powf(-4.0 / 6.0)
}

/// Real frequency and threshold step `1/n`
pub fn gamma(n: u64) -> f64 {
    1.0 / n as f64
}

/// Trait for tabular learners driven one transition at a time
pub trait Learner<E: Environment>: Send {
    /// Algorithm name
    fn name(&self) -> &str;

    /// Pick the action to take in `state`. Returns the reinit action when
    /// `ctx` reports the horizon is exhausted.
    fn choose_action(
        &mut self,
        state: &E::State,
        ctx: &mut EpisodeContext,
        rng: &mut dyn RngCore,
    ) -> Result<E::Action>;

    /// Learn from the transition `state --action--> next_state`
    fn inform(
        &mut self,
        state: &E::State,
        action: &E::Action,
        next_state: &E::State,
        ctx: &mut EpisodeContext,
        rng: &mut dyn RngCore,
    ) -> Result<()>;

    /// Read-only view of the learner's tables
    fn tables(&self) -> &TabularState<E::State, E::Action>;

    /// Reward the learner currently attaches to an outcome of rank `rank`
    fn reward_for_rank(&self, rank: f64) -> f64;

    /// Current threshold (distributional learners only)
    fn theta(&self) -> Option<f64> {
        None
    }

    /// First outcome level at which the remaining real mass falls below
    /// the target quantile (distributional learners only)
    fn quantile_level(&self) -> Option<&OutcomeLevel> {
        None
    }

    /// Parameters as JSON
    fn params(&self) -> serde_json::Value;

    fn q_value(&self, state: &E::State, action: &E::Action) -> Option<f64> {
        self.tables().q_value(state, action)
    }

    fn visit_count(&self, state: &E::State) -> u64 {
        self.tables().visit_count(state)
    }

    fn experience_count(&self, state: &E::State, action: &E::Action) -> u64 {
        self.tables().experience_count(state, action)
    }

    fn on_policy_frequency(&self) -> &HashMap<OutcomeLevel, f64> {
        self.tables().on_policy_frequency()
    }

    fn real_frequency(&self) -> &HashMap<OutcomeLevel, f64> {
        self.tables().real_frequency()
    }

    fn selection_stats(&self) -> SelectionStats {
        self.tables().selection_stats()
    }

    fn history(&self) -> &History<f64> {
        self.tables().history()
    }

    /// Expected current reward under the real outcome frequencies
    fn expected_reward(&self) -> Result<f64> {
        let levels = self.tables().outcome_levels();
        let rewards: Vec<f64> = (0..levels.len())
            .map(|rank| self.reward_for_rank(rank as f64))
            .collect();
        let frequencies = distribution_to_vector(self.real_frequency(), levels);
        inner_product(&frequencies, &rewards)
    }
}

impl<E: Environment, L: Learner<E> + ?Sized> Learner<E> for Box<L> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn choose_action(
        &mut self,
        state: &E::State,
        ctx: &mut EpisodeContext,
        rng: &mut dyn RngCore,
    ) -> Result<E::Action> {
        (**self).choose_action(state, ctx, rng)
    }

    fn inform(
        &mut self,
        state: &E::State,
        action: &E::Action,
        next_state: &E::State,
        ctx: &mut EpisodeContext,
        rng: &mut dyn RngCore,
    ) -> Result<()> {
        (**self).inform(state, action, next_state, ctx, rng)
    }

    fn tables(&self) -> &TabularState<E::State, E::Action> {
        (**self).tables()
    }

    fn reward_for_rank(&self, rank: f64) -> f64 {
        (**self).reward_for_rank(rank)
    }

    fn theta(&self) -> Option<f64> {
        (**self).theta()
    }

    fn quantile_level(&self) -> Option<&OutcomeLevel> {
        (**self).quantile_level()
    }

    fn params(&self) -> serde_json::Value {
        (**self).params()
    }
}

/// Learner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    /// Exploration probability
    pub epsilon: f64,

    pub strategy: ExplorationStrategy,

    /// Tail mass the threshold aims at; the target quantile is `1 - tau`
    pub tau: f64,

    pub initial_theta: f64,

    /// Multiplier applied to every threshold step
    pub theta_step: f64,

    /// Entries kept in the outcome history and the theta trace
    pub history_capacity: usize,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.1,
            strategy: ExplorationStrategy::EpsilonGreedy,
            tau: 0.5,
            initial_theta: 0.0,
            theta_step: 1.0,
            history_capacity: 10_000,
        }
    }
}

impl LearnerConfig {
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_strategy(mut self, strategy: ExplorationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_tau(mut self, tau: f64) -> Self {
        self.tau = tau;
        self
    }

    pub fn with_initial_theta(mut self, theta: f64) -> Self {
        self.initial_theta = theta;
        self
    }

    pub fn with_theta_step(mut self, step: f64) -> Self {
        self.theta_step = step;
        self
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(SsbqError::Config(format!(
                "epsilon must lie in [0, 1], got {}",
                self.epsilon
            )));
        }
        if !(0.0..=1.0).contains(&self.tau) {
            return Err(SsbqError::Config(format!(
                "tau must lie in [0, 1], got {}",
                self.tau
            )));
        }
        if !self.initial_theta.is_finite() {
            return Err(SsbqError::Config("initial theta must be finite".to_string()));
        }
        if !(self.theta_step.is_finite() && self.theta_step > 0.0) {
            return Err(SsbqError::Config(format!(
                "theta step must be positive, got {}",
                self.theta_step
            )));
        }
        if self.history_capacity == 0 {
            return Err(SsbqError::Config(
                "history capacity must be positive".to_string(),
            ));
        }
        self.strategy.validate()
    }

    pub(crate) fn selector(&self) -> Result<ActionSelector> {
        ActionSelector::new(self.strategy, self.epsilon)
    }
}

/// Counters of how actions were chosen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SelectionStats {
    pub sole_actions: u64,
    pub explorations: u64,
    pub exploitations: u64,
    pub softmax_draws: u64,
    pub forced_resets: u64,
}

impl SelectionStats {
    pub fn record(&mut self, kind: SelectionKind) {
        match kind {
            SelectionKind::Sole => self.sole_actions += 1,
            SelectionKind::Explore => self.explorations += 1,
            SelectionKind::Exploit => self.exploitations += 1,
            SelectionKind::Softmax => self.softmax_draws += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.sole_actions
            + self.explorations
            + self.exploitations
            + self.softmax_draws
            + self.forced_resets
    }
}

/// Shared decision step: forced reinit at the horizon, otherwise the
/// selector's pick over the learner's Q-values.
pub(crate) fn choose_with<E: Environment>(
    env: &E,
    tables: &mut TabularState<E::State, E::Action>,
    selector: &mut ActionSelector,
    state: &E::State,
    ctx: &mut EpisodeContext,
    rng: &mut dyn RngCore,
) -> Result<E::Action> {
    selector.ensure_trajectory_started(rng);
    if ctx.begin_decision() {
        tables.record_forced_reset();
        return Ok(env.reinit_action());
    }

    let actions = tables.legal_actions(state)?;
    let q_values = actions
        .iter()
        .map(|a| tables.q_value(state, a).unwrap_or(0.0))
        .collect::<Vec<_>>();
    let (action, kind) = selector.select(actions, &q_values, rng)?;
    tables.record_selection(kind);
    Ok(action)
}

/// Cost accounting for one non-reinit transition of a cost-budget
/// environment. Returns the episode score `budget - cost` when the
/// transition closes the episode at the horizon.
pub(crate) fn accrue_cost<E: Environment>(
    env: &E,
    ctx: &mut EpisodeContext,
    budget: f64,
    state: &E::State,
    next_state: &E::State,
) -> Result<Option<f64>> {
    ctx.add_cost(env.step_cost(state, next_state)?);
    if !ctx.at_horizon() {
        return Ok(None);
    }
    ctx.add_cost(env.closing_cost(next_state)?);
    Ok(Some(budget - ctx.cumulated_cost()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alpha_schedule() {
        assert_eq!(alpha(1), 1.0);
        assert_eq!(alpha(4), 4f64.powf(-11.0 / 20.0));
        assert!((alpha(4) - 0.4665).abs() < 1e-3);
        assert!(alpha(100) < alpha(10));
    }

    #[test]
    fn test_beta_and_gamma_schedules() {
        assert_eq!(beta(1), 1.0);
        assert!((beta(8) - 0.25).abs() < 1e-12);
        assert_eq!(gamma(1), 1.0);
        assert_eq!(gamma(4), 0.25);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(LearnerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_rejects_out_of_range_values() {
        let bad = [
            LearnerConfig::default().with_tau(1.5),
            LearnerConfig::default().with_tau(-0.01),
            LearnerConfig::default().with_epsilon(2.0),
            LearnerConfig::default().with_theta_step(0.0),
            LearnerConfig::default().with_history_capacity(0),
            LearnerConfig::default().with_initial_theta(f64::NAN),
            LearnerConfig::default()
                .with_strategy(ExplorationStrategy::Boltzmann { temperature: -1.0 }),
        ];
        for config in bad {
            assert!(
                matches!(config.validate(), Err(SsbqError::Config(_))),
                "{config:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_config_boundaries_are_accepted() {
        for value in [0.0, 1.0] {
            assert!(LearnerConfig::default()
                .with_tau(value)
                .with_epsilon(value)
                .validate()
                .is_ok());
        }
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: LearnerConfig =
            serde_json::from_str(r#"{"epsilon": 0.2, "strategy": {"kind": "epsilon-greedy-traj"}}"#)
                .unwrap();
        assert_eq!(config.epsilon, 0.2);
        assert_eq!(config.strategy, ExplorationStrategy::EpsilonGreedyTrajectory);
        assert_eq!(config.tau, 0.5);
        assert_eq!(config.history_capacity, 10_000);
    }

    #[test]
    fn test_selection_stats() {
        let mut stats = SelectionStats::default();
        stats.record(SelectionKind::Sole);
        stats.record(SelectionKind::Explore);
        stats.record(SelectionKind::Exploit);
        stats.record(SelectionKind::Exploit);
        stats.forced_resets += 1;
        assert_eq!(stats.exploitations, 2);
        assert_eq!(stats.total(), 5);
    }
}
