//! Simulation driver - runs a learner against an environment

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use ssbq_core::{
    EpisodeContext, Environment, OutcomeLevel, Result, Scoring, SsbqError, ValueIteration,
};

use crate::algorithm::{Learner, SelectionStats};
use crate::state::PlayedPolicy;

/// Simulation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of transitions to simulate
    pub steps: u64,

    /// Record an observation every this many steps (and after the last)
    pub observe_every: u64,

    pub seed: u64,

    /// Solve for the best-response value at each observation
    pub track_best_response: bool,

    pub value_iteration: ValueIteration,

    /// Include the empirical played policy in the report
    pub report_policy: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            steps: 100_000,
            observe_every: 1_000,
            seed: 0,
            track_best_response: true,
            value_iteration: ValueIteration::default(),
            report_policy: true,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.observe_every == 0 {
            return Err(SsbqError::Config(
                "observation interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Snapshot of a learner taken during a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub step: u64,
    /// Best Q-value at the initial state
    pub score: f64,
    pub theta: Option<f64>,
    /// Current reward expectation under the real outcome frequencies
    pub expected_reward: Option<f64>,
    /// Optimal expected reward under the learner's current rewards
    pub best_response_value: Option<f64>,
    pub quantile_level: Option<String>,
}

/// How actions were chosen, in counts and as shares of all steps
#[derive(Debug, Clone, Serialize)]
pub struct SelectionReport {
    #[serde(flatten)]
    pub stats: SelectionStats,
    pub exploration_pct: f64,
    pub exploitation_pct: f64,
    pub sole_action_pct: f64,
    pub softmax_pct: f64,
}

impl SelectionReport {
    fn new(stats: SelectionStats, steps: u64) -> Self {
        let pct = |n: u64| {
            if steps == 0 {
                0.0
            } else {
                n as f64 * 100.0 / steps as f64
            }
        };
        Self {
            exploration_pct: pct(stats.explorations),
            exploitation_pct: pct(stats.exploitations),
            sole_action_pct: pct(stats.sole_actions),
            softmax_pct: pct(stats.softmax_draws),
            stats,
        }
    }
}

/// Everything recorded about one run
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub environment: String,
    pub learner: String,
    pub seed: u64,
    pub steps: u64,
    pub episodes: u64,
    pub observations: Vec<Observation>,
    pub on_policy_frequency: Vec<(String, f64)>,
    pub real_frequency: Vec<(String, f64)>,
    pub theta: Option<f64>,
    pub selection: SelectionReport,
    pub params: serde_json::Value,
    pub history: Vec<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub played_policy: Vec<PlayedPolicy>,
}

/// Drives one learner against one environment.
///
/// The simulation owns the episode context and the random source, so
/// independent simulations share nothing and may run on separate threads.
pub struct Simulation<E: Environment, L: Learner<E> = Box<dyn Learner<E>>> {
    env: Arc<E>,
    learner: L,
    config: SimulationConfig,
    ctx: EpisodeContext,
    rng: StdRng,
    state: E::State,
    steps_done: u64,
    observations: Vec<Observation>,
    run_id: Uuid,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl<E: Environment, L: Learner<E>> Simulation<E, L> {
    pub fn new(env: Arc<E>, learner: L, config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let ctx = EpisodeContext::for_environment(env.as_ref())?;
        let rng = StdRng::seed_from_u64(config.seed);
        let state = env.initial_state().clone();
        Ok(Self {
            env,
            learner,
            config,
            ctx,
            rng,
            state,
            steps_done: 0,
            observations: Vec::new(),
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn learner(&self) -> &L {
        &self.learner
    }

    pub fn current_state(&self) -> &E::State {
        &self.state
    }

    pub fn context(&self) -> &EpisodeContext {
        &self.ctx
    }

    pub fn steps_done(&self) -> u64 {
        self.steps_done
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Simulate one transition and let the learner learn from it
    pub fn step(&mut self) -> Result<()> {
        let action = self
            .learner
            .choose_action(&self.state, &mut self.ctx, &mut self.rng)?;
        let next_state =
            self.env
                .draw_next_state(&self.state, &action, &mut self.ctx, &mut self.rng)?;
        self.learner.inform(
            &self.state,
            &action,
            &next_state,
            &mut self.ctx,
            &mut self.rng,
        )?;
        self.state = next_state;
        self.steps_done += 1;
        Ok(())
    }

    /// Snapshot the learner at the current step
    pub fn observe(&self) -> Result<Observation> {
        let tables = self.learner.tables();
        let score = tables.max_q(tables.initial_state())?;
        let outcome_scoring = self.env.scoring() == Scoring::Outcome;

        let expected_reward = if outcome_scoring {
            Some(self.learner.expected_reward()?)
        } else {
            None
        };
        let best_response_value = if outcome_scoring && self.config.track_best_response {
            Some(self.best_response_value()?)
        } else {
            None
        };

        Ok(Observation {
            step: self.steps_done,
            score,
            theta: self.learner.theta(),
            expected_reward,
            best_response_value,
            quantile_level: self.learner.quantile_level().map(ToString::to_string),
        })
    }

    /// Optimal expected reward from the initial state if every terminal
    /// state paid what the learner currently attaches to its outcome
    pub fn best_response_value(&self) -> Result<f64> {
        let mut rewards = HashMap::new();
        for state in self.env.states() {
            if self.env.is_terminal(state) {
                let rank = self.env.outcome_rank(state)?;
                rewards.insert(state.clone(), self.learner.reward_for_rank(rank as f64));
            }
        }
        self.config.value_iteration.solve(self.env.as_ref(), &rewards)
    }

    /// Run the configured number of steps, observing along the way
    pub fn run(&mut self) -> Result<()> {
        info!(
            "Starting run {} ({} on {}, {} steps, seed {})",
            self.run_id,
            self.learner.name(),
            self.env.name(),
            self.config.steps,
            self.config.seed
        );

        if self.steps_done == 0 {
            self.record_observation()?;
        }
        for step in 1..=self.config.steps {
            self.step()?;
            if step % self.config.observe_every == 0 || step == self.config.steps {
                self.record_observation()?;
            }
        }

        self.finished_at = Some(Utc::now());
        info!(
            "Run {} finished after {} steps ({} episodes)",
            self.run_id,
            self.steps_done,
            self.learner.tables().episodes()
        );
        Ok(())
    }

    fn record_observation(&mut self) -> Result<()> {
        let observation = self.observe()?;
        debug!(
            "Step {}: score {:.4}, theta {:?}, best response {:?}",
            observation.step, observation.score, observation.theta, observation.best_response_value
        );
        self.observations.push(observation);
        Ok(())
    }

    pub fn report(&self) -> SimulationReport {
        let tables = self.learner.tables();
        let ordered = |distribution: &HashMap<OutcomeLevel, f64>| {
            tables
                .outcome_levels()
                .iter()
                .map(|l| (l.to_string(), distribution.get(l).copied().unwrap_or(0.0)))
                .collect::<Vec<_>>()
        };

        SimulationReport {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: self.finished_at.unwrap_or_else(Utc::now),
            environment: self.env.name().to_string(),
            learner: self.learner.name().to_string(),
            seed: self.config.seed,
            steps: self.steps_done,
            episodes: tables.episodes(),
            observations: self.observations.clone(),
            on_policy_frequency: ordered(tables.on_policy_frequency()),
            real_frequency: ordered(tables.real_frequency()),
            theta: self.learner.theta(),
            selection: SelectionReport::new(tables.selection_stats(), self.steps_done),
            params: self.learner.params(),
            history: tables.history().to_vec(),
            played_policy: if self.config.report_policy {
                tables.played_policy()
            } else {
                Vec::new()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::LearnerConfig;
    use crate::qqlearning::DistributionalLearner;
    use crate::random::RandomLearner;
    use crate::testing::{ChoiceEnv, MeterEnv};

    fn create_test_simulation(steps: u64) -> Simulation<ChoiceEnv> {
        let env = Arc::new(ChoiceEnv::new());
        let learner: Box<dyn Learner<ChoiceEnv>> =
            Box::new(DistributionalLearner::new(env.clone(), LearnerConfig::default()).unwrap());
        let config = SimulationConfig {
            steps,
            observe_every: 10,
            seed: 5,
            ..SimulationConfig::default()
        };
        Simulation::new(env, learner, config).unwrap()
    }

    #[test]
    fn test_zero_observation_interval_rejected() {
        let env = Arc::new(ChoiceEnv::new());
        let learner = RandomLearner::new(env.clone(), 10).unwrap();
        let config = SimulationConfig {
            observe_every: 0,
            ..SimulationConfig::default()
        };
        assert!(matches!(
            Simulation::new(env, learner, config),
            Err(SsbqError::Config(_))
        ));
    }

    #[test]
    fn test_observation_schedule() {
        let mut simulation = create_test_simulation(25);
        simulation.run().unwrap();

        let steps: Vec<u64> = simulation.observations().iter().map(|o| o.step).collect();
        assert_eq!(steps, vec![0, 10, 20, 25]);
        let first = &simulation.observations()[0];
        assert_eq!(first.score, 0.0);
        assert_eq!(first.theta, Some(0.0));
        assert_eq!(simulation.steps_done(), 25);
        let last = simulation.observations().last().unwrap();
        assert!(last.theta.is_some());
        assert!(last.best_response_value.is_some());
        assert!(last.expected_reward.is_some());
    }

    #[test]
    fn test_episodes_alternate_with_reinit() {
        let mut simulation = create_test_simulation(40);
        simulation.run().unwrap();
        // Every episode is one decision followed by a reinit
        assert_eq!(simulation.learner().tables().episodes(), 20);
    }

    #[test]
    fn test_same_seed_same_run() {
        let mut a = create_test_simulation(500);
        let mut b = create_test_simulation(500);
        a.run().unwrap();
        b.run().unwrap();
        assert_eq!(a.observations(), b.observations());
        assert_ne!(a.run_id(), b.run_id());
    }

    #[test]
    fn test_report() {
        let mut simulation = create_test_simulation(100);
        simulation.run().unwrap();
        let report = simulation.report();

        assert_eq!(report.environment, "choice");
        assert_eq!(report.learner, "ssb_q_learning");
        assert_eq!(report.steps, 100);
        assert_eq!(report.episodes, 50);
        assert_eq!(report.history.len(), 50);
        let levels: Vec<&str> = report.real_frequency.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(levels, vec!["low", "mid", "high"]);
        let mass: f64 = report.real_frequency.iter().map(|(_, p)| p).sum();
        assert!((mass - 1.0).abs() < 1e-9);
        assert!(!report.played_policy.is_empty());

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["run_id"].is_string());
        assert!(json["selection"]["exploration_pct"].is_number());
        assert!(json["selection"]["forced_resets"].is_number());
    }

    #[test]
    fn test_cost_budget_observations_skip_reward_terms() {
        let env = Arc::new(MeterEnv::new());
        let learner = DistributionalLearner::new(env.clone(), LearnerConfig::default()).unwrap();
        let config = SimulationConfig {
            steps: 30,
            observe_every: 10,
            ..SimulationConfig::default()
        };
        let mut simulation = Simulation::new(env, learner, config).unwrap();
        simulation.run().unwrap();

        let observation = simulation.observations().last().unwrap();
        assert_eq!(observation.expected_reward, None);
        assert_eq!(observation.best_response_value, None);
        // Three steps per episode: two decisions and the forced reinit
        assert_eq!(simulation.learner().tables().episodes(), 10);
        assert_eq!(simulation.learner().selection_stats().forced_resets, 10);
    }
}
