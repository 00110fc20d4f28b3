//! Integration tests for the learners
//!
//! These tests run complete simulations on a three-outcome problem and
//! check the long-run behaviour of the threshold and frequencies.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::float_cmp)]

use std::sync::Arc;

use ssbq_core::{validate_environment, Environment, OutcomeLevel, Result, SsbqError, Transition};
use ssbq_rl::{
    DistributionalLearner, ExplorationStrategy, Learner, LearnerConfig, RandomLearner,
    Simulation, SimulationConfig, StandardLearner,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Stage {
    Choose,
    Poor,
    Fair,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Move {
    Cautious,
    Bold,
    Again,
}

/// One decision between two lotteries. Outcome levels are poor < fair <
/// rich; rich is declared but unreachable.
struct Lottery {
    states: Vec<Stage>,
    actions: Vec<Move>,
    levels: Vec<OutcomeLevel>,
}

impl Lottery {
    fn new() -> Self {
        Self {
            states: vec![Stage::Choose, Stage::Poor, Stage::Fair],
            actions: vec![Move::Cautious, Move::Bold, Move::Again],
            levels: vec!["poor".into(), "fair".into(), "rich".into()],
        }
    }
}

impl Environment for Lottery {
    type State = Stage;
    type Action = Move;

    fn name(&self) -> &str {
        "lottery"
    }

    fn states(&self) -> &[Stage] {
        &self.states
    }

    fn actions(&self) -> &[Move] {
        &self.actions
    }

    fn outcome_levels(&self) -> &[OutcomeLevel] {
        &self.levels
    }

    fn legal_actions(&self, state: &Stage) -> Result<Vec<Move>> {
        Ok(match state {
            Stage::Choose => vec![Move::Cautious, Move::Bold],
            Stage::Poor | Stage::Fair => vec![Move::Again],
        })
    }

    fn is_terminal(&self, state: &Stage) -> bool {
        !matches!(state, Stage::Choose)
    }

    fn outcome_of(&self, state: &Stage) -> Result<OutcomeLevel> {
        match state {
            Stage::Poor => Ok("poor".into()),
            Stage::Fair => Ok("fair".into()),
            Stage::Choose => Err(SsbqError::unrecognized_state(state)),
        }
    }

    fn transition(&self, state: &Stage, action: &Move) -> Result<Transition<Stage>> {
        match (state, action) {
            (_, Move::Again) => Ok(Transition::certain(Stage::Choose)),
            (Stage::Choose, Move::Cautious) => {
                Ok(Transition::new(vec![(Stage::Poor, 0.8), (Stage::Fair, 0.2)]))
            }
            (Stage::Choose, Move::Bold) => {
                Ok(Transition::new(vec![(Stage::Poor, 0.2), (Stage::Fair, 0.8)]))
            }
            _ => Err(SsbqError::illegal_action(state, action)),
        }
    }

    fn initial_state(&self) -> &Stage {
        &Stage::Choose
    }

    fn reinit_action(&self) -> Move {
        Move::Again
    }
}

fn simulation_config(steps: u64, seed: u64) -> SimulationConfig {
    SimulationConfig {
        steps,
        observe_every: 1_000,
        seed,
        ..SimulationConfig::default()
    }
}

fn frequency(distribution: &std::collections::HashMap<OutcomeLevel, f64>, level: &str) -> f64 {
    distribution
        .get(&OutcomeLevel::from(level))
        .copied()
        .unwrap_or(0.0)
}

#[test]
fn test_lottery_is_valid() {
    validate_environment(&Lottery::new()).unwrap();
}

/// With tau 0.5 the threshold settles where the bold lottery pays 0.5 in
/// expectation: 0.8 (2 - theta) = 0.5, theta = 1.375.
#[test]
fn test_threshold_and_frequencies_converge() {
    let env = Arc::new(Lottery::new());
    let config = LearnerConfig::default()
        .with_epsilon(0.1)
        .with_tau(0.5)
        .with_initial_theta(0.0)
        .with_theta_step(1.0);
    let learner = DistributionalLearner::new(env.clone(), config).unwrap();
    let mut simulation = Simulation::new(env, learner, simulation_config(60_000, 42)).unwrap();
    simulation.run().unwrap();

    let learner = simulation.learner();
    let theta = learner.theta().unwrap();
    assert!((1.0..=2.0).contains(&theta), "theta {theta}");

    // Greedy plays bold, exploration picks uniformly half the time:
    // P(bold) = 0.95, so fair is reached with 0.95 * 0.8 + 0.05 * 0.2
    let expected_fair = 0.77;
    let real = learner.real_frequency();
    let tv = (frequency(real, "fair") - expected_fair).abs() + frequency(real, "rich");
    assert!(tv < 0.05, "total variation {tv}, frequencies {real:?}");

    let bold = learner.q_value(&Stage::Choose, &Move::Bold).unwrap();
    let cautious = learner.q_value(&Stage::Choose, &Move::Cautious).unwrap();
    assert!(bold > cautious);
}

#[test]
fn test_trajectory_exploration_leaves_on_policy_untouched() {
    let env = Arc::new(Lottery::new());
    let config = LearnerConfig::default()
        .with_strategy(ExplorationStrategy::EpsilonGreedyTrajectory)
        .with_epsilon(1.0);
    let learner = DistributionalLearner::new(env.clone(), config).unwrap();
    let mut simulation = Simulation::new(env, learner, simulation_config(2_000, 7)).unwrap();
    simulation.run().unwrap();

    let learner = simulation.learner();
    assert_eq!(learner.tables().on_policy_episodes(), 0);
    for p in learner.on_policy_frequency().values() {
        assert!((p - 1.0 / 3.0).abs() < 1e-12);
    }

    // Uniform play: poor and fair are equally likely, rich never happens
    let real = learner.real_frequency();
    assert!((frequency(real, "fair") - 0.5).abs() < 0.06, "{real:?}");
    assert_eq!(frequency(real, "rich"), 0.0);
}

#[test]
fn test_exploratory_choices_mark_trajectories() {
    let env = Arc::new(Lottery::new());
    let config = LearnerConfig::default().with_epsilon(0.5);
    let learner = DistributionalLearner::new(env.clone(), config).unwrap();
    let mut simulation = Simulation::new(env, learner, simulation_config(4_000, 9)).unwrap();
    simulation.run().unwrap();

    let tables = simulation.learner().tables();
    let on_policy_share = tables.on_policy_episodes() as f64 / tables.episodes() as f64;
    assert!((on_policy_share - 0.5).abs() < 0.05, "share {on_policy_share}");
}

#[test]
fn test_standard_learner_with_outcome_rewards() {
    let env = Arc::new(Lottery::new());
    let learner = StandardLearner::new(env.clone(), LearnerConfig::default())
        .unwrap()
        .with_outcome_rewards(vec![0.0, 1.0, 2.0])
        .unwrap();
    let mut simulation = Simulation::new(env, learner, simulation_config(20_000, 3)).unwrap();
    simulation.run().unwrap();

    let learner = simulation.learner();
    let bold = learner.q_value(&Stage::Choose, &Move::Bold).unwrap();
    assert!((bold - 0.8).abs() < 0.1, "bold {bold}");
    assert_eq!(learner.theta(), None);

    let observation = simulation.observations().last().unwrap();
    assert!((observation.best_response_value.unwrap() - 0.8).abs() < 1e-9);
}

#[test]
fn test_boxed_learners_share_a_driver() {
    let env = Arc::new(Lottery::new());
    let learners: Vec<Box<dyn Learner<Lottery>>> = vec![
        Box::new(DistributionalLearner::new(env.clone(), LearnerConfig::default()).unwrap()),
        Box::new(StandardLearner::new(env.clone(), LearnerConfig::default()).unwrap()),
        Box::new(RandomLearner::new(env.clone(), 100).unwrap()),
    ];

    for learner in learners {
        let mut simulation: Simulation<Lottery> =
            Simulation::new(env.clone(), learner, simulation_config(1_000, 1)).unwrap();
        simulation.run().unwrap();
        let report = simulation.report();
        assert_eq!(report.steps, 1_000);
        assert_eq!(report.episodes, 500);
        assert_eq!(report.observations.len(), 2);
        assert_eq!(report.observations[0].step, 0);
    }
}

#[test]
fn test_history_is_bounded() {
    let env = Arc::new(Lottery::new());
    let config = LearnerConfig::default().with_history_capacity(100);
    let learner = DistributionalLearner::new(env.clone(), config).unwrap();
    let mut simulation = Simulation::new(env, learner, simulation_config(1_000, 2)).unwrap();
    simulation.run().unwrap();

    let learner = simulation.learner();
    assert_eq!(learner.history().len(), 100);
    assert_eq!(learner.history().total_pushed(), 500);
    assert_eq!(learner.theta_trace().len(), 100);
}
