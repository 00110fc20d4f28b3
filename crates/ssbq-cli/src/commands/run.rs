//! Run simulations

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::info;

use ssbq_core::{Environment, OutcomeLevel};
use ssbq_mdps::{
    DataCenter, GardnerDice, Garnets, Grid, Millionaire, Problem, SequentialGardnerDice,
};
use ssbq_rl::{
    DistributionalLearner, ExplorationStrategy, Learner, LearnerConfig, RandomLearner,
    Simulation, SimulationConfig, SimulationReport, StandardLearner,
};

use crate::config::{Algorithm, Settings};

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Problem to solve (see `ssbq problems`)
    pub problem: Option<Problem>,

    /// Learning algorithm
    #[arg(short, long, value_enum)]
    pub algorithm: Option<Algorithm>,

    /// Number of transitions per run
    #[arg(short, long)]
    pub steps: Option<u64>,

    /// Record an observation every N steps
    #[arg(long)]
    pub observe_every: Option<u64>,

    /// Exploration probability
    #[arg(short, long)]
    pub epsilon: Option<f64>,

    /// Tail mass aimed at by the threshold
    #[arg(long)]
    pub tau: Option<f64>,

    /// Initial threshold
    #[arg(long)]
    pub theta: Option<f64>,

    /// Threshold step multiplier
    #[arg(long)]
    pub theta_step: Option<f64>,

    /// Exploration strategy: epsilon-greedy, epsilon-greedy-traj, boltzmann
    #[arg(long)]
    pub strategy: Option<ExplorationStrategy>,

    /// Boltzmann temperature (implies --strategy boltzmann)
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Seed of the first run
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of independent runs
    #[arg(short, long)]
    pub runs: Option<u32>,

    /// Skip the best-response computation at each observation
    #[arg(long)]
    pub no_best_response: bool,

    /// Write the JSON reports to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Configuration file to use instead of the default search
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl RunArgs {
    /// Layer the command line flags over `settings`
    pub fn apply(&self, settings: &mut Settings) -> Result<()> {
        if let Some(problem) = self.problem {
            settings.run.problem = problem;
        }
        if let Some(algorithm) = self.algorithm {
            settings.run.algorithm = algorithm;
        }
        if let Some(runs) = self.runs {
            settings.run.runs = runs;
        }
        if let Some(output) = &self.output {
            settings.run.output = Some(output.clone());
        }

        let simulation = &mut settings.simulation;
        if let Some(steps) = self.steps {
            simulation.steps = steps;
        }
        if let Some(every) = self.observe_every {
            simulation.observe_every = every;
        }
        if let Some(seed) = self.seed {
            simulation.seed = seed;
        }
        if self.no_best_response {
            simulation.track_best_response = false;
        }

        let learner = &mut settings.learner;
        if let Some(epsilon) = self.epsilon {
            learner.epsilon = epsilon;
        }
        if let Some(tau) = self.tau {
            learner.tau = tau;
        }
        if let Some(theta) = self.theta {
            learner.initial_theta = theta;
        }
        if let Some(step) = self.theta_step {
            learner.theta_step = step;
        }
        if let Some(strategy) = self.strategy {
            learner.strategy = strategy;
        }
        if let Some(temperature) = self.temperature {
            learner.strategy = ExplorationStrategy::Boltzmann { temperature };
        }

        settings.validate()
    }
}

/// Report of one run plus its distance to the known equilibrium
#[derive(Debug, Serialize)]
pub struct RunOutcome {
    #[serde(flatten)]
    pub report: SimulationReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equilibrium_distance: Option<f64>,
}

pub async fn run(args: RunArgs) -> Result<()> {
    let mut settings = Settings::load(args.config.as_deref())?;
    args.apply(&mut settings)?;

    let problem = settings.run.problem;
    info!(
        "Running {} x {:?} on {} ({} steps each)",
        settings.run.runs, settings.run.algorithm, problem, settings.simulation.steps
    );

    let mut tasks = JoinSet::new();
    for offset in 0..settings.run.runs {
        let mut run_settings = settings.clone();
        run_settings.simulation.seed = settings.simulation.seed + u64::from(offset);
        tasks.spawn_blocking(move || run_problem(&run_settings));
    }

    let mut outcomes = Vec::with_capacity(settings.run.runs as usize);
    while let Some(joined) = tasks.join_next().await {
        outcomes.push(joined.context("Simulation task failed")??);
    }
    outcomes.sort_by_key(|o| o.report.seed);

    print_summary(problem, &outcomes);

    if let Some(path) = &settings.run.output {
        let json = serde_json::to_string_pretty(&outcomes)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        println!("\nReport written to {}", path.display());
    }

    Ok(())
}

/// Build the problem and run one simulation with `settings`
pub fn run_problem(settings: &Settings) -> Result<RunOutcome> {
    match settings.run.problem {
        Problem::Gardner => {
            let env = GardnerDice::new();
            let equilibrium = env.equilibrium();
            simulate(Arc::new(env), settings, Some(equilibrium))
        }
        Problem::SequentialGardner => {
            let env = SequentialGardnerDice::new();
            let equilibrium = env.equilibrium();
            simulate(Arc::new(env), settings, Some(equilibrium))
        }
        Problem::Grid => {
            let env = Grid::new();
            let equilibrium = env.equilibrium();
            simulate(Arc::new(env), settings, Some(equilibrium))
        }
        Problem::Garnets => {
            let env = Garnets::new(settings.garnets)?;
            simulate(Arc::new(env), settings, None)
        }
        Problem::DataCenter => {
            let env = DataCenter::new(settings.datacenter.clone())?;
            simulate(Arc::new(env), settings, None)
        }
        Problem::Million => {
            let env = Millionaire::new();
            let equilibrium = env.equilibrium();
            simulate(Arc::new(env), settings, Some(equilibrium))
        }
    }
}

fn build_learner<E: Environment + 'static>(
    env: &Arc<E>,
    algorithm: Algorithm,
    config: &LearnerConfig,
) -> Result<Box<dyn Learner<E>>> {
    Ok(match algorithm {
        Algorithm::Qq => Box::new(DistributionalLearner::new(env.clone(), config.clone())?),
        Algorithm::Q => Box::new(StandardLearner::new(env.clone(), config.clone())?),
        Algorithm::Random => Box::new(RandomLearner::new(env.clone(), config.history_capacity)?),
    })
}

fn simulate<E: Environment + 'static>(
    env: Arc<E>,
    settings: &Settings,
    equilibrium: Option<Vec<(OutcomeLevel, f64)>>,
) -> Result<RunOutcome> {
    let learner = build_learner(&env, settings.run.algorithm, &settings.learner)?;
    let config: SimulationConfig = settings.simulation.clone();
    let mut simulation: Simulation<E> = Simulation::new(env, learner, config)?;
    simulation
        .run()
        .with_context(|| format!("Run with seed {} failed", settings.simulation.seed))?;

    let report = simulation.report();
    let equilibrium_distance = equilibrium.map(|target| total_variation(&report, &target));
    Ok(RunOutcome {
        report,
        equilibrium_distance,
    })
}

/// Total variation distance between the real outcome frequencies and
/// `target`
fn total_variation(report: &SimulationReport, target: &[(OutcomeLevel, f64)]) -> f64 {
    let diff: f64 = target
        .iter()
        .map(|(level, p)| {
            let real = report
                .real_frequency
                .iter()
                .find(|(l, _)| l == level.as_str())
                .map_or(0.0, |(_, q)| *q);
            (real - p).abs()
        })
        .sum();
    diff / 2.0
}

fn print_summary(problem: Problem, outcomes: &[RunOutcome]) {
    println!("Problem: {problem} ({})", problem.description());
    println!(
        "{:>8} {:>10} {:>12} {:>10} {:>10}",
        "seed", "episodes", "score", "theta", "distance"
    );
    for outcome in outcomes {
        let report = &outcome.report;
        let score = report.observations.last().map_or(0.0, |o| o.score);
        let theta = report
            .theta
            .map_or_else(|| "-".to_string(), |t| format!("{t:.4}"));
        let distance = outcome
            .equilibrium_distance
            .map_or_else(|| "-".to_string(), |d| format!("{d:.4}"));
        println!(
            "{:>8} {:>10} {:>12.4} {:>10} {:>10}",
            report.seed, report.episodes, score, theta, distance
        );
    }
}
