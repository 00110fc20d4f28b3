//! Configuration loading for the ssbq CLI
//!
//! Sources, lowest precedence first: built-in defaults, a TOML file, then
//! `SSBQ__`-prefixed environment variables (`SSBQ__LEARNER__TAU=0.3`).
//! Command line flags are applied on top by the `run` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use config::{ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};

use ssbq_mdps::{DataCenterConfig, GarnetsConfig, Problem};
use ssbq_rl::{LearnerConfig, SimulationConfig};

/// Name of the configuration file looked up in the working directory
pub const CONFIG_FILE: &str = "ssbq.toml";

/// Which learner drives a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// SSB Q-learning with an adaptive threshold
    Qq,
    /// Standard Q-learning on outcome ranks
    Q,
    /// Uniformly random baseline
    Random,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub problem: Problem,
    pub algorithm: Algorithm,

    /// Independent runs, seeded `seed`, `seed + 1`, ...
    pub runs: u32,

    /// Write the JSON reports here
    pub output: Option<PathBuf>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            problem: Problem::Gardner,
            algorithm: Algorithm::Qq,
            runs: 1,
            output: None,
        }
    }
}

/// Complete CLI configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub run: RunSettings,
    pub simulation: SimulationConfig,
    pub learner: LearnerConfig,
    pub garnets: GarnetsConfig,
    pub datacenter: DataCenterConfig,
}

impl Settings {
    /// Load configuration, using `explicit` instead of the usual search
    /// when given
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                Some(path.to_path_buf())
            }
            None => Self::find_config_file(),
        };

        let mut builder = ConfigBuilder::<config::builder::DefaultState>::default();
        if let Some(path) = &path {
            tracing::info!("Loading config from: {:?}", path);
            builder = builder.add_source(File::from(path.clone()).required(false));
        } else {
            tracing::debug!("No config file found, using defaults");
        }

        // Environment variables with SSBQ__ prefix
        builder = builder.add_source(
            Environment::with_prefix("SSBQ")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder
            .build()?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.run.runs == 0 {
            anyhow::bail!("at least one run is required");
        }
        self.simulation
            .validate()
            .context("Invalid [simulation] section")?;
        self.learner.validate().context("Invalid [learner] section")?;
        self.garnets.validate().context("Invalid [garnets] section")?;
        self.datacenter
            .validate()
            .context("Invalid [datacenter] section")?;
        Ok(())
    }

    /// Find the configuration file
    pub fn find_config_file() -> Option<PathBuf> {
        // Check in order: SSBQ_CONFIG env, ./ssbq.toml, ~/.config/ssbq/ssbq.toml
        if let Ok(path) = std::env::var("SSBQ_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".config").join("ssbq").join(CONFIG_FILE);
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssbq_rl::ExplorationStrategy;

    const EXAMPLE: &str = include_str!("../../../ssbq.toml.example");

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        settings.validate().unwrap();
        assert_eq!(settings.run.problem, Problem::Gardner);
        assert_eq!(settings.run.algorithm, Algorithm::Qq);
        assert_eq!(settings.learner.tau, 0.5);
    }

    #[test]
    fn test_example_file_parses() {
        let settings: Settings = toml::from_str(EXAMPLE).unwrap();
        settings.validate().unwrap();
        assert_eq!(settings.simulation, SimulationConfig::default());
        assert_eq!(settings.learner, LearnerConfig::default());
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            r#"
[run]
problem = "grid"
algorithm = "q"
runs = 4

[simulation]
steps = 5000
seed = 7

[learner]
tau = 0.25
strategy = { kind = "boltzmann", temperature = 2.0 }
"#,
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.run.problem, Problem::Grid);
        assert_eq!(settings.run.algorithm, Algorithm::Q);
        assert_eq!(settings.run.runs, 4);
        assert_eq!(settings.simulation.steps, 5000);
        assert_eq!(settings.simulation.seed, 7);
        assert_eq!(settings.simulation.observe_every, 1_000);
        assert_eq!(settings.learner.tau, 0.25);
        assert_eq!(
            settings.learner.strategy,
            ExplorationStrategy::Boltzmann { temperature: 2.0 }
        );
        assert_eq!(settings.learner.epsilon, 0.1);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[learner]\ntau = 1.5\n").unwrap();
        let err = Settings::load(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("tau"));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
