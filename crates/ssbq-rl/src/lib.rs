//! SSBQ RL - tabular Q-learning under Skew-Symmetric Bilinear utility
//!
//! This crate provides the learners (standard Q-learning, the SSB "QQ"
//! variant with its adaptive threshold, and a random baseline), the
//! exploration strategies they share, and a simulation driver that runs a
//! learner against an environment and records diagnostics.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::float_cmp)]
#![allow(clippy::similar_names)]

pub mod algorithm;
pub mod engine;
pub mod exploration;
pub mod history;
pub mod qlearning;
pub mod qqlearning;
pub mod random;
pub mod state;

#[cfg(test)]
mod testing;

pub use algorithm::{alpha, beta, gamma, Learner, LearnerConfig, SelectionStats};
pub use engine::{Observation, SelectionReport, Simulation, SimulationConfig, SimulationReport};
pub use exploration::{ActionSelector, ExplorationStrategy, SelectionKind};
pub use history::History;
pub use qlearning::StandardLearner;
pub use qqlearning::DistributionalLearner;
pub use random::RandomLearner;
pub use state::{PlayedPolicy, TabularState};
