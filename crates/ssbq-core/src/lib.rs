//! SSBQ Core - MDP contract, vector utilities and policy evaluation
//!
//! This crate provides the foundational types shared by the learners,
//! the concrete environments and the command line driver.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::float_cmp)]

pub mod environment;
pub mod error;
pub mod evaluation;
pub mod types;
pub mod vectors;

pub use environment::{validate_environment, Environment, EpisodeContext, Scoring};
pub use error::{Result, SsbqError};
pub use evaluation::ValueIteration;
pub use types::{OutcomeLevel, Transition, PROBABILITY_TOLERANCE};
pub use vectors::{distribution_to_vector, format_vector, inner_product, running_mean_update};
