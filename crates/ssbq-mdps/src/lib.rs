//! SSBQ MDPs - benchmark decision problems
//!
//! Concrete [`ssbq_core::Environment`] implementations used to exercise
//! the learners: Gardner's non-transitive dice (one-shot and sequential),
//! a 3x3 grid with cyclic preferences, random garnet MDPs, data-center
//! server provisioning under a cost budget, and the "who wants to be a
//! millionaire" trivia game.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::float_cmp)]

pub mod datacenter;
pub mod gardner;
pub mod garnets;
pub mod grid;
pub mod million;
pub mod problem;

pub use datacenter::{DataCenter, DataCenterConfig, Provision, ServerLoad};
pub use gardner::{DiceMove, DiceState, Die, GardnerDice, SequentialGardnerDice};
pub use garnets::{GarnetMove, Garnets, GarnetsConfig};
pub use grid::{Cell, Grid, GridMove};
pub use million::{Lifelines, Millionaire, QuizMove, QuizState};
pub use problem::Problem;

use ssbq_core::{OutcomeLevel, Result, SsbqError};

/// Position of `level` among `levels`
pub(crate) fn rank_of(levels: &[OutcomeLevel], level: &OutcomeLevel) -> Result<usize> {
    levels
        .iter()
        .position(|l| l == level)
        .ok_or_else(|| SsbqError::Config(format!("unknown outcome level {level}")))
}

/// Preference of a strictly increasing scale: +10 for the higher level,
/// -10 for the lower one
pub(crate) fn ordinal_preference(rank: usize, other: usize) -> f64 {
    match rank.cmp(&other) {
        std::cmp::Ordering::Greater => 10.0,
        std::cmp::Ordering::Less => -10.0,
        std::cmp::Ordering::Equal => 0.0,
    }
}
