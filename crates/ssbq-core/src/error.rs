//! Error types for SSBQ

use thiserror::Error;

/// Main error type for SSBQ
#[derive(Error, Debug)]
pub enum SsbqError {
    #[error("Dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("Invalid coefficient {0}: expected a value in (0, 1]")]
    InvalidCoefficient(f64),

    #[error("Unrecognized state: {0}")]
    UnrecognizedState(String),

    #[error("Action {action} is not legal in state {state}")]
    IllegalAction { state: String, action: String },

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Degenerate distribution: {0}")]
    DegenerateDistribution(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Value iteration did not converge after {0} sweeps")]
    NotConverged(usize),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SsbqError {
    pub fn unrecognized_state(state: &impl std::fmt::Debug) -> Self {
        Self::UnrecognizedState(format!("{state:?}"))
    }

    pub fn illegal_action(state: &impl std::fmt::Debug, action: &impl std::fmt::Debug) -> Self {
        Self::IllegalAction {
            state: format!("{state:?}"),
            action: format!("{action:?}"),
        }
    }
}

/// Result type alias for SSBQ operations
pub type Result<T> = std::result::Result<T, SsbqError>;
