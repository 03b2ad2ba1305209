//! Error types shared by the solver, the parameter layer and the function objects

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SolverError {
    /// The artificial borrowing constraint must be exactly zero for a portfolio agent
    #[error("portfolio choice requires an artificial borrowing constraint of exactly 0.0, got {0}")]
    NonZeroBorrowingConstraint(f64),

    /// Discrete share choice compares values across the share grid
    #[error("discrete risky share optimization requires value function construction (vfunc must be enabled)")]
    DiscreteShareWithoutValueFunction,

    #[error("Invalid parameter {field}: {reason}")]
    InvalidParameter { field: String, reason: String },

    #[error("Invalid interpolation nodes: {0}")]
    InvalidNodes(String),

    #[error("Invalid distribution: {0}")]
    InvalidDistribution(String),

    /// A value function was requested from a solution built without one
    #[error("value function for the {0} regime was not computed (enable vfunc)")]
    ValueFunctionNotComputed(&'static str),

    #[error("Convergence failure: infinite horizon solution did not converge after {iterations} iterations (distance: {distance})")]
    NoConvergence { iterations: u32, distance: f64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SolverError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        SolverError::InvalidParameter {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

pub type SolverResult<T> = Result<T, SolverError>;
