//! Portfolio Choice - Consumption, saving and risky share by backward induction
//!
//! This library provides:
//! - CRRA utility, discretized income and return shocks, interpolated function objects
//! - A one-period solver using the endogenous grid method, with continuous or
//!   discrete risky share choice and an optional value function
//! - Agents whose share can only be adjusted with some probability each period
//! - Finite and infinite horizon solutions, batch solving across agent types
//! - A controller that reads consumption and share choices off a solution

pub mod error;
pub mod math;
pub mod params;
pub mod solution;
pub mod solver;
pub mod agent;

// Re-export commonly used types
pub use error::{SolverError, SolverResult};
pub use params::{PortfolioParams, load_params, DEFAULT_PARAMS_PATH};
pub use solution::{Controls, PortfolioSolution, Regime};
pub use solver::{solve_one_period, PeriodParams, ShockDistributions};
pub use agent::{solve_batch, LifecycleSolution, PortfolioConsumerType, PortfolioController};
