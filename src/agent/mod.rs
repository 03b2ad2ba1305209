//! Portfolio-choice agent type: backward induction over the life cycle
//!
//! A [`PortfolioConsumerType`] owns validated parameters plus everything that
//! can be built from them once: grids, discretized shocks for each period of
//! the cycle, and the limiting risky share. [`PortfolioConsumerType::solve`]
//! then runs the period solver backwards from the terminal solution.
//!
//! Finite horizons repeat the cycle `cycles` times. With `cycles == 0` the
//! cycle is iterated until the adjust-regime consumption functions stop moving.

mod controller;

pub use controller::{draw_adjust_flags, AgentState, PortfolioController};

use log::{debug, info};
use rayon::prelude::*;

use crate::error::{SolverError, SolverResult};
use crate::params::PortfolioParams;
use crate::solution::PortfolioSolution;
use crate::solver::{merton_samuelson_share, solve_one_period, PeriodParams, ShockDistributions};

/// Solutions for every period, first period first
#[derive(Debug, Clone)]
pub struct LifecycleSolution {
    /// Period solutions in chronological order
    pub periods: Vec<PortfolioSolution>,

    /// Whether this is the converged cycle of an infinite horizon problem
    pub infinite_horizon: bool,

    /// Backward passes over the cycle
    pub iterations: u32,

    /// Final distance between successive cycles (0 for finite horizons)
    pub distance: f64,
}

impl LifecycleSolution {
    pub fn period(&self, t: usize) -> Option<&PortfolioSolution> {
        self.periods.get(t)
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }
}

/// Agent type with precomputed grids and shock distributions
#[derive(Debug, Clone)]
pub struct PortfolioConsumerType {
    params: PortfolioParams,
    a_xtra_grid: Vec<f64>,
    share_grid: Vec<f64>,
    shocks: Vec<ShockDistributions>,
    share_limit: f64,
}

impl PortfolioConsumerType {
    /// Validate parameters and build grids, shocks and the limiting share
    pub fn new(params: PortfolioParams) -> SolverResult<Self> {
        params.validate()?;
        let a_xtra_grid = params.asset_grid()?;
        let share_grid = params.share_grid();
        let risky = params.risky_distribution()?;
        let shocks = (0..params.t_cycle)
            .map(|t| {
                Ok(ShockDistributions::independent(
                    params.income_distribution(t)?,
                    risky.clone(),
                ))
            })
            .collect::<SolverResult<Vec<_>>>()?;
        let share_limit = merton_samuelson_share(&risky, params.rfree, params.crra);
        debug!("Limiting risky share {:.4}", share_limit);

        Ok(Self {
            params,
            a_xtra_grid,
            share_grid,
            shocks,
            share_limit,
        })
    }

    pub fn params(&self) -> &PortfolioParams {
        &self.params
    }

    pub fn asset_grid(&self) -> &[f64] {
        &self.a_xtra_grid
    }

    pub fn share_grid(&self) -> &[f64] {
        &self.share_grid
    }

    /// Limiting risky share as wealth grows without bound
    pub fn share_limit(&self) -> f64 {
        self.share_limit
    }

    /// Shock distributions faced at the end of period `t` of the cycle
    pub fn shocks(&self, t: usize) -> Option<&ShockDistributions> {
        self.shocks.get(t)
    }

    /// Per-period parameters for period `t` of the cycle
    pub fn period_params(&self, t: usize) -> PeriodParams {
        let p = &self.params;
        PeriodParams {
            liv_prb: p.liv_prb[t],
            disc_fac: p.disc_fac,
            crra: p.crra,
            rfree: p.rfree,
            perm_gro_fac: p.perm_gro_fac[t],
            boro_cnst_art: p.boro_cnst_art,
            adjust_prb: p.adjust_prb,
            share_limit: self.share_limit,
            vfunc: p.vfunc,
            discrete_share: p.discrete_share,
            indep_dstn: p.indep_dstn,
        }
    }

    pub fn solution_terminal(&self) -> PortfolioSolution {
        PortfolioSolution::terminal(self.params.crra, self.params.adjust_prb)
    }

    /// One backward pass over the cycle, ending at `next`
    fn solve_cycle(&self, next: &PortfolioSolution) -> SolverResult<Vec<PortfolioSolution>> {
        let mut cycle: Vec<PortfolioSolution> = Vec::with_capacity(self.params.t_cycle);
        for t in (0..self.params.t_cycle).rev() {
            let after = cycle.last().unwrap_or(next);
            let solution = solve_one_period(
                after,
                &self.shocks[t],
                &self.period_params(t),
                &self.a_xtra_grid,
                &self.share_grid,
            )?;
            cycle.push(solution);
        }
        cycle.reverse();
        Ok(cycle)
    }

    /// Solve the agent's problem by backward induction
    pub fn solve(&self) -> SolverResult<LifecycleSolution> {
        if self.params.cycles == 0 {
            self.solve_infinite_horizon()
        } else {
            self.solve_finite_horizon()
        }
    }

    fn solve_finite_horizon(&self) -> SolverResult<LifecycleSolution> {
        let cycles = self.params.cycles;
        let mut periods = vec![self.solution_terminal()];
        for k in 0..cycles {
            let cycle = self.solve_cycle(&periods[0])?;
            periods.splice(0..0, cycle);
            debug!("Solved cycle {} of {}", k + 1, cycles);
        }
        info!("Solved {} periods plus the terminal period", periods.len() - 1);
        Ok(LifecycleSolution {
            periods,
            infinite_horizon: false,
            iterations: cycles,
            distance: 0.0,
        })
    }

    fn solve_infinite_horizon(&self) -> SolverResult<LifecycleSolution> {
        let mut cycle = vec![self.solution_terminal()];
        let mut distance = f64::INFINITY;

        for iteration in 1..=self.params.max_iterations {
            let next = self.solve_cycle(&cycle[0])?;
            distance = next[0].distance(&cycle[0], &self.a_xtra_grid);
            cycle = next;
            debug!("Iteration {}: distance {:.3e}", iteration, distance);

            if distance < self.params.tolerance {
                info!("Converged after {} iterations (distance {:.3e})", iteration, distance);
                return Ok(LifecycleSolution {
                    periods: cycle,
                    infinite_horizon: true,
                    iterations: iteration,
                    distance,
                });
            }
        }

        Err(SolverError::NoConvergence {
            iterations: self.params.max_iterations,
            distance,
        })
    }
}

/// Solve several agent types in parallel
pub fn solve_batch(params: &[PortfolioParams]) -> Vec<SolverResult<LifecycleSolution>> {
    params
        .par_iter()
        .map(|p| PortfolioConsumerType::new(p.clone())?.solve())
        .collect()
}
