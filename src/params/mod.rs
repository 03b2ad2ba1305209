//! Agent parameters, grids and shock distributions
//!
//! [`PortfolioParams`] is the single, fully enumerated description of a
//! portfolio-choice agent type. Defaults reproduce the standard calibration:
//! high risk aversion (5), low patience (0.90), a lognormal risky asset with
//! mean return factor 1.08 and standard deviation 0.20, and a free choice of
//! the risky share every period.
//!
//! Parameters are validated eagerly: every object derived from them calls
//! [`PortfolioParams::validate`] first, so structurally invalid agent types
//! are rejected before any numerical work starts.

mod grids;
pub mod loader;

pub use grids::{linspace, make_grid_exp_mult, merge_points};
pub use loader::{load_params, params_from_str, save_params, DEFAULT_PARAMS_PATH};

use serde::{Deserialize, Serialize};

use crate::error::{SolverError, SolverResult};
use crate::math::{IncomeShockDstn, JointShockDstn, ReturnDstn};

/// Complete parameterization of a portfolio-choice agent type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioParams {
    /// Coefficient of relative risk aversion
    pub crra: f64,

    /// Risk-free return factor
    pub rfree: f64,

    /// Intertemporal discount factor
    pub disc_fac: f64,

    // ---- Per-period sequences (length = t_cycle) ----

    /// Survival probability into the next period
    pub liv_prb: Vec<f64>,

    /// Permanent income growth factor
    pub perm_gro_fac: Vec<f64>,

    /// Standard deviation of log permanent income shocks
    pub perm_shk_std: Vec<f64>,

    /// Standard deviation of log transitory income shocks
    pub tran_shk_std: Vec<f64>,

    // ---- Income shock discretization ----

    pub perm_shk_count: usize,
    pub tran_shk_count: usize,

    /// Probability of unemployment
    pub unemp_prb: f64,

    /// Transitory income when unemployed
    pub inc_unemp: f64,

    // ---- Risky asset ----

    /// Mean risky return factor
    pub risky_avg: f64,

    /// Standard deviation of the risky return factor
    pub risky_std: f64,

    /// Number of nodes in the risky return discretization
    pub risky_count: usize,

    // ---- Portfolio choice ----

    /// Number of points in the risky share grid on [0, 1]
    pub share_count: usize,

    /// Probability of being allowed to adjust the risky share in a period
    pub adjust_prb: f64,

    /// Choose the share only from the share grid (requires `vfunc`)
    pub discrete_share: bool,

    /// Income and return shocks are independent (two-stage integration)
    pub indep_dstn: bool,

    /// Construct value functions
    pub vfunc: bool,

    // ---- End-of-period asset grid ----

    pub a_xtra_min: f64,
    pub a_xtra_max: f64,
    pub a_xtra_count: usize,

    /// Times to nest the exponential grid spacing (-1 = linear)
    pub a_xtra_nest_fac: i32,

    /// Additional asset gridpoints
    pub a_xtra_extra: Vec<f64>,

    /// Artificial borrowing constraint; must be exactly zero
    pub boro_cnst_art: f64,

    // ---- Horizon ----

    /// Number of periods in one cycle of the problem
    pub t_cycle: usize,

    /// Number of times the cycle repeats; 0 solves the infinite horizon problem
    pub cycles: u32,

    /// Convergence tolerance for the infinite horizon problem
    pub tolerance: f64,

    /// Iteration cap for the infinite horizon problem
    pub max_iterations: u32,
}

impl Default for PortfolioParams {
    fn default() -> Self {
        Self {
            crra: 5.0,
            rfree: 1.03,
            disc_fac: 0.90,
            liv_prb: vec![0.98],
            perm_gro_fac: vec![1.01],
            perm_shk_std: vec![0.1],
            tran_shk_std: vec![0.1],
            perm_shk_count: 7,
            tran_shk_count: 7,
            unemp_prb: 0.05,
            inc_unemp: 0.3,
            risky_avg: 1.08,
            risky_std: 0.20,
            risky_count: 5,
            share_count: 25,
            adjust_prb: 1.0,
            discrete_share: false,
            indep_dstn: true,
            vfunc: false,
            a_xtra_min: 0.001,
            a_xtra_max: 100.0,
            a_xtra_count: 200,
            a_xtra_nest_fac: 1,
            a_xtra_extra: Vec::new(),
            boro_cnst_art: 0.0,
            t_cycle: 1,
            cycles: 1,
            tolerance: 1e-6,
            max_iterations: 1000,
        }
    }
}

fn check_probability(field: &str, value: f64) -> SolverResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(SolverError::invalid(field, format!("must be in [0, 1], got {value}")));
    }
    Ok(())
}

fn check_positive(field: &str, value: f64) -> SolverResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(SolverError::invalid(field, format!("must be positive, got {value}")));
    }
    Ok(())
}

impl PortfolioParams {
    /// Check every structural invariant of the parameterization
    pub fn validate(&self) -> SolverResult<()> {
        // Borrowing while holding an asset with unbounded losses is not defined
        if self.boro_cnst_art != 0.0 {
            return Err(SolverError::NonZeroBorrowingConstraint(self.boro_cnst_art));
        }
        if self.discrete_share && !self.vfunc {
            return Err(SolverError::DiscreteShareWithoutValueFunction);
        }

        check_positive("crra", self.crra)?;
        check_positive("rfree", self.rfree)?;
        check_positive("disc_fac", self.disc_fac)?;
        check_positive("risky_avg", self.risky_avg)?;
        if !self.risky_std.is_finite() || self.risky_std < 0.0 {
            return Err(SolverError::invalid("risky_std", "must be non-negative"));
        }
        check_probability("adjust_prb", self.adjust_prb)?;
        check_probability("unemp_prb", self.unemp_prb)?;
        if self.unemp_prb >= 1.0 {
            return Err(SolverError::invalid("unemp_prb", "must be below 1"));
        }
        if self.inc_unemp < 0.0 {
            return Err(SolverError::invalid("inc_unemp", "must be non-negative"));
        }

        if self.t_cycle == 0 {
            return Err(SolverError::invalid("t_cycle", "must be at least 1"));
        }
        let sequences = [
            ("liv_prb", &self.liv_prb),
            ("perm_gro_fac", &self.perm_gro_fac),
            ("perm_shk_std", &self.perm_shk_std),
            ("tran_shk_std", &self.tran_shk_std),
        ];
        for (field, values) in sequences {
            if values.len() != self.t_cycle {
                return Err(SolverError::invalid(
                    field,
                    format!("has {} entries, expected t_cycle = {}", values.len(), self.t_cycle),
                ));
            }
        }
        for &p in &self.liv_prb {
            check_probability("liv_prb", p)?;
        }
        for &g in &self.perm_gro_fac {
            check_positive("perm_gro_fac", g)?;
        }
        for (field, values) in [("perm_shk_std", &self.perm_shk_std), ("tran_shk_std", &self.tran_shk_std)] {
            if values.iter().any(|s| !s.is_finite() || *s < 0.0) {
                return Err(SolverError::invalid(field, "shock standard deviations must be non-negative"));
            }
        }

        let counts = [
            ("perm_shk_count", self.perm_shk_count),
            ("tran_shk_count", self.tran_shk_count),
            ("risky_count", self.risky_count),
        ];
        for (field, count) in counts {
            if count == 0 {
                return Err(SolverError::invalid(field, "shock node counts must be positive"));
            }
        }
        if self.share_count < 2 {
            return Err(SolverError::invalid("share_count", "share grid needs at least two points"));
        }
        if self.a_xtra_count < 2 {
            return Err(SolverError::invalid("a_xtra_count", "asset grid needs at least two points"));
        }
        if !(self.a_xtra_min > 0.0 && self.a_xtra_min < self.a_xtra_max) {
            return Err(SolverError::invalid(
                "a_xtra_min",
                format!("need 0 < a_xtra_min < a_xtra_max, got {} and {}", self.a_xtra_min, self.a_xtra_max),
            ));
        }
        if self.a_xtra_extra.iter().any(|a| *a <= 0.0) {
            return Err(SolverError::invalid("a_xtra_extra", "extra asset points must be positive"));
        }
        if self.cycles == 0 {
            check_positive("tolerance", self.tolerance)?;
            if self.max_iterations == 0 {
                return Err(SolverError::invalid("max_iterations", "must be positive"));
            }
        }
        Ok(())
    }

    /// Grid of end-of-period assets above the borrowing constraint
    pub fn asset_grid(&self) -> SolverResult<Vec<f64>> {
        let grid = make_grid_exp_mult(
            self.a_xtra_min,
            self.a_xtra_max,
            self.a_xtra_count,
            self.a_xtra_nest_fac,
        )?;
        Ok(merge_points(grid, &self.a_xtra_extra))
    }

    /// Evenly spaced risky shares on [0, 1]
    pub fn share_grid(&self) -> Vec<f64> {
        linspace(0.0, 1.0, self.share_count)
    }

    /// Discretized risky return distribution
    pub fn risky_distribution(&self) -> SolverResult<ReturnDstn> {
        ReturnDstn::lognormal_from_mean_std(self.risky_avg, self.risky_std, self.risky_count)
    }

    /// Discretized income shocks for period `t` of the cycle
    pub fn income_distribution(&self, t: usize) -> SolverResult<IncomeShockDstn> {
        IncomeShockDstn::income_shocks(
            self.perm_shk_std[t],
            self.perm_shk_count,
            self.tran_shk_std[t],
            self.tran_shk_count,
            self.unemp_prb,
            self.inc_unemp,
        )
    }

    /// Joint distribution of income shocks and returns for period `t`
    pub fn joint_distribution(&self, t: usize) -> SolverResult<JointShockDstn> {
        Ok(JointShockDstn::independent(
            &self.income_distribution(t)?,
            &self.risky_distribution()?,
        ))
    }
}
