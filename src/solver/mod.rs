//! One-period solver for the consumption / risky share problem
//!
//! Given next period's [`PortfolioSolution`], the shock distributions and this
//! period's parameters, [`solve_one_period`] produces this period's solution by
//! the endogenous grid method:
//! - End-of-period marginal values are integrated over (asset, share) pairs,
//!   either in two stages (income shocks, then returns) or over the joint
//!   distribution in one pass.
//! - The share is chosen per asset gridpoint, continuously from the first-order
//!   condition or discretely from end-of-period values.
//! - Consumption is inverted from the Euler equation and paired with the
//!   endogenous market resources gridpoints.

mod expectations;
mod limits;
mod period;
mod share;

pub use expectations::{EndOfPeriod, EndOfPeriodValue};
pub use limits::{asymptotic_limits, merton_samuelson_share, AsymptoticLimits};
pub use period::solve_one_period;

use crate::error::{SolverError, SolverResult};
use crate::math::{IncomeShockDstn, JointShockDstn, ReturnDstn};

/// Parameters that apply to a single period of the problem
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodParams {
    /// Survival probability into next period
    pub liv_prb: f64,

    /// Intertemporal discount factor
    pub disc_fac: f64,

    /// Coefficient of relative risk aversion
    pub crra: f64,

    /// Risk-free return factor
    pub rfree: f64,

    /// Permanent income growth factor
    pub perm_gro_fac: f64,

    /// Artificial borrowing constraint; anything but 0.0 is rejected
    pub boro_cnst_art: f64,

    /// Probability of being able to adjust the share next period
    pub adjust_prb: f64,

    /// Limiting risky share as wealth grows without bound
    pub share_limit: f64,

    /// Build value functions
    pub vfunc: bool,

    /// Pick the share from the share grid by comparing values
    pub discrete_share: bool,

    /// Integrate income shocks and returns in two stages
    pub indep_dstn: bool,
}

impl PeriodParams {
    /// Effective discount factor including survival
    pub fn disc_eff(&self) -> f64 {
        self.disc_fac * self.liv_prb
    }

    /// Reject configurations the solver cannot handle
    pub fn validate(&self) -> SolverResult<()> {
        if self.boro_cnst_art != 0.0 {
            return Err(SolverError::NonZeroBorrowingConstraint(self.boro_cnst_art));
        }
        if self.discrete_share && !self.vfunc {
            return Err(SolverError::DiscreteShareWithoutValueFunction);
        }
        if !(0.0..=1.0).contains(&self.adjust_prb) {
            return Err(SolverError::invalid("adjust_prb", "must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.share_limit) {
            return Err(SolverError::invalid("share_limit", "must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.liv_prb) {
            return Err(SolverError::invalid("liv_prb", "must be in [0, 1]"));
        }
        let positive = [
            ("crra", self.crra),
            ("rfree", self.rfree),
            ("perm_gro_fac", self.perm_gro_fac),
            ("disc_fac", self.disc_fac),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(SolverError::invalid(field, format!("must be positive, got {value}")));
            }
        }
        Ok(())
    }
}

/// Shock distributions faced between this period and the next
#[derive(Debug, Clone)]
pub struct ShockDistributions {
    /// Permanent and transitory income shocks
    pub income: IncomeShockDstn,

    /// Risky return factor
    pub risky: ReturnDstn,

    /// Joint distribution of income shocks and returns
    pub joint: JointShockDstn,
}

impl ShockDistributions {
    /// Bundle independent income and return distributions
    pub fn independent(income: IncomeShockDstn, risky: ReturnDstn) -> Self {
        let joint = JointShockDstn::independent(&income, &risky);
        Self {
            income,
            risky,
            joint,
        }
    }

    /// Natural borrowing constraint is zero exactly when income can fall to zero
    pub fn natural_constraint_is_zero(&self) -> bool {
        self.income.min_tran_shock() == 0.0
    }
}

/// Check a share grid: at least two points, increasing, inside [0, 1]
pub(crate) fn check_share_grid(share_grid: &[f64]) -> SolverResult<()> {
    if share_grid.len() < 2 {
        return Err(SolverError::invalid("share_count", "share grid needs at least two points"));
    }
    if share_grid.iter().any(|s| !(0.0..=1.0).contains(s))
        || share_grid.windows(2).any(|w| w[1] <= w[0])
    {
        return Err(SolverError::invalid(
            "share_count",
            "share grid must be strictly increasing within [0, 1]",
        ));
    }
    Ok(())
}

/// Check an asset grid: at least two positive, strictly increasing points
pub(crate) fn check_asset_grid(a_xtra_grid: &[f64]) -> SolverResult<()> {
    if a_xtra_grid.len() < 2 {
        return Err(SolverError::invalid("a_xtra_count", "asset grid needs at least two points"));
    }
    if a_xtra_grid[0] <= 0.0 || a_xtra_grid.windows(2).any(|w| w[1] <= w[0]) {
        return Err(SolverError::invalid(
            "a_xtra_min",
            "asset grid must be positive and strictly increasing",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> PeriodParams {
        PeriodParams {
            liv_prb: 0.98,
            disc_fac: 0.9,
            crra: 5.0,
            rfree: 1.03,
            perm_gro_fac: 1.01,
            boro_cnst_art: 0.0,
            adjust_prb: 1.0,
            share_limit: 0.5,
            vfunc: false,
            discrete_share: false,
            indep_dstn: true,
        }
    }

    #[test]
    fn test_period_params_validation() {
        assert!(params().validate().is_ok());
        assert!(matches!(
            PeriodParams { boro_cnst_art: 0.1, ..params() }.validate(),
            Err(SolverError::NonZeroBorrowingConstraint(_))
        ));
        assert!(matches!(
            PeriodParams { discrete_share: true, ..params() }.validate(),
            Err(SolverError::DiscreteShareWithoutValueFunction)
        ));
        assert!((params().disc_eff() - 0.882).abs() < 1e-12);
    }

    #[test]
    fn test_period_params_errors_name_the_failing_field() {
        let field = |p: PeriodParams| match p.validate() {
            Err(SolverError::InvalidParameter { field, .. }) => field,
            other => panic!("expected an invalid parameter, got {other:?}"),
        };
        assert_eq!(field(PeriodParams { rfree: -1.0, ..params() }), "rfree");
        assert_eq!(field(PeriodParams { perm_gro_fac: 0.0, ..params() }), "perm_gro_fac");
        assert_eq!(field(PeriodParams { crra: 0.0, ..params() }), "crra");
        assert_eq!(field(PeriodParams { disc_fac: 0.0, ..params() }), "disc_fac");
        assert_eq!(field(PeriodParams { liv_prb: 1.2, ..params() }), "liv_prb");
    }

    #[test]
    fn test_grid_checks() {
        assert!(check_share_grid(&[0.0, 0.5, 1.0]).is_ok());
        assert!(check_share_grid(&[0.0]).is_err());
        assert!(check_share_grid(&[0.0, 1.5]).is_err());
        assert!(check_asset_grid(&[0.1, 1.0]).is_ok());
        assert!(check_asset_grid(&[0.0, 1.0]).is_err());
        assert!(check_asset_grid(&[1.0, 0.5]).is_err());
    }

    #[test]
    fn test_zero_natural_constraint_detection() {
        let risky = ReturnDstn::degenerate(1.05);
        let no_risk = ShockDistributions::independent(IncomeShockDstn::no_risk(), risky.clone());
        assert!(!no_risk.natural_constraint_is_zero());

        let income = IncomeShockDstn::income_shocks(0.1, 3, 0.1, 3, 0.05, 0.0).unwrap();
        let zero_floor = ShockDistributions::independent(income, risky);
        assert!(zero_floor.natural_constraint_is_zero());
        assert_eq!(zero_floor.joint.len(), zero_floor.income.len());
    }
}
