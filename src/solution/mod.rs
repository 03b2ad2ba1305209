//! Single-period solution of the portfolio choice problem
//!
//! A [`PortfolioSolution`] bundles the policy and (marginal) value functions for
//! both regimes an agent can be in:
//! - **Adjust**: the risky share is freely chosen this period, so every function
//!   depends on normalized market resources only.
//! - **Fixed**: the share is inherited from last period, so functions depend on
//!   market resources and the held share.
//!
//! Solutions are built once by the period solver and never mutated afterwards.
//! Function objects are reference counted so the same solution can feed the
//! preceding period's solver and the simulation controller at the same time.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{SolverError, SolverResult};
use crate::math::{
    Axis, ConstantFunction, Function1D, Function2D, IdentityFunction, IdentityFunction2D,
    MargValueFuncCrra, MargValueFuncCrra2D, ValueFuncCrra, ValueFuncCrra2D,
};

/// Whether the agent may re-optimize the risky share this period
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Regime {
    /// Free choice of the risky share
    Adjust,
    /// Share is stuck at the value held coming into the period
    Fixed { held_share: f64 },
}

impl Regime {
    pub fn from_flag(can_adjust: bool, held_share: f64) -> Self {
        if can_adjust {
            Regime::Adjust
        } else {
            Regime::Fixed { held_share }
        }
    }
}

/// Optimal choices at one state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Controls {
    /// Normalized consumption
    pub consumption: f64,
    /// Risky share of end-of-period assets
    pub share: f64,
}

/// Grids and end-of-period arrays retained from the solve, for diagnostics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuxiliaryArrays {
    /// End-of-period asset grid
    pub a_grid: Vec<f64>,

    /// Optimal risky share at each asset gridpoint (adjust regime)
    pub share_adj: Vec<f64>,

    /// End-of-period marginal value of assets at the optimal share (adjust regime)
    pub eop_dvda_adj: Vec<f64>,

    /// Risky share grid of the fixed-regime functions
    pub share_grid: Vec<f64>,

    /// End-of-period marginal value of assets over (asset, share)
    pub eop_dvda_fxd: Vec<Vec<f64>>,

    /// End-of-period marginal value of the risky share over (asset, share)
    pub eop_dvds_fxd: Vec<Vec<f64>>,
}

/// Solution of one period of the portfolio choice problem
#[derive(Debug, Clone)]
pub struct PortfolioSolution {
    /// Consumption over market resources, adjust regime
    pub consumption_adjust: Arc<dyn Function1D>,

    /// Optimal risky share over market resources, adjust regime
    pub share_adjust: Arc<dyn Function1D>,

    /// Value over market resources, adjust regime (if computed)
    pub value_adjust: Option<Arc<dyn Function1D>>,

    /// Marginal value of market resources, adjust regime
    pub marginal_value_adjust: Arc<dyn Function1D>,

    /// Consumption over (market resources, held share), fixed regime
    pub consumption_fixed: Arc<dyn Function2D>,

    /// Share over (market resources, held share), fixed regime; returns the held share
    pub share_fixed: Arc<dyn Function2D>,

    /// Value over (market resources, held share), fixed regime (if computed)
    pub value_fixed: Option<Arc<dyn Function2D>>,

    /// Marginal value of market resources, fixed regime
    pub dvdm_fixed: Arc<dyn Function2D>,

    /// Marginal value of the held share, fixed regime
    pub dvds_fixed: Arc<dyn Function2D>,

    pub aux: AuxiliaryArrays,

    /// Probability of being able to adjust the share in this period
    pub adjust_prb: f64,

    /// Normalized human wealth
    pub h_nrm: f64,

    /// Limiting marginal propensity to consume as resources grow without bound
    pub mpc_min: f64,
}

impl PortfolioSolution {
    /// Closed-form solution of the last period: consume everything, hold no risky assets
    pub fn terminal(crra: f64, adjust_prb: f64) -> Self {
        Self {
            consumption_adjust: Arc::new(IdentityFunction),
            share_adjust: Arc::new(ConstantFunction(0.0)),
            value_adjust: Some(Arc::new(ValueFuncCrra::new(IdentityFunction, crra))),
            marginal_value_adjust: Arc::new(MargValueFuncCrra::new(IdentityFunction, crra)),
            consumption_fixed: Arc::new(IdentityFunction2D(Axis::X)),
            share_fixed: Arc::new(IdentityFunction2D(Axis::Y)),
            value_fixed: Some(Arc::new(ValueFuncCrra2D::new(
                IdentityFunction2D(Axis::X),
                crra,
            ))),
            dvdm_fixed: Arc::new(MargValueFuncCrra2D::new(IdentityFunction2D(Axis::X), crra)),
            // No future, no marginal value of the share
            dvds_fixed: Arc::new(ConstantFunction(0.0)),
            aux: AuxiliaryArrays::default(),
            adjust_prb,
            h_nrm: 0.0,
            mpc_min: 1.0,
        }
    }

    /// Value function of the adjust regime
    pub fn value_adjust(&self) -> SolverResult<&Arc<dyn Function1D>> {
        self.value_adjust
            .as_ref()
            .ok_or(SolverError::ValueFunctionNotComputed("adjust"))
    }

    /// Value function of the fixed regime
    pub fn value_fixed(&self) -> SolverResult<&Arc<dyn Function2D>> {
        self.value_fixed
            .as_ref()
            .ok_or(SolverError::ValueFunctionNotComputed("fixed"))
    }

    pub fn has_value_functions(&self) -> bool {
        self.value_adjust.is_some() && self.value_fixed.is_some()
    }

    /// Optimal consumption and share at market resources `m_nrm` in the given regime
    pub fn controls(&self, m_nrm: f64, regime: Regime) -> Controls {
        match regime {
            Regime::Adjust => Controls {
                consumption: self.consumption_adjust.eval(m_nrm),
                // Extrapolation far above the grid may overshoot
                share: self.share_adjust.eval(m_nrm).clamp(0.0, 1.0),
            },
            Regime::Fixed { held_share } => Controls {
                consumption: self.consumption_fixed.eval(m_nrm, held_share),
                share: self.share_fixed.eval(m_nrm, held_share),
            },
        }
    }

    /// Value at `m_nrm` in the given regime
    pub fn value(&self, m_nrm: f64, regime: Regime) -> SolverResult<f64> {
        match regime {
            Regime::Adjust => Ok(self.value_adjust()?.eval(m_nrm)),
            Regime::Fixed { held_share } => Ok(self.value_fixed()?.eval(m_nrm, held_share)),
        }
    }

    /// Sup-norm distance between adjust-regime consumption functions on `grid`
    pub fn distance(&self, other: &PortfolioSolution, grid: &[f64]) -> f64 {
        grid.iter()
            .map(|&m| (self.consumption_adjust.eval(m) - other.consumption_adjust.eval(m)).abs())
            .fold(0.0, f64::max)
    }
}
