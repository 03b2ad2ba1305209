//! Backward induction step: next period's solution to this period's

use std::iter::once;
use std::sync::Arc;

use log::debug;

use crate::error::{SolverError, SolverResult};
use crate::math::{
    Axis, CrraUtility, CubicInterp, Function1D, Function2D, IdentityFunction2D, LinearInterp,
    LinearInterpOnInterp1D, MargValueFuncCrra, MargValueFuncCrra2D, ValueFuncCrra, ValueFuncCrra2D,
};
use crate::solution::{AuxiliaryArrays, PortfolioSolution};

use super::expectations::end_of_period;
use super::limits::asymptotic_limits;
use super::share::{
    continuous_choice, continuous_share_function, discrete_choice, discrete_share_function,
};
use super::{check_asset_grid, check_share_grid, PeriodParams, ShockDistributions};

/// Pseudo-inverse value over market resources, pinned to zero at the origin
///
/// `eval` returns (consumption, value) at each point of `m_grid`.
fn value_nvrs_interp(
    m_grid: &[f64],
    u: &CrraUtility,
    eval: impl Fn(f64) -> (f64, f64),
) -> SolverResult<CubicInterp> {
    let mut x = Vec::with_capacity(m_grid.len() + 1);
    let mut y = Vec::with_capacity(m_grid.len() + 1);
    let mut dydx = Vec::with_capacity(m_grid.len() + 1);
    x.push(0.0);
    y.push(0.0);
    for &m in m_grid {
        let (c, v) = eval(m);
        x.push(m);
        y.push(u.inv(v));
        dydx.push(u.der(c) * u.inv_der(v));
    }
    dydx.insert(0, dydx[0]);
    CubicInterp::new(x, y, dydx)
}

/// Solve one period of the portfolio choice problem
///
/// # Errors
/// - [`SolverError::NonZeroBorrowingConstraint`] unless the constraint is exactly 0.0
/// - [`SolverError::DiscreteShareWithoutValueFunction`] for discrete choice without `vfunc`
/// - [`SolverError::ValueFunctionNotComputed`] when values are needed but
///   `solution_next` was built without them
pub fn solve_one_period(
    solution_next: &PortfolioSolution,
    shocks: &ShockDistributions,
    params: &PeriodParams,
    a_xtra_grid: &[f64],
    share_grid: &[f64],
) -> SolverResult<PortfolioSolution> {
    params.validate()?;
    check_asset_grid(a_xtra_grid)?;
    check_share_grid(share_grid)?;

    let crra = params.crra;
    let u = CrraUtility::new(crra);
    let zero_floor = shocks.natural_constraint_is_zero();

    // Limiting linear consumption function as m grows
    let limits = asymptotic_limits(
        solution_next.mpc_min,
        solution_next.h_nrm,
        &shocks.risky,
        &shocks.joint,
        params,
    );

    let eop = end_of_period(solution_next, shocks, params, a_xtra_grid, share_grid)?;
    let a_grid = &eop.a_grid;

    // Share and Euler-implied consumption at each asset point
    let mut choice = if params.discrete_share {
        let value = eop
            .value
            .as_ref()
            .ok_or(SolverError::DiscreteShareWithoutValueFunction)?;
        discrete_choice(&value.v, &eop.dvda_nvrs, share_grid)
    } else {
        continuous_choice(&eop.dvds, &eop.dvda_nvrs, share_grid)
    };
    if !zero_floor {
        choice.fix_zero_asset_point(&eop.dvda_nvrs);
    }

    // ---- Adjust regime ----
    let m_adj: Vec<f64> = once(0.0)
        .chain(a_grid.iter().zip(&choice.consumption).map(|(a, c)| a + c))
        .collect();
    let c_adj: Vec<f64> = once(0.0).chain(choice.consumption.iter().copied()).collect();
    let consumption_adjust = Arc::new(LinearInterp::with_limit(
        m_adj.clone(),
        c_adj,
        limits.intercept(),
        limits.slope(),
    )?);
    let marginal_value_adjust = Arc::new(MargValueFuncCrra::new(consumption_adjust.clone(), crra));

    let share_adjust: Arc<dyn Function1D> = if params.discrete_share {
        Arc::new(discrete_share_function(&m_adj, &choice.share)?)
    } else {
        let lower = if zero_floor { params.share_limit } else { 1.0 };
        Arc::new(continuous_share_function(
            &m_adj,
            &choice.share,
            params.share_limit,
            lower,
        )?)
    };

    // ---- Fixed regime: one endogenous grid per share ----
    let mut c_by_share = Vec::with_capacity(share_grid.len());
    let mut dvds_by_share = Vec::with_capacity(share_grid.len());
    for j in 0..share_grid.len() {
        let c: Vec<f64> = once(0.0).chain(eop.dvda_nvrs.iter().map(|row| row[j])).collect();
        let m: Vec<f64> = once(0.0)
            .chain(a_grid.iter().zip(&eop.dvda_nvrs).map(|(a, row)| a + row[j]))
            .collect();
        let dvds: Vec<f64> = once(eop.dvds[0][j])
            .chain(eop.dvds.iter().map(|row| row[j]))
            .collect();
        c_by_share.push(LinearInterp::new(m.clone(), c)?);
        dvds_by_share.push(LinearInterp::new(m, dvds)?);
    }
    let consumption_fixed = Arc::new(LinearInterpOnInterp1D::new(c_by_share, share_grid.to_vec())?);
    let dvds_fixed = Arc::new(LinearInterpOnInterp1D::new(dvds_by_share, share_grid.to_vec())?);
    let dvdm_fixed = Arc::new(MargValueFuncCrra2D::new(consumption_fixed.clone(), crra));

    // ---- Value functions ----
    let (value_adjust, value_fixed) = match (&eop.value, params.vfunc) {
        (Some(eop_value), true) => {
            let eop_v = &eop_value.v_func;

            let v_nvrs_adj = value_nvrs_interp(a_xtra_grid, &u, |m| {
                let c = consumption_adjust.eval(m);
                let a = (m - c).max(0.0);
                (c, u.u(c) + eop_v.eval(a, share_adjust.eval(m)))
            })?;
            let value_adjust: Arc<dyn Function1D> = Arc::new(ValueFuncCrra::new(v_nvrs_adj, crra));

            let v_nvrs_fxd = share_grid
                .iter()
                .map(|&s| {
                    value_nvrs_interp(a_xtra_grid, &u, |m| {
                        let c = consumption_fixed.eval(m, s);
                        let a = (m - c).max(0.0);
                        (c, u.u(c) + eop_v.eval(a, s))
                    })
                })
                .collect::<SolverResult<Vec<_>>>()?;
            let value_fixed: Arc<dyn Function2D> = Arc::new(ValueFuncCrra2D::new(
                LinearInterpOnInterp1D::new(v_nvrs_fxd, share_grid.to_vec())?,
                crra,
            ));
            (Some(value_adjust), Some(value_fixed))
        }
        _ => (None, None),
    };

    debug!(
        "Solved period ({} share choice, {} shocks): {} asset points, {} shares, MPCmin {:.4}, hNrm {:.4}, share at top {:.4}",
        if params.discrete_share { "discrete" } else { "continuous" },
        if params.indep_dstn { "independent" } else { "joint" },
        a_grid.len(),
        share_grid.len(),
        limits.mpc_min,
        limits.h_nrm,
        choice.share.last().copied().unwrap_or(f64::NAN),
    );

    let aux = AuxiliaryArrays {
        a_grid: eop.a_grid.clone(),
        eop_dvda_adj: choice.consumption.iter().map(|&c| u.der(c)).collect(),
        share_adj: choice.share,
        share_grid: share_grid.to_vec(),
        eop_dvda_fxd: eop.dvda,
        eop_dvds_fxd: eop.dvds,
    };

    Ok(PortfolioSolution {
        consumption_adjust,
        share_adjust,
        value_adjust,
        marginal_value_adjust,
        consumption_fixed,
        share_fixed: Arc::new(IdentityFunction2D(Axis::Y)),
        value_fixed,
        dvdm_fixed,
        dvds_fixed,
        aux,
        adjust_prb: params.adjust_prb,
        h_nrm: limits.h_nrm,
        mpc_min: limits.mpc_min,
    })
}
