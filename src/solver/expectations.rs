//! End-of-period expectations over (asset, share) gridpoints
//!
//! Two integration paths produce the same arrays:
//! - **Independent**: income shocks are integrated first onto a grid of bank
//!   balances `b = R_port * a`, then returns are integrated using interpolants
//!   of that intermediate result.
//! - **Joint**: one pass over every (permanent, transitory, return) atom.
//!
//! Rows of the asset grid are evaluated in parallel with rayon.

use std::sync::Arc;

use log::debug;
use rayon::prelude::*;

use crate::error::SolverResult;
use crate::math::{
    BilinearInterp, CrraUtility, CubicInterp, Function1D, Function2D, LinearInterpOnInterp1D,
    MargValueFuncCrra2D, ValueFuncCrra2D,
};
use crate::solution::PortfolioSolution;

use super::{PeriodParams, ShockDistributions};

/// End-of-period value over (asset, share)
#[derive(Debug, Clone)]
pub struct EndOfPeriodValue {
    /// Values at the gridpoints, `[asset][share]`
    pub v: Vec<Vec<f64>>,

    /// Interpolated end-of-period value function
    pub v_func: Arc<dyn Function2D>,
}

/// End-of-period marginal values, all indexed `[asset][share]`
#[derive(Debug, Clone)]
pub struct EndOfPeriod {
    /// Asset grid, including 0 when income has a positive floor
    pub a_grid: Vec<f64>,

    pub dvda: Vec<Vec<f64>>,

    /// Pseudo-inverse of `dvda`; consumption implied by the Euler equation
    pub dvda_nvrs: Vec<Vec<f64>>,

    pub dvds: Vec<Vec<f64>>,

    pub value: Option<EndOfPeriodValue>,
}

/// Next period's marginal values, weighted over the adjust / fixed regimes
struct NextPeriod<'a> {
    solution: &'a PortfolioSolution,
    adjust_prb: f64,
}

impl NextPeriod<'_> {
    fn dvdm(&self, m: f64, s: f64) -> f64 {
        let adjust = self.solution.marginal_value_adjust.eval(m);
        if self.adjust_prb < 1.0 {
            self.adjust_prb * adjust + (1.0 - self.adjust_prb) * self.solution.dvdm_fixed.eval(m, s)
        } else {
            adjust
        }
    }

    fn dvds(&self, m: f64, s: f64) -> f64 {
        // Adjusters re-optimize, so the share only matters if stuck with it
        if self.adjust_prb < 1.0 {
            (1.0 - self.adjust_prb) * self.solution.dvds_fixed.eval(m, s)
        } else {
            0.0
        }
    }

    fn value_fn(&self) -> SolverResult<impl Fn(f64, f64) -> f64 + Sync + '_> {
        let adjust = self.solution.value_adjust()?;
        let fixed = if self.adjust_prb < 1.0 {
            Some(self.solution.value_fixed()?)
        } else {
            None
        };
        let p = self.adjust_prb;
        Ok(move |m: f64, s: f64| match fixed {
            Some(fixed) => p * adjust.eval(m) + (1.0 - p) * fixed.eval(m, s),
            None => adjust.eval(m),
        })
    }
}

/// Evaluate `f` on every (x, y) pair, rows in parallel
fn tabulate<const N: usize, F>(xs: &[f64], ys: &[f64], f: F) -> [Vec<Vec<f64>>; N]
where
    F: Fn(f64, f64) -> [f64; N] + Sync,
{
    let rows: Vec<Vec<[f64; N]>> = xs
        .par_iter()
        .map(|&x| ys.iter().map(|&y| f(x, y)).collect())
        .collect();
    std::array::from_fn(|k| {
        rows.iter()
            .map(|row| row.iter().map(|v| v[k]).collect())
            .collect()
    })
}

fn map_grid(grid: &[Vec<f64>], f: impl Fn(f64) -> f64) -> Vec<Vec<f64>> {
    grid.iter()
        .map(|row| row.iter().map(|&v| f(v)).collect())
        .collect()
}

/// Asset and bank balance grids used for the expectations
///
/// When income has a positive floor the agent can end the period with exactly
/// zero assets, so that point is added. Otherwise the bank balance grid is
/// extended down to the worst return on the smallest asset point.
pub(crate) fn state_grids(
    a_xtra_grid: &[f64],
    shocks: &ShockDistributions,
) -> (Vec<f64>, Vec<f64>) {
    let risky_max = shocks.risky.max_atom();
    let risky_min = shocks.risky.min_atom();

    if shocks.natural_constraint_is_zero() {
        let mut b_grid = Vec::with_capacity(a_xtra_grid.len() + 1);
        let lowest = risky_min * a_xtra_grid[0];
        if lowest < risky_max * a_xtra_grid[0] {
            b_grid.push(lowest);
        }
        b_grid.extend(a_xtra_grid.iter().map(|a| risky_max * a));
        (a_xtra_grid.to_vec(), b_grid)
    } else {
        let mut a_grid = Vec::with_capacity(a_xtra_grid.len() + 1);
        a_grid.push(0.0);
        a_grid.extend_from_slice(a_xtra_grid);
        let b_grid = a_grid.iter().map(|a| risky_max * a).collect();
        (a_grid, b_grid)
    }
}

/// Integrate over income shocks, then over returns
pub fn independent_expectations(
    solution_next: &PortfolioSolution,
    shocks: &ShockDistributions,
    params: &PeriodParams,
    a_xtra_grid: &[f64],
    share_grid: &[f64],
) -> SolverResult<EndOfPeriod> {
    let u = CrraUtility::new(params.crra);
    let crra = params.crra;
    let rfree = params.rfree;
    let disc_eff = params.disc_eff();
    let next = NextPeriod {
        solution: solution_next,
        adjust_prb: params.adjust_prb,
    };
    let (a_grid, b_grid) = state_grids(a_xtra_grid, shocks);

    // ---- Stage 1: income shocks, over (bank balances, share) ----
    let [dvdb, dvds_mid] = tabulate(&b_grid, share_grid, |b, s| {
        shocks.income.expected_array(|shk| {
            let growth = shk.perm * params.perm_gro_fac;
            let m_next = b / growth + shk.tran;
            [
                growth.powf(-crra) * next.dvdm(m_next, s),
                growth.powf(1.0 - crra) * next.dvds(m_next, s),
            ]
        })
    });
    let dvdb_func = MargValueFuncCrra2D::new(
        BilinearInterp::new(map_grid(&dvdb, |v| u.der_inv(v)), b_grid.clone(), share_grid.to_vec())?,
        crra,
    );
    let dvds_mid_func = BilinearInterp::new(dvds_mid, b_grid.clone(), share_grid.to_vec())?;

    // ---- Stage 2: returns, over (assets, share) ----
    let [dvda, dvds] = tabulate(&a_grid, share_grid, |a, s| {
        let [x, y] = shocks.risky.expected_array(|&r| {
            let excess = r - rfree;
            let r_port = rfree + s * excess;
            let b = r_port * a;
            let marg = dvdb_func.eval(b, s);
            [r_port * marg, excess * a * marg + dvds_mid_func.eval(b, s)]
        });
        [disc_eff * x, disc_eff * y]
    });

    let value = if params.vfunc {
        let v_next = next.value_fn()?;
        let [v_mid] = tabulate(&b_grid, share_grid, |b, s| {
            [shocks.income.expected(|shk| {
                let growth = shk.perm * params.perm_gro_fac;
                growth.powf(1.0 - crra) * v_next(b / growth + shk.tran, s)
            })]
        });
        let v_mid_func = ValueFuncCrra2D::new(
            BilinearInterp::new(map_grid(&v_mid, |v| u.inv(v)), b_grid.clone(), share_grid.to_vec())?,
            crra,
        );
        let [v] = tabulate(&a_grid, share_grid, |a, s| {
            [disc_eff * shocks.risky.expected(|&r| v_mid_func.eval((rfree + s * (r - rfree)) * a, s))]
        });
        let v_func = ValueFuncCrra2D::new(
            BilinearInterp::new(map_grid(&v, |x| u.inv(x)), a_grid.clone(), share_grid.to_vec())?,
            crra,
        );
        Some(EndOfPeriodValue {
            v,
            v_func: Arc::new(v_func),
        })
    } else {
        None
    };

    Ok(EndOfPeriod {
        dvda_nvrs: map_grid(&dvda, |v| u.der_inv(v)),
        a_grid,
        dvda,
        dvds,
        value,
    })
}

/// Integrate over the joint distribution of income shocks and returns
pub fn joint_expectations(
    solution_next: &PortfolioSolution,
    shocks: &ShockDistributions,
    params: &PeriodParams,
    a_xtra_grid: &[f64],
    share_grid: &[f64],
) -> SolverResult<EndOfPeriod> {
    let u = CrraUtility::new(params.crra);
    let crra = params.crra;
    let rfree = params.rfree;
    let disc_eff = params.disc_eff();
    let next = NextPeriod {
        solution: solution_next,
        adjust_prb: params.adjust_prb,
    };
    let (a_grid, _) = state_grids(a_xtra_grid, shocks);

    let [dvda, dvds] = tabulate(&a_grid, share_grid, |a, s| {
        let [x, y] = shocks.joint.expected_array(|shk| {
            let excess = shk.risky - rfree;
            let r_port = rfree + s * excess;
            let growth = shk.perm * params.perm_gro_fac;
            let m_next = r_port * a / growth + shk.tran;
            let marg = growth.powf(-crra) * next.dvdm(m_next, s);
            [
                r_port * marg,
                excess * a * marg + growth.powf(1.0 - crra) * next.dvds(m_next, s),
            ]
        });
        [disc_eff * x, disc_eff * y]
    });

    let value = if params.vfunc {
        let v_next = next.value_fn()?;
        let [v] = tabulate(&a_grid, share_grid, |a, s| {
            [disc_eff
                * shocks.joint.expected(|shk| {
                    let r_port = rfree + s * (shk.risky - rfree);
                    let growth = shk.perm * params.perm_gro_fac;
                    growth.powf(1.0 - crra) * v_next(r_port * a / growth + shk.tran, s)
                })]
        });

        // Cubic in assets for each share, using the envelope condition for slopes
        let by_share = (0..share_grid.len())
            .map(|j| {
                let v_nvrs = v.iter().map(|row| u.inv(row[j])).collect();
                let v_nvrs_p = v
                    .iter()
                    .zip(dvda.iter())
                    .map(|(v_row, dvda_row)| dvda_row[j] * u.inv_der(v_row[j]))
                    .collect();
                CubicInterp::new(a_grid.clone(), v_nvrs, v_nvrs_p)
            })
            .collect::<SolverResult<Vec<_>>>()?;
        let v_func = ValueFuncCrra2D::new(
            LinearInterpOnInterp1D::new(by_share, share_grid.to_vec())?,
            crra,
        );
        Some(EndOfPeriodValue {
            v,
            v_func: Arc::new(v_func),
        })
    } else {
        None
    };

    Ok(EndOfPeriod {
        dvda_nvrs: map_grid(&dvda, |v| u.der_inv(v)),
        a_grid,
        dvda,
        dvds,
        value,
    })
}

/// Dispatch on the integration path
pub fn end_of_period(
    solution_next: &PortfolioSolution,
    shocks: &ShockDistributions,
    params: &PeriodParams,
    a_xtra_grid: &[f64],
    share_grid: &[f64],
) -> SolverResult<EndOfPeriod> {
    debug!(
        "Integrating {} shocks over {} assets x {} shares",
        if params.indep_dstn { "independent" } else { "joint" },
        a_xtra_grid.len(),
        share_grid.len()
    );
    if params.indep_dstn {
        independent_expectations(solution_next, shocks, params, a_xtra_grid, share_grid)
    } else {
        joint_expectations(solution_next, shocks, params, a_xtra_grid, share_grid)
    }
}
