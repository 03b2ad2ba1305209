//! Risky share selection at each end-of-period asset gridpoint

use log::debug;

use crate::error::SolverResult;
use crate::math::{LinearInterp, StepFunction};

/// Optimal share and Euler-implied consumption per asset gridpoint
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustChoice {
    pub share: Vec<f64>,
    pub consumption: Vec<f64>,
}

impl AdjustChoice {
    /// Nothing is invested at zero assets: report share 1 and the consumption
    /// implied at the top of the share grid
    pub fn fix_zero_asset_point(&mut self, dvda_nvrs: &[Vec<f64>]) {
        if let (Some(share), Some(c), Some(row)) = (
            self.share.first_mut(),
            self.consumption.first_mut(),
            dvda_nvrs.first(),
        ) {
            *share = 1.0;
            *c = row[row.len() - 1];
        }
    }
}

/// Pick the grid share with the highest end-of-period value
///
/// Ties go to the smallest share.
pub fn discrete_choice(eop_v: &[Vec<f64>], dvda_nvrs: &[Vec<f64>], share_grid: &[f64]) -> AdjustChoice {
    let mut share = Vec::with_capacity(eop_v.len());
    let mut consumption = Vec::with_capacity(eop_v.len());
    for (v_row, c_row) in eop_v.iter().zip(dvda_nvrs) {
        let mut best = 0;
        for (j, &v) in v_row.iter().enumerate().skip(1) {
            if v > v_row[best] {
                best = j;
            }
        }
        share.push(share_grid[best]);
        consumption.push(c_row[best]);
    }
    AdjustChoice { share, consumption }
}

/// Solve the first-order condition for the share at one asset gridpoint
///
/// Returns the share and the consumption interpolated at the same fraction.
fn solve_share_foc(foc: &[f64], c_row: &[f64], share_grid: &[f64]) -> (f64, f64) {
    let last = foc.len() - 1;

    // Corners; a negative marginal value at zero risk wins over the top corner
    if foc[0] < 0.0 {
        return (share_grid[0], c_row[0]);
    }
    if foc[last] > 0.0 {
        return (share_grid[last], c_row[last]);
    }

    let k = foc
        .windows(2)
        .position(|w| w[0] >= 0.0 && w[1] <= 0.0)
        .unwrap_or(0);
    let (bot_f, top_f) = (foc[k], foc[k + 1]);
    let alpha = if top_f != bot_f {
        1.0 - top_f / (top_f - bot_f)
    } else {
        // Flat at zero, e.g. no assets to invest
        0.0
    };
    (
        (1.0 - alpha) * share_grid[k] + alpha * share_grid[k + 1],
        (1.0 - alpha) * c_row[k] + alpha * c_row[k + 1],
    )
}

/// Find the share where the marginal value of the share crosses zero
pub fn continuous_choice(dvds: &[Vec<f64>], dvda_nvrs: &[Vec<f64>], share_grid: &[f64]) -> AdjustChoice {
    let (share, consumption): (Vec<f64>, Vec<f64>) = dvds
        .iter()
        .zip(dvda_nvrs)
        .map(|(foc, c_row)| solve_share_foc(foc, c_row, share_grid))
        .unzip();

    let (bottom, top) = corner_counts(&share, share_grid);
    if bottom + top > 0 {
        debug!(
            "Share at a corner for {} of {} asset points ({} at the bottom, {} at the top)",
            bottom + top,
            share.len(),
            bottom,
            top
        );
    }
    AdjustChoice { share, consumption }
}

/// Asset points whose share sits on the lowest or highest grid share
pub fn corner_counts(share: &[f64], share_grid: &[f64]) -> (usize, usize) {
    let (lo, hi) = match (share_grid.first(), share_grid.last()) {
        (Some(&lo), Some(&hi)) => (lo, hi),
        _ => return (0, 0),
    };
    let bottom = share.iter().filter(|&&s| s == lo).count();
    let top = share.iter().filter(|&&s| s == hi).count();
    (bottom, top)
}

/// Piecewise linear share function tending to `share_limit`
///
/// `m_endog` starts with the origin; `lower` is the share reported there.
pub fn continuous_share_function(
    m_endog: &[f64],
    share: &[f64],
    share_limit: f64,
    lower: f64,
) -> SolverResult<LinearInterp> {
    let mut y = Vec::with_capacity(share.len() + 1);
    y.push(lower);
    y.extend_from_slice(share);
    LinearInterp::with_limit(m_endog.to_vec(), y, share_limit, 0.0)
}

/// Step function jumping halfway between neighbouring endogenous gridpoints
///
/// `m_endog` starts with the origin and has one more point than `share`.
pub fn discrete_share_function(m_endog: &[f64], share: &[f64]) -> SolverResult<StepFunction> {
    let points = &m_endog[1..];
    let mut breaks = Vec::with_capacity(share.len().saturating_sub(1));
    let mut floor = f64::NEG_INFINITY;
    for w in points.windows(2) {
        // Consumption can dip where the chosen share jumps
        floor = floor.max(0.5 * (w[0] + w[1]));
        breaks.push(floor);
    }
    StepFunction::new(breaks, share.to_vec())
}
