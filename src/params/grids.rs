//! Grid construction for end-of-period assets and risky shares

use crate::error::{SolverError, SolverResult};

/// Evenly spaced points from `lo` to `hi` inclusive
pub fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![lo],
        _ => (0..n)
            .map(|i| lo + (hi - lo) * i as f64 / (n - 1) as f64)
            .collect(),
    }
}

/// Multi-exponentially spaced grid
///
/// `times_to_nest` applies log(x + 1) that many times before spacing the points
/// evenly, so larger values cluster more points near `min`. A value of 0 spaces
/// points evenly in log(x); -1 gives a linear grid.
pub fn make_grid_exp_mult(min: f64, max: f64, n: usize, times_to_nest: i32) -> SolverResult<Vec<f64>> {
    if n < 2 {
        return Err(SolverError::invalid("a_xtra_count", "grid needs at least two points"));
    }
    if !(min < max) {
        return Err(SolverError::invalid(
            "a_xtra_min",
            format!("grid minimum {min} must be below maximum {max}"),
        ));
    }

    let grid = match times_to_nest {
        -1 => linspace(min, max, n),
        0 => {
            if min <= 0.0 {
                return Err(SolverError::invalid(
                    "a_xtra_min",
                    "log-spaced grid needs a positive minimum",
                ));
            }
            linspace(min.ln(), max.ln(), n)
                .into_iter()
                .map(f64::exp)
                .collect()
        }
        nest if nest > 0 => {
            let mut lo = min;
            let mut hi = max;
            for _ in 0..nest {
                lo = (lo + 1.0).ln();
                hi = (hi + 1.0).ln();
            }
            let mut grid = linspace(lo, hi, n);
            for _ in 0..nest {
                grid.iter_mut().for_each(|g| *g = g.exp() - 1.0);
            }
            grid
        }
        other => {
            return Err(SolverError::invalid(
                "a_xtra_nest_fac",
                format!("nesting factor must be -1 or non-negative, got {other}"),
            ))
        }
    };
    Ok(grid)
}

/// Merge extra points into a grid, keeping it sorted and free of duplicates
pub fn merge_points(mut grid: Vec<f64>, extra: &[f64]) -> Vec<f64> {
    grid.extend(extra.iter().copied().filter(|x| x.is_finite()));
    grid.sort_by(|a, b| a.total_cmp(b));
    grid.dedup_by(|a, b| (*a - *b).abs() < 1e-15);
    grid
}
