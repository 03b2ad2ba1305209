//! Function objects over one and two state dimensions
//!
//! The solver hands functions from one period to the next, so everything here
//! is immutable after construction and `Send + Sync`. All interpolants
//! extrapolate linearly off their grid unless a limiting line is supplied.

use std::fmt;
use std::sync::Arc;

use crate::error::{SolverError, SolverResult};

/// A real function of one variable with a derivative
pub trait Function1D: Send + Sync + fmt::Debug {
    fn eval(&self, x: f64) -> f64;

    fn derivative(&self, x: f64) -> f64;

    /// Evaluate at every point of `xs`
    fn eval_many(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| self.eval(x)).collect()
    }
}

/// A real function of two variables with partial derivatives
pub trait Function2D: Send + Sync + fmt::Debug {
    fn eval(&self, x: f64, y: f64) -> f64;

    fn derivative_x(&self, x: f64, y: f64) -> f64;

    fn derivative_y(&self, x: f64, y: f64) -> f64;
}

impl<T: Function1D + ?Sized> Function1D for Arc<T> {
    fn eval(&self, x: f64) -> f64 {
        (**self).eval(x)
    }

    fn derivative(&self, x: f64) -> f64 {
        (**self).derivative(x)
    }
}

impl<T: Function2D + ?Sized> Function2D for Arc<T> {
    fn eval(&self, x: f64, y: f64) -> f64 {
        (**self).eval(x, y)
    }

    fn derivative_x(&self, x: f64, y: f64) -> f64 {
        (**self).derivative_x(x, y)
    }

    fn derivative_y(&self, x: f64, y: f64) -> f64 {
        (**self).derivative_y(x, y)
    }
}

/// Index of the grid segment used for `x`: interior points find their bracket,
/// points off the grid use the first or last segment.
fn segment(nodes: &[f64], x: f64) -> usize {
    let n = nodes.len();
    nodes[1..n - 1].partition_point(|&v| v <= x)
}

fn check_nodes(name: &str, x: &[f64], values: usize) -> SolverResult<()> {
    if x.len() < 2 {
        return Err(SolverError::InvalidNodes(format!(
            "{name} needs at least two nodes, got {}",
            x.len()
        )));
    }
    if x.len() != values {
        return Err(SolverError::InvalidNodes(format!(
            "{name}: {} nodes but {} values",
            x.len(),
            values
        )));
    }
    Ok(())
}

// ============================================================================
// ONE-DIMENSIONAL INTERPOLANTS
// ============================================================================

/// Exponential approach to a limiting line above the top node
#[derive(Debug, Clone, Copy)]
struct DecayExtrapolation {
    intercept: f64,
    slope: f64,
    gap: f64,
    rate: f64,
}

/// Piecewise linear interpolation
#[derive(Debug, Clone)]
pub struct LinearInterp {
    x: Vec<f64>,
    y: Vec<f64>,
    decay: Option<DecayExtrapolation>,
}

impl LinearInterp {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> SolverResult<Self> {
        check_nodes("LinearInterp", &x, y.len())?;
        Ok(Self { x, y, decay: None })
    }

    /// Interpolant whose upper extrapolation approaches `intercept + slope * x`
    ///
    /// The gap to the limiting line at the top node decays exponentially at the
    /// rate that keeps the slope continuous there. When that rate would not
    /// shrink the gap, plain linear extrapolation is used instead.
    pub fn with_limit(x: Vec<f64>, y: Vec<f64>, intercept: f64, slope: f64) -> SolverResult<Self> {
        let mut interp = Self::new(x, y)?;
        let n = interp.x.len();
        let x_top = interp.x[n - 1];
        let slope_at_top =
            (interp.y[n - 1] - interp.y[n - 2]) / (interp.x[n - 1] - interp.x[n - 2]);
        let level_diff = intercept + slope * x_top - interp.y[n - 1];
        let slope_diff = slope - slope_at_top;

        if level_diff.abs() < 1e-14 {
            if slope_diff.abs() < 1e-14 {
                interp.decay = Some(DecayExtrapolation {
                    intercept,
                    slope,
                    gap: 0.0,
                    rate: 0.0,
                });
            }
        } else {
            let rate = -slope_diff / level_diff;
            if rate > 0.0 && rate.is_finite() {
                interp.decay = Some(DecayExtrapolation {
                    intercept,
                    slope,
                    gap: level_diff,
                    rate,
                });
            }
        }
        Ok(interp)
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    fn top(&self) -> f64 {
        self.x[self.x.len() - 1]
    }
}

impl Function1D for LinearInterp {
    fn eval(&self, x: f64) -> f64 {
        if let Some(d) = self.decay {
            if x > self.top() {
                return d.intercept + d.slope * x - d.gap * (-d.rate * (x - self.top())).exp();
            }
        }
        let i = segment(&self.x, x);
        let alpha = (x - self.x[i]) / (self.x[i + 1] - self.x[i]);
        (1.0 - alpha) * self.y[i] + alpha * self.y[i + 1]
    }

    fn derivative(&self, x: f64) -> f64 {
        if let Some(d) = self.decay {
            if x > self.top() {
                return d.slope + d.gap * d.rate * (-d.rate * (x - self.top())).exp();
            }
        }
        let i = segment(&self.x, x);
        (self.y[i + 1] - self.y[i]) / (self.x[i + 1] - self.x[i])
    }
}

/// Piecewise cubic Hermite interpolation from values and derivatives at each node
#[derive(Debug, Clone)]
pub struct CubicInterp {
    x: Vec<f64>,
    y: Vec<f64>,
    dydx: Vec<f64>,
}

impl CubicInterp {
    pub fn new(x: Vec<f64>, y: Vec<f64>, dydx: Vec<f64>) -> SolverResult<Self> {
        check_nodes("CubicInterp", &x, y.len())?;
        check_nodes("CubicInterp", &x, dydx.len())?;
        Ok(Self { x, y, dydx })
    }
}

impl Function1D for CubicInterp {
    fn eval(&self, x: f64) -> f64 {
        let n = self.x.len();
        if x < self.x[0] {
            return self.y[0] + self.dydx[0] * (x - self.x[0]);
        }
        if x > self.x[n - 1] {
            return self.y[n - 1] + self.dydx[n - 1] * (x - self.x[n - 1]);
        }
        let i = segment(&self.x, x);
        let h = self.x[i + 1] - self.x[i];
        let t = (x - self.x[i]) / h;
        let t2 = t * t;
        let t3 = t2 * t;
        (2.0 * t3 - 3.0 * t2 + 1.0) * self.y[i]
            + (t3 - 2.0 * t2 + t) * h * self.dydx[i]
            + (-2.0 * t3 + 3.0 * t2) * self.y[i + 1]
            + (t3 - t2) * h * self.dydx[i + 1]
    }

    fn derivative(&self, x: f64) -> f64 {
        let n = self.x.len();
        if x < self.x[0] {
            return self.dydx[0];
        }
        if x > self.x[n - 1] {
            return self.dydx[n - 1];
        }
        let i = segment(&self.x, x);
        let h = self.x[i + 1] - self.x[i];
        let t = (x - self.x[i]) / h;
        let t2 = t * t;
        ((6.0 * t2 - 6.0 * t) * self.y[i]
            + (-6.0 * t2 + 6.0 * t) * self.y[i + 1])
            / h
            + (3.0 * t2 - 4.0 * t + 1.0) * self.dydx[i]
            + (3.0 * t2 - 2.0 * t) * self.dydx[i + 1]
    }
}

/// Right-closed step function: `values[k]` on `(breaks[k-1], breaks[k]]`
///
/// Used for policies chosen from a discrete set, where any interpolation
/// between neighbouring choices would produce shares that are never chosen.
#[derive(Debug, Clone)]
pub struct StepFunction {
    breaks: Vec<f64>,
    values: Vec<f64>,
}

impl StepFunction {
    pub fn new(breaks: Vec<f64>, values: Vec<f64>) -> SolverResult<Self> {
        if values.len() != breaks.len() + 1 {
            return Err(SolverError::InvalidNodes(format!(
                "StepFunction: {} breaks need {} values, got {}",
                breaks.len(),
                breaks.len() + 1,
                values.len()
            )));
        }
        if breaks.windows(2).any(|w| w[1] < w[0]) {
            return Err(SolverError::InvalidNodes(
                "StepFunction breaks must be non-decreasing".to_string(),
            ));
        }
        Ok(Self { breaks, values })
    }

    pub fn breaks(&self) -> &[f64] {
        &self.breaks
    }
}

impl Function1D for StepFunction {
    fn eval(&self, x: f64) -> f64 {
        self.values[self.breaks.partition_point(|&b| b < x)]
    }

    fn derivative(&self, _x: f64) -> f64 {
        0.0
    }
}

/// Constant function of one or two variables
#[derive(Debug, Clone, Copy)]
pub struct ConstantFunction(pub f64);

impl Function1D for ConstantFunction {
    fn eval(&self, _x: f64) -> f64 {
        self.0
    }

    fn derivative(&self, _x: f64) -> f64 {
        0.0
    }
}

impl Function2D for ConstantFunction {
    fn eval(&self, _x: f64, _y: f64) -> f64 {
        self.0
    }

    fn derivative_x(&self, _x: f64, _y: f64) -> f64 {
        0.0
    }

    fn derivative_y(&self, _x: f64, _y: f64) -> f64 {
        0.0
    }
}

/// f(x) = x
#[derive(Debug, Clone, Copy)]
pub struct IdentityFunction;

impl Function1D for IdentityFunction {
    fn eval(&self, x: f64) -> f64 {
        x
    }

    fn derivative(&self, _x: f64) -> f64 {
        1.0
    }
}

/// Which argument a two-dimensional identity passes through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// f(x, y) = x or f(x, y) = y
#[derive(Debug, Clone, Copy)]
pub struct IdentityFunction2D(pub Axis);

impl Function2D for IdentityFunction2D {
    fn eval(&self, x: f64, y: f64) -> f64 {
        match self.0 {
            Axis::X => x,
            Axis::Y => y,
        }
    }

    fn derivative_x(&self, _x: f64, _y: f64) -> f64 {
        if self.0 == Axis::X {
            1.0
        } else {
            0.0
        }
    }

    fn derivative_y(&self, _x: f64, _y: f64) -> f64 {
        if self.0 == Axis::Y {
            1.0
        } else {
            0.0
        }
    }
}

// ============================================================================
// TWO-DIMENSIONAL INTERPOLANTS
// ============================================================================

/// Bilinear interpolation on a rectilinear grid; `values[i][j]` sits at `(x[i], y[j])`
#[derive(Debug, Clone)]
pub struct BilinearInterp {
    values: Vec<Vec<f64>>,
    x: Vec<f64>,
    y: Vec<f64>,
}

impl BilinearInterp {
    pub fn new(values: Vec<Vec<f64>>, x: Vec<f64>, y: Vec<f64>) -> SolverResult<Self> {
        check_nodes("BilinearInterp (x)", &x, values.len())?;
        for row in &values {
            check_nodes("BilinearInterp (y)", &y, row.len())?;
        }
        Ok(Self { values, x, y })
    }

    fn locate(&self, x: f64, y: f64) -> (usize, usize, f64, f64) {
        let i = segment(&self.x, x);
        let j = segment(&self.y, y);
        let alpha = (x - self.x[i]) / (self.x[i + 1] - self.x[i]);
        let beta = (y - self.y[j]) / (self.y[j + 1] - self.y[j]);
        (i, j, alpha, beta)
    }
}

impl Function2D for BilinearInterp {
    fn eval(&self, x: f64, y: f64) -> f64 {
        let (i, j, alpha, beta) = self.locate(x, y);
        let f = &self.values;
        (1.0 - alpha) * (1.0 - beta) * f[i][j]
            + (1.0 - alpha) * beta * f[i][j + 1]
            + alpha * (1.0 - beta) * f[i + 1][j]
            + alpha * beta * f[i + 1][j + 1]
    }

    fn derivative_x(&self, x: f64, y: f64) -> f64 {
        let (i, j, _, beta) = self.locate(x, y);
        let f = &self.values;
        let low = (1.0 - beta) * f[i][j] + beta * f[i][j + 1];
        let high = (1.0 - beta) * f[i + 1][j] + beta * f[i + 1][j + 1];
        (high - low) / (self.x[i + 1] - self.x[i])
    }

    fn derivative_y(&self, x: f64, y: f64) -> f64 {
        let (i, j, alpha, _) = self.locate(x, y);
        let f = &self.values;
        let low = (1.0 - alpha) * f[i][j] + alpha * f[i + 1][j];
        let high = (1.0 - alpha) * f[i][j + 1] + alpha * f[i + 1][j + 1];
        (high - low) / (self.y[j + 1] - self.y[j])
    }
}

/// Linear interpolation across a family of 1-D functions indexed by `y`
#[derive(Debug, Clone)]
pub struct LinearInterpOnInterp1D<F> {
    funcs: Vec<F>,
    y: Vec<f64>,
}

impl<F: Function1D> LinearInterpOnInterp1D<F> {
    pub fn new(funcs: Vec<F>, y: Vec<f64>) -> SolverResult<Self> {
        check_nodes("LinearInterpOnInterp1D", &y, funcs.len())?;
        Ok(Self { funcs, y })
    }

    pub fn funcs(&self) -> &[F] {
        &self.funcs
    }
}

impl<F: Function1D> Function2D for LinearInterpOnInterp1D<F> {
    fn eval(&self, x: f64, y: f64) -> f64 {
        let j = segment(&self.y, y);
        let beta = (y - self.y[j]) / (self.y[j + 1] - self.y[j]);
        (1.0 - beta) * self.funcs[j].eval(x) + beta * self.funcs[j + 1].eval(x)
    }

    fn derivative_x(&self, x: f64, y: f64) -> f64 {
        let j = segment(&self.y, y);
        let beta = (y - self.y[j]) / (self.y[j + 1] - self.y[j]);
        (1.0 - beta) * self.funcs[j].derivative(x) + beta * self.funcs[j + 1].derivative(x)
    }

    fn derivative_y(&self, x: f64, y: f64) -> f64 {
        let j = segment(&self.y, y);
        (self.funcs[j + 1].eval(x) - self.funcs[j].eval(x)) / (self.y[j + 1] - self.y[j])
    }
}
