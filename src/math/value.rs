//! Value and marginal value functions recovered from pseudo-inverse interpolants
//!
//! Value functions of CRRA agents are steeply curved near zero. Interpolating
//! the pseudo-inverse u⁻¹(v) (or (u')⁻¹(v') for marginal value), which is close
//! to linear, and re-curving on evaluation keeps the interpolation accurate.

use super::interpolation::{Function1D, Function2D};
use super::utility::CrraUtility;

/// v(m) = u(vNvrs(m))
#[derive(Debug, Clone)]
pub struct ValueFuncCrra<F> {
    v_nvrs: F,
    utility: CrraUtility,
}

impl<F: Function1D> ValueFuncCrra<F> {
    pub fn new(v_nvrs: F, crra: f64) -> Self {
        Self {
            v_nvrs,
            utility: CrraUtility::new(crra),
        }
    }
}

impl<F: Function1D> Function1D for ValueFuncCrra<F> {
    fn eval(&self, x: f64) -> f64 {
        self.utility.u(self.v_nvrs.eval(x))
    }

    fn derivative(&self, x: f64) -> f64 {
        self.utility.der(self.v_nvrs.eval(x)) * self.v_nvrs.derivative(x)
    }
}

/// v(m, s) = u(vNvrs(m, s))
#[derive(Debug, Clone)]
pub struct ValueFuncCrra2D<F> {
    v_nvrs: F,
    utility: CrraUtility,
}

impl<F: Function2D> ValueFuncCrra2D<F> {
    pub fn new(v_nvrs: F, crra: f64) -> Self {
        Self {
            v_nvrs,
            utility: CrraUtility::new(crra),
        }
    }
}

impl<F: Function2D> Function2D for ValueFuncCrra2D<F> {
    fn eval(&self, x: f64, y: f64) -> f64 {
        self.utility.u(self.v_nvrs.eval(x, y))
    }

    fn derivative_x(&self, x: f64, y: f64) -> f64 {
        self.utility.der(self.v_nvrs.eval(x, y)) * self.v_nvrs.derivative_x(x, y)
    }

    fn derivative_y(&self, x: f64, y: f64) -> f64 {
        self.utility.der(self.v_nvrs.eval(x, y)) * self.v_nvrs.derivative_y(x, y)
    }
}

/// v'(m) = u'(c(m)), where `c` is a consumption function or any pseudo-inverse marginal value
#[derive(Debug, Clone)]
pub struct MargValueFuncCrra<F> {
    c_func: F,
    utility: CrraUtility,
}

impl<F: Function1D> MargValueFuncCrra<F> {
    pub fn new(c_func: F, crra: f64) -> Self {
        Self {
            c_func,
            utility: CrraUtility::new(crra),
        }
    }
}

impl<F: Function1D> Function1D for MargValueFuncCrra<F> {
    fn eval(&self, x: f64) -> f64 {
        self.utility.der(self.c_func.eval(x))
    }

    /// Marginal marginal value, -ρ c^(-ρ-1) c'(m)
    fn derivative(&self, x: f64) -> f64 {
        let c = self.c_func.eval(x);
        -self.utility.crra * c.powf(-self.utility.crra - 1.0) * self.c_func.derivative(x)
    }
}

/// Two-dimensional counterpart of [`MargValueFuncCrra`]
#[derive(Debug, Clone)]
pub struct MargValueFuncCrra2D<F> {
    c_func: F,
    utility: CrraUtility,
}

impl<F: Function2D> MargValueFuncCrra2D<F> {
    pub fn new(c_func: F, crra: f64) -> Self {
        Self {
            c_func,
            utility: CrraUtility::new(crra),
        }
    }
}

impl<F: Function2D> Function2D for MargValueFuncCrra2D<F> {
    fn eval(&self, x: f64, y: f64) -> f64 {
        self.utility.der(self.c_func.eval(x, y))
    }

    fn derivative_x(&self, x: f64, y: f64) -> f64 {
        let c = self.c_func.eval(x, y);
        -self.utility.crra * c.powf(-self.utility.crra - 1.0) * self.c_func.derivative_x(x, y)
    }

    fn derivative_y(&self, x: f64, y: f64) -> f64 {
        let c = self.c_func.eval(x, y);
        -self.utility.crra * c.powf(-self.utility.crra - 1.0) * self.c_func.derivative_y(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::interpolation::{IdentityFunction, IdentityFunction2D, Axis};
    use approx::assert_relative_eq;

    #[test]
    fn test_identity_recovers_utility() {
        let v = ValueFuncCrra::new(IdentityFunction, 5.0);
        let u = CrraUtility::new(5.0);
        assert_relative_eq!(v.eval(2.0), u.u(2.0));
        assert_relative_eq!(v.derivative(2.0), u.der(2.0));
    }

    #[test]
    fn test_marginal_value_of_identity() {
        let vp = MargValueFuncCrra::new(IdentityFunction, 2.0);
        assert_relative_eq!(vp.eval(2.0), 0.25);
        assert_relative_eq!(vp.derivative(2.0), -2.0 * 2.0_f64.powf(-3.0));

        let vp2 = MargValueFuncCrra2D::new(IdentityFunction2D(Axis::X), 2.0);
        assert_relative_eq!(vp2.eval(2.0, 0.7), 0.25);
        assert_eq!(vp2.derivative_y(2.0, 0.7), 0.0);
    }
}
