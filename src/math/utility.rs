//! CRRA utility primitive
//!
//! u(c) = c^(1-ρ)/(1-ρ), or ln(c) when ρ = 1. The inverse functions are used
//! throughout the solver to move between value, marginal value and their
//! "pseudo-inverse" (consumption-like) representations.

/// Constant relative risk aversion utility with coefficient `crra`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrraUtility {
    pub crra: f64,
}

impl CrraUtility {
    pub fn new(crra: f64) -> Self {
        Self { crra }
    }

    fn is_log(&self) -> bool {
        (self.crra - 1.0).abs() < 1e-12
    }

    /// Utility level u(c)
    pub fn u(&self, c: f64) -> f64 {
        if self.is_log() {
            c.ln()
        } else {
            c.powf(1.0 - self.crra) / (1.0 - self.crra)
        }
    }

    /// Marginal utility u'(c) = c^-ρ
    pub fn der(&self, c: f64) -> f64 {
        c.powf(-self.crra)
    }

    /// Inverse marginal utility: the consumption at which u'(c) = x
    pub fn der_inv(&self, x: f64) -> f64 {
        x.powf(-1.0 / self.crra)
    }

    /// Inverse utility: the consumption at which u(c) = v
    pub fn inv(&self, v: f64) -> f64 {
        if self.is_log() {
            v.exp()
        } else {
            ((1.0 - self.crra) * v).powf(1.0 / (1.0 - self.crra))
        }
    }

    /// Derivative of the inverse utility function with respect to v
    pub fn inv_der(&self, v: f64) -> f64 {
        if self.is_log() {
            v.exp()
        } else {
            ((1.0 - self.crra) * v).powf(self.crra / (1.0 - self.crra))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_inverse_roundtrips() {
        let u = CrraUtility::new(5.0);
        for &c in &[0.1, 0.5, 1.0, 3.0, 25.0] {
            assert_relative_eq!(u.inv(u.u(c)), c, max_relative = 1e-10);
            assert_relative_eq!(u.der_inv(u.der(c)), c, max_relative = 1e-10);
        }
    }

    #[test]
    fn test_inv_der_matches_finite_difference() {
        let u = CrraUtility::new(3.0);
        let v = u.u(2.0);
        let h = 1e-7;
        let fd = (u.inv(v + h) - u.inv(v - h)) / (2.0 * h);
        assert_relative_eq!(u.inv_der(v), fd, max_relative = 1e-5);
    }

    #[test]
    fn test_log_utility() {
        let u = CrraUtility::new(1.0);
        assert_relative_eq!(u.u(std::f64::consts::E), 1.0, epsilon = 1e-12);
        assert_relative_eq!(u.inv(0.0), 1.0, epsilon = 1e-12);
        assert_relative_eq!(u.der(2.0), 0.5, epsilon = 1e-12);
    }
}
