//! Limiting behaviour of the solution as market resources grow without bound

use crate::math::{JointShockDstn, ReturnDstn};

use super::PeriodParams;

/// Asymptotic consumption line `mpc_min * (m + h_nrm)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AsymptoticLimits {
    /// Limiting marginal propensity to consume
    pub mpc_min: f64,

    /// Normalized human wealth
    pub h_nrm: f64,
}

impl AsymptoticLimits {
    pub fn intercept(&self) -> f64 {
        self.mpc_min * self.h_nrm
    }

    pub fn slope(&self) -> f64 {
        self.mpc_min
    }
}

/// Limiting MPC and human wealth given next period's values
///
/// The portfolio return is evaluated at the limiting share, the only share a
/// very wealthy agent holds.
pub fn asymptotic_limits(
    mpc_min_next: f64,
    h_nrm_next: f64,
    risky: &ReturnDstn,
    joint: &JointShockDstn,
    params: &PeriodParams,
) -> AsymptoticLimits {
    let crra = params.crra;
    let rfree = params.rfree;
    let share = params.share_limit;
    let portfolio = |r: f64| share * r + (1.0 - share) * rfree;

    // Certainty-equivalent-like return adjustment
    let r_adj = risky.expected(|&r| portfolio(r).powf(1.0 - crra));
    let pat_fac = (params.disc_eff() * r_adj).powf(1.0 / crra);
    let mpc_min = 1.0 / (1.0 + pat_fac / mpc_min_next);

    let h_nrm = joint.expected(|shk| {
        let growth = params.perm_gro_fac * shk.perm;
        growth / portfolio(shk.risky).powf(crra) * (shk.tran + h_nrm_next)
    }) / r_adj;

    AsymptoticLimits { mpc_min, h_nrm }
}

/// Limiting risky share of a CRRA investor facing `risky` against `rfree`
///
/// Solves E[(R - Rf) (Rf + s (R - Rf))^-ρ] = 0 for s by bisection. The
/// expression is decreasing in s, so corners are returned when it does not
/// change sign on [0, 1].
pub fn merton_samuelson_share(risky: &ReturnDstn, rfree: f64, crra: f64) -> f64 {
    let foc = |s: f64| {
        risky.expected(|&r| {
            let excess = r - rfree;
            excess * (rfree + s * excess).powf(-crra)
        })
    };

    if foc(0.0) <= 0.0 {
        return 0.0;
    }
    if foc(1.0) >= 0.0 {
        return 1.0;
    }

    let (mut lo, mut hi) = (0.0_f64, 1.0_f64);
    for _ in 0..100 {
        let mid = 0.5 * (lo + hi);
        if foc(mid) > 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo < 1e-12 {
            break;
        }
    }
    0.5 * (lo + hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::IncomeShockDstn;
    use approx::assert_relative_eq;

    fn params(share_limit: f64) -> PeriodParams {
        PeriodParams {
            liv_prb: 1.0,
            disc_fac: 0.9,
            crra: 5.0,
            rfree: 1.03,
            perm_gro_fac: 1.0,
            boro_cnst_art: 0.0,
            adjust_prb: 1.0,
            share_limit,
            vfunc: false,
            discrete_share: false,
            indep_dstn: true,
        }
    }

    #[test]
    fn test_share_limit_is_interior_for_standard_calibration() {
        let risky = ReturnDstn::lognormal_from_mean_std(1.08, 0.20, 5).unwrap();
        let s = merton_samuelson_share(&risky, 1.03, 5.0);
        assert!(s > 0.0 && s < 1.0, "share limit {s}");
        // Roughly premium / (crra * variance)
        assert!((s - 0.05 / (5.0 * 0.04)).abs() < 0.15, "share limit {s}");
    }

    #[test]
    fn test_share_limit_corners() {
        let bad = ReturnDstn::lognormal_from_mean_std(1.00, 0.20, 5).unwrap();
        assert_eq!(merton_samuelson_share(&bad, 1.03, 5.0), 0.0);

        let great = ReturnDstn::lognormal_from_mean_std(1.50, 0.05, 5).unwrap();
        assert_eq!(merton_samuelson_share(&great, 1.03, 2.0), 1.0);
    }

    #[test]
    fn test_limits_without_risk_match_perfect_foresight() {
        // Without risk the limits follow the perfect foresight recursion
        let risky = ReturnDstn::degenerate(1.03);
        let joint = JointShockDstn::independent(&IncomeShockDstn::no_risk(), &risky);
        let p = params(0.0);
        let lim = asymptotic_limits(1.0, 0.0, &risky, &joint, &p);

        let r = 1.03_f64;
        let pat = (0.9 * r.powf(-4.0)).powf(0.2);
        assert_relative_eq!(lim.mpc_min, 1.0 / (1.0 + pat), epsilon = 1e-12);
        // One period of income discounted at the riskless rate
        assert_relative_eq!(lim.h_nrm, 1.0 / r, epsilon = 1e-12);
        assert_relative_eq!(lim.intercept(), lim.mpc_min * lim.h_nrm);
    }
}
