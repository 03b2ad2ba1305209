//! Discrete shock distributions and the expectation operator
//!
//! Every distribution the solver integrates over is a finite set of atoms with
//! matching probability masses. Atoms may be scalars (risky return factors),
//! income shock pairs, or the full joint realization of all three shocks.
//! Continuous lognormal shocks are discretized with equiprobable bins whose
//! atoms are the conditional means of each bin.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::{SolverError, SolverResult};

/// Tolerance on the total probability mass
const MASS_TOLERANCE: f64 = 1e-9;

/// One realization of next period's income shocks
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IncomeShock {
    /// Permanent income shock
    pub perm: f64,
    /// Transitory income shock
    pub tran: f64,
}

/// One joint realization of income shocks and the risky return factor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShockRealization {
    pub perm: f64,
    pub tran: f64,
    pub risky: f64,
}

/// A discrete distribution: atoms with probability masses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscreteDistribution<T> {
    pmv: Vec<f64>,
    atoms: Vec<T>,
}

pub type ReturnDstn = DiscreteDistribution<f64>;
pub type IncomeShockDstn = DiscreteDistribution<IncomeShock>;
pub type JointShockDstn = DiscreteDistribution<ShockRealization>;

impl<T> DiscreteDistribution<T> {
    /// Build a distribution, checking that masses are valid and sum to one
    pub fn new(pmv: Vec<f64>, atoms: Vec<T>) -> SolverResult<Self> {
        if pmv.is_empty() {
            return Err(SolverError::InvalidDistribution(
                "distribution must have at least one atom".to_string(),
            ));
        }
        if pmv.len() != atoms.len() {
            return Err(SolverError::InvalidDistribution(format!(
                "{} probabilities for {} atoms",
                pmv.len(),
                atoms.len()
            )));
        }
        if pmv.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(SolverError::InvalidDistribution(
                "probabilities must be finite and non-negative".to_string(),
            ));
        }
        let total: f64 = pmv.iter().sum();
        if (total - 1.0).abs() > MASS_TOLERANCE {
            return Err(SolverError::InvalidDistribution(format!(
                "probabilities sum to {total}, expected 1"
            )));
        }
        Ok(Self { pmv, atoms })
    }

    /// Degenerate distribution with all mass on one atom
    pub fn degenerate(atom: T) -> Self {
        Self {
            pmv: vec![1.0],
            atoms: vec![atom],
        }
    }

    pub fn pmv(&self) -> &[f64] {
        &self.pmv
    }

    pub fn atoms(&self) -> &[T] {
        &self.atoms
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Iterate over (probability, atom) pairs
    pub fn iter(&self) -> impl Iterator<Item = (f64, &T)> {
        self.pmv.iter().copied().zip(self.atoms.iter())
    }

    /// Probability-weighted average of `f` over the atoms
    pub fn expected<F>(&self, f: F) -> f64
    where
        F: Fn(&T) -> f64,
    {
        self.iter().map(|(p, atom)| p * f(atom)).sum()
    }

    /// Expectation of a function with several outputs, computed in one pass
    pub fn expected_array<const N: usize, F>(&self, f: F) -> [f64; N]
    where
        F: Fn(&T) -> [f64; N],
    {
        let mut acc = [0.0; N];
        for (p, atom) in self.iter() {
            let values = f(atom);
            for (a, v) in acc.iter_mut().zip(values.iter()) {
                *a += p * v;
            }
        }
        acc
    }

    /// Transform every atom, keeping the masses
    pub fn map<U, F>(&self, f: F) -> DiscreteDistribution<U>
    where
        F: Fn(&T) -> U,
    {
        DiscreteDistribution {
            pmv: self.pmv.clone(),
            atoms: self.atoms.iter().map(f).collect(),
        }
    }
}

impl DiscreteDistribution<f64> {
    /// Equiprobable discretization of a lognormal with log-mean `mu` and log-std `sigma`
    pub fn lognormal(mu: f64, sigma: f64, count: usize) -> SolverResult<Self> {
        if count == 0 {
            return Err(SolverError::InvalidDistribution(
                "lognormal approximation needs at least one node".to_string(),
            ));
        }
        if !sigma.is_finite() || sigma < 0.0 {
            return Err(SolverError::InvalidDistribution(format!(
                "lognormal sigma must be non-negative, got {sigma}"
            )));
        }
        if sigma == 0.0 || count == 1 {
            return Ok(Self::degenerate((mu + 0.5 * sigma * sigma).exp()));
        }

        let normal = Normal::new(0.0, 1.0)
            .map_err(|e| SolverError::InvalidDistribution(format!("standard normal: {e}")))?;
        let n = count as f64;
        let cutoffs: Vec<f64> = (0..=count)
            .map(|i| match i {
                0 => f64::NEG_INFINITY,
                i if i == count => f64::INFINITY,
                i => normal.inverse_cdf(i as f64 / n),
            })
            .collect();

        let mean = (mu + 0.5 * sigma * sigma).exp();
        let pmv = vec![1.0 / n; count];
        let atoms = cutoffs
            .windows(2)
            .map(|bin| {
                let upper = normal.cdf(bin[1] - sigma);
                let lower = normal.cdf(bin[0] - sigma);
                mean * (upper - lower) * n
            })
            .collect();

        Self::new(pmv, atoms)
    }

    /// Lognormal with unit mean, used for income shocks
    pub fn mean_one_lognormal(sigma: f64, count: usize) -> SolverResult<Self> {
        Self::lognormal(-0.5 * sigma * sigma, sigma, count)
    }

    /// Lognormal parameterized by the mean and standard deviation of its level
    pub fn lognormal_from_mean_std(mean: f64, std: f64, count: usize) -> SolverResult<Self> {
        if mean <= 0.0 {
            return Err(SolverError::InvalidDistribution(format!(
                "lognormal mean must be positive, got {mean}"
            )));
        }
        let log_var = (1.0 + (std / mean).powi(2)).ln();
        let mu = mean.ln() - 0.5 * log_var;
        Self::lognormal(mu, log_var.sqrt(), count)
    }

    /// Add an outcome `x` with probability `p`, rescaling the other atoms so the mean is unchanged
    pub fn add_unemployment(&self, p: f64, x: f64) -> SolverResult<Self> {
        if p <= 0.0 {
            return Ok(self.clone());
        }
        if p >= 1.0 {
            return Err(SolverError::InvalidDistribution(format!(
                "unemployment probability must be below 1, got {p}"
            )));
        }
        let scale = (1.0 - p * x) / (1.0 - p);
        let mut pmv = vec![p];
        pmv.extend(self.pmv.iter().map(|q| q * (1.0 - p)));
        let mut atoms = vec![x];
        atoms.extend(self.atoms.iter().map(|a| a * scale));
        Self::new(pmv, atoms)
    }

    pub fn min_atom(&self) -> f64 {
        self.atoms.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max_atom(&self) -> f64 {
        self.atoms.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn mean(&self) -> f64 {
        self.expected(|x| *x)
    }
}

/// Cartesian product of two independent distributions
pub fn combine_independent<A, B, T, F>(
    first: &DiscreteDistribution<A>,
    second: &DiscreteDistribution<B>,
    combine: F,
) -> DiscreteDistribution<T>
where
    F: Fn(&A, &B) -> T,
{
    let mut pmv = Vec::with_capacity(first.len() * second.len());
    let mut atoms = Vec::with_capacity(first.len() * second.len());
    for (p, a) in first.iter() {
        for (q, b) in second.iter() {
            pmv.push(p * q);
            atoms.push(combine(a, b));
        }
    }
    DiscreteDistribution { pmv, atoms }
}

impl DiscreteDistribution<IncomeShock> {
    /// Independent permanent and transitory shocks with an unemployment outcome
    pub fn income_shocks(
        perm_shk_std: f64,
        perm_shk_count: usize,
        tran_shk_std: f64,
        tran_shk_count: usize,
        unemp_prb: f64,
        inc_unemp: f64,
    ) -> SolverResult<Self> {
        let perm = ReturnDstn::mean_one_lognormal(perm_shk_std, perm_shk_count)?;
        let tran = ReturnDstn::mean_one_lognormal(tran_shk_std, tran_shk_count)?
            .add_unemployment(unemp_prb, inc_unemp)?;
        Ok(combine_independent(&perm, &tran, |&perm, &tran| {
            IncomeShock { perm, tran }
        }))
    }

    /// No income risk: both shocks equal one
    pub fn no_risk() -> Self {
        Self::degenerate(IncomeShock {
            perm: 1.0,
            tran: 1.0,
        })
    }

    /// Smallest transitory shock; zero means the natural borrowing constraint is zero
    pub fn min_tran_shock(&self) -> f64 {
        self.atoms
            .iter()
            .map(|s| s.tran)
            .fold(f64::INFINITY, f64::min)
    }
}

impl DiscreteDistribution<ShockRealization> {
    /// Joint distribution of independent income shocks and risky returns
    pub fn independent(income: &IncomeShockDstn, risky: &ReturnDstn) -> Self {
        combine_independent(income, risky, |inc, &risky| ShockRealization {
            perm: inc.perm,
            tran: inc.tran,
            risky,
        })
    }
}
