//! Maps agent states to controls using a solved life cycle
//!
//! Each period an agent either may re-optimize its risky share (with
//! probability `adjust_prb`) or keeps the share it held coming in.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{SolverError, SolverResult};
use crate::solution::{Controls, Regime};

use super::LifecycleSolution;

/// State of one simulated agent at the start of a period
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    /// Period of the life cycle the agent is in
    pub t: usize,

    /// Normalized market resources
    pub m_nrm: f64,

    /// Whether the agent may adjust its share this period
    pub adjust: bool,

    /// Risky share carried in from last period
    pub share_prev: f64,
}

impl AgentState {
    pub fn regime(&self) -> Regime {
        Regime::from_flag(self.adjust, self.share_prev)
    }
}

/// Reads controls off a solved life cycle
#[derive(Debug, Clone, Copy)]
pub struct PortfolioController<'a> {
    solution: &'a LifecycleSolution,
}

impl<'a> PortfolioController<'a> {
    pub fn new(solution: &'a LifecycleSolution) -> Self {
        Self { solution }
    }

    /// Controls for one agent
    pub fn control(&self, state: &AgentState) -> SolverResult<Controls> {
        let t = if self.solution.infinite_horizon {
            state.t % self.solution.len().max(1)
        } else {
            state.t
        };
        let period = self.solution.period(t).ok_or_else(|| {
            SolverError::invalid(
                "t",
                format!("period {} is outside the {}-period solution", state.t, self.solution.len()),
            )
        })?;
        Ok(period.controls(state.m_nrm, state.regime()))
    }

    /// Controls for a population, in input order
    pub fn get_controls(&self, states: &[AgentState]) -> SolverResult<Vec<Controls>> {
        states.iter().map(|s| self.control(s)).collect()
    }
}

/// Independent draws of the "may adjust" flag for `n` agents
pub fn draw_adjust_flags<R: Rng>(n: usize, adjust_prb: f64, rng: &mut R) -> Vec<bool> {
    let p = adjust_prb.clamp(0.0, 1.0);
    (0..n).map(|_| rng.gen_bool(p)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::PortfolioConsumerType;
    use crate::params::PortfolioParams;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn solved(adjust_prb: f64) -> LifecycleSolution {
        PortfolioConsumerType::new(PortfolioParams {
            adjust_prb,
            a_xtra_count: 30,
            a_xtra_max: 50.0,
            share_count: 11,
            perm_shk_count: 3,
            tran_shk_count: 3,
            risky_count: 3,
            cycles: 2,
            ..Default::default()
        })
        .unwrap()
        .solve()
        .unwrap()
    }

    #[test]
    fn test_flags_follow_probability() {
        let mut rng = StdRng::seed_from_u64(42);
        assert!(draw_adjust_flags(1000, 1.0, &mut rng).iter().all(|&f| f));
        assert!(draw_adjust_flags(1000, 0.0, &mut rng).iter().all(|&f| !f));

        let flags = draw_adjust_flags(10_000, 0.3, &mut rng);
        let share = flags.iter().filter(|&&f| f).count() as f64 / 10_000.0;
        assert!((share - 0.3).abs() < 0.03, "adjust share {share}");
    }

    #[test]
    fn test_non_adjusters_keep_their_share() {
        let sol = solved(0.5);
        let ctrl = PortfolioController::new(&sol);
        let states = [
            AgentState { t: 0, m_nrm: 3.0, adjust: false, share_prev: 0.4 },
            AgentState { t: 0, m_nrm: 3.0, adjust: true, share_prev: 0.4 },
        ];
        let controls = ctrl.get_controls(&states).unwrap();
        assert_eq!(controls[0].share, 0.4);
        assert!(controls[1].share >= 0.0 && controls[1].share <= 1.0);
        assert!(controls[0].consumption > 0.0 && controls[0].consumption < 3.0);
    }

    #[test]
    fn test_period_out_of_range_is_an_error() {
        let sol = solved(1.0);
        let ctrl = PortfolioController::new(&sol);
        let state = AgentState { t: 99, m_nrm: 1.0, adjust: true, share_prev: 0.0 };
        assert!(ctrl.control(&state).is_err());
    }
}
