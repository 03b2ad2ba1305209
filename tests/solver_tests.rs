use std::sync::Arc;

use portfolio_choice::agent::{draw_adjust_flags, AgentState, PortfolioController};
use portfolio_choice::math::{ConstantFunction, Function1D, IncomeShockDstn, ReturnDstn};
use portfolio_choice::params::{linspace, make_grid_exp_mult};
use portfolio_choice::solver::merton_samuelson_share;
use portfolio_choice::{
    solve_one_period, PeriodParams, PortfolioConsumerType, PortfolioParams, PortfolioSolution,
    Regime, ShockDistributions, SolverError,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

// ===========================================================================
// Fixtures
// ===========================================================================

/// Default calibration on coarser grids to keep the tests quick
fn small_params() -> PortfolioParams {
    PortfolioParams {
        a_xtra_count: 48,
        a_xtra_max: 60.0,
        share_count: 25,
        perm_shk_count: 3,
        tran_shk_count: 3,
        risky_count: 5,
        ..Default::default()
    }
}

fn period_params(adjust_prb: f64, share_limit: f64) -> PeriodParams {
    PeriodParams {
        liv_prb: 0.98,
        disc_fac: 0.9,
        crra: 5.0,
        rfree: 1.03,
        perm_gro_fac: 1.01,
        boro_cnst_art: 0.0,
        adjust_prb,
        share_limit,
        vfunc: false,
        discrete_share: false,
        indep_dstn: true,
    }
}

fn income_shocks() -> IncomeShockDstn {
    IncomeShockDstn::income_shocks(0.1, 3, 0.1, 3, 0.05, 0.3).unwrap()
}

fn relative_gap(a: f64, b: f64) -> f64 {
    (a - b).abs() / b.abs().max(1e-12)
}

// ===========================================================================
// Terminal period and admissibility
// ===========================================================================

#[test]
fn test_terminal_solution_is_closed_form() {
    let sol = PortfolioSolution::terminal(5.0, 0.5);
    for &m in &[0.1, 1.0, 7.5] {
        assert_eq!(sol.controls(m, Regime::Adjust).consumption, m);
        assert_eq!(sol.controls(m, Regime::Adjust).share, 0.0);
        assert_eq!(sol.controls(m, Regime::Fixed { held_share: 0.7 }).share, 0.7);
    }
}

#[test]
fn test_shares_are_admissible_everywhere() {
    let agent = PortfolioConsumerType::new(PortfolioParams {
        cycles: 3,
        adjust_prb: 0.5,
        ..small_params()
    })
    .unwrap();
    let sol = agent.solve().unwrap();

    for period in &sol.periods {
        for m in linspace(0.0, 200.0, 401) {
            // The raw share function, not the clamped control
            let share = period.share_adjust.eval(m);
            assert!((0.0..=1.0).contains(&share), "share({m}) = {share}");
            for &held in &[0.0, 0.3, 1.0] {
                assert_eq!(period.controls(m, Regime::Fixed { held_share: held }).share, held);
            }
        }
    }
}

// ===========================================================================
// Consumption function shape
// ===========================================================================

#[test]
fn test_consumption_is_monotone_and_feasible() {
    let agent = PortfolioConsumerType::new(PortfolioParams {
        cycles: 3,
        adjust_prb: 0.5,
        ..small_params()
    })
    .unwrap();
    let sol = agent.solve().unwrap();
    let m_grid = linspace(0.0, 100.0, 1001);

    for (t, period) in sol.periods.iter().enumerate() {
        let mut prev = f64::NEG_INFINITY;
        for &m in &m_grid {
            let c = period.controls(m, Regime::Adjust).consumption;
            assert!(c >= prev - 1e-12, "period {t}: c not monotone at m = {m}");
            assert!(c <= m + 1e-12, "period {t}: c({m}) = {c} exceeds resources");
            prev = c;
        }
        for &held in &[0.0, 0.5, 1.0] {
            for &m in &m_grid {
                let c = period.controls(m, Regime::Fixed { held_share: held }).consumption;
                assert!(c <= m + 1e-12, "period {t}, share {held}: c({m}) = {c}");
            }
        }
    }
}

// ===========================================================================
// Integration paths agree
// ===========================================================================

#[test]
fn test_integration_paths_agree_exactly_on_grid() {
    // A riskless "risky" asset keeps every post-return balance on the grid
    let shocks = ShockDistributions::independent(income_shocks(), ReturnDstn::degenerate(1.03));
    let a_grid = make_grid_exp_mult(0.001, 30.0, 40, 1).unwrap();
    let share_grid = linspace(0.0, 1.0, 11);

    let joint = PeriodParams {
        indep_dstn: false,
        ..period_params(0.5, 0.0)
    };
    let indep = PeriodParams {
        indep_dstn: true,
        ..joint.clone()
    };

    // Two steps so next period's functions are interpolants rather than closed forms
    let terminal = PortfolioSolution::terminal(5.0, 0.5);
    let next = solve_one_period(&terminal, &shocks, &joint, &a_grid, &share_grid).unwrap();

    let via_joint = solve_one_period(&next, &shocks, &joint, &a_grid, &share_grid).unwrap();
    let via_indep = solve_one_period(&next, &shocks, &indep, &a_grid, &share_grid).unwrap();

    for (row_j, row_i) in via_joint.aux.eop_dvda_fxd.iter().zip(&via_indep.aux.eop_dvda_fxd) {
        for (a, b) in row_j.iter().zip(row_i) {
            assert!(relative_gap(*b, *a) < 1e-6, "dvda: joint {a}, independent {b}");
        }
    }
    for (row_j, row_i) in via_joint.aux.eop_dvds_fxd.iter().zip(&via_indep.aux.eop_dvds_fxd) {
        for (a, b) in row_j.iter().zip(row_i) {
            assert!((a - b).abs() <= 1e-6 * a.abs().max(1e-8), "dvds: joint {a}, independent {b}");
        }
    }
    for m in linspace(0.5, 25.0, 50) {
        let cj = via_joint.controls(m, Regime::Adjust).consumption;
        let ci = via_indep.controls(m, Regime::Adjust).consumption;
        assert!(relative_gap(ci, cj) < 1e-6, "c({m}): joint {cj}, independent {ci}");
    }
}

#[test]
fn test_integration_paths_agree_with_risky_returns() {
    let base = PortfolioParams {
        cycles: 2,
        a_xtra_count: 100,
        ..small_params()
    };
    let joint = PortfolioConsumerType::new(PortfolioParams {
        indep_dstn: false,
        ..base.clone()
    })
    .unwrap()
    .solve()
    .unwrap();
    let indep = PortfolioConsumerType::new(base).unwrap().solve().unwrap();

    let cj = joint.period(0).unwrap();
    let ci = indep.period(0).unwrap();
    for m in linspace(0.5, 40.0, 80) {
        let a = cj.controls(m, Regime::Adjust).consumption;
        let b = ci.controls(m, Regime::Adjust).consumption;
        assert!(relative_gap(b, a) < 1e-2, "c({m}): joint {a}, independent {b}");
    }
}

#[test]
fn test_integration_paths_agree_on_values() {
    let base = PortfolioParams {
        cycles: 3,
        adjust_prb: 0.5,
        vfunc: true,
        a_xtra_count: 100,
        ..small_params()
    };
    let joint = PortfolioConsumerType::new(PortfolioParams {
        indep_dstn: false,
        ..base.clone()
    })
    .unwrap()
    .solve()
    .unwrap();
    let indep = PortfolioConsumerType::new(base).unwrap().solve().unwrap();

    let vj = joint.period(0).unwrap();
    let vi = indep.period(0).unwrap();
    assert!(vj.has_value_functions() && vi.has_value_functions());
    for m in linspace(0.5, 40.0, 80) {
        let a = vj.value(m, Regime::Adjust).unwrap();
        let b = vi.value(m, Regime::Adjust).unwrap();
        assert!(relative_gap(b, a) < 5e-2, "v_adj({m}): joint {a}, independent {b}");
        for &held in &[0.0, 0.5, 1.0] {
            let regime = Regime::Fixed { held_share: held };
            let a = vj.value(m, regime).unwrap();
            let b = vi.value(m, regime).unwrap();
            assert!(relative_gap(b, a) < 5e-2, "v_fxd({m}, {held}): joint {a}, independent {b}");
        }
    }
}

// ===========================================================================
// Discrete share choice
// ===========================================================================

fn mean_share_gap(a: &PortfolioSolution, b: &PortfolioSolution, m_grid: &[f64]) -> f64 {
    m_grid
        .iter()
        .map(|&m| (a.controls(m, Regime::Adjust).share - b.controls(m, Regime::Adjust).share).abs())
        .sum::<f64>()
        / m_grid.len() as f64
}

#[test]
fn test_discrete_choice_approaches_continuous() {
    let shocks = ShockDistributions::independent(
        IncomeShockDstn::no_risk(),
        ReturnDstn::lognormal_from_mean_std(1.08, 0.20, 5).unwrap(),
    );
    let share_limit = merton_samuelson_share(&shocks.risky, 1.03, 5.0);
    let a_grid = make_grid_exp_mult(0.001, 30.0, 100, 1).unwrap();
    let terminal = PortfolioSolution::terminal(5.0, 1.0);
    let m_grid = linspace(1.0, 20.0, 39);

    for indep_dstn in [true, false] {
        let continuous = PeriodParams {
            vfunc: true,
            indep_dstn,
            ..period_params(1.0, share_limit)
        };
        let discrete = PeriodParams {
            discrete_share: true,
            ..continuous.clone()
        };

        let cont = solve_one_period(&terminal, &shocks, &continuous, &a_grid, &linspace(0.0, 1.0, 25)).unwrap();
        let coarse = solve_one_period(&terminal, &shocks, &discrete, &a_grid, &linspace(0.0, 1.0, 25)).unwrap();
        let fine = solve_one_period(&terminal, &shocks, &discrete, &a_grid, &linspace(0.0, 1.0, 250)).unwrap();

        for &m in &m_grid {
            let c = cont.controls(m, Regime::Adjust);
            let d = fine.controls(m, Regime::Adjust);
            assert!(
                (c.share - d.share).abs() < 0.05,
                "indep {indep_dstn}, share({m}): continuous {}, discrete {}",
                c.share,
                d.share
            );
            assert!(
                relative_gap(d.consumption, c.consumption) < 1e-2,
                "indep {indep_dstn}, c({m}): continuous {}, discrete {}",
                c.consumption,
                d.consumption
            );
        }

        // Refining the share grid moves the discrete choice toward the continuous one
        let coarse_gap = mean_share_gap(&coarse, &cont, &m_grid);
        let fine_gap = mean_share_gap(&fine, &cont, &m_grid);
        assert!(
            fine_gap < coarse_gap,
            "indep {indep_dstn}: 250-point gap {fine_gap}, 25-point gap {coarse_gap}"
        );
    }
}

// ===========================================================================
// Limits
// ===========================================================================

#[test]
fn test_share_tends_to_limit_with_zero_income_floor() {
    let agent = PortfolioConsumerType::new(PortfolioParams {
        cycles: 3,
        inc_unemp: 0.0,
        a_xtra_max: 200.0,
        ..small_params()
    })
    .unwrap();
    assert!(agent.shocks(0).unwrap().natural_constraint_is_zero());

    let sol = agent.solve().unwrap();
    let limit = agent.share_limit();
    assert!(limit > 0.0 && limit < 1.0);
    let far = sol.period(0).unwrap().controls(1e6, Regime::Adjust).share;
    assert!((far - limit).abs() < 1e-3, "share(1e6) = {far}, limit {limit}");
}

#[test]
fn test_concrete_scenario_without_income_risk() {
    let agent = PortfolioConsumerType::new(PortfolioParams {
        crra: 5.0,
        rfree: 1.03,
        risky_avg: 1.08,
        risky_std: 0.20,
        risky_count: 5,
        disc_fac: 0.90,
        liv_prb: vec![1.0],
        adjust_prb: 1.0,
        perm_shk_std: vec![0.0],
        tran_shk_std: vec![0.0],
        unemp_prb: 0.0,
        cycles: 1,
        ..Default::default()
    })
    .unwrap();
    let sol = agent.solve().unwrap();
    let first = sol.period(0).unwrap().controls(10.0, Regime::Adjust);
    assert!(first.share > 0.0 && first.share < 1.0, "share(10) = {}", first.share);
    assert!(first.consumption > 0.0 && first.consumption < 10.0, "c(10) = {}", first.consumption);
}

// ===========================================================================
// Adjustment probability
// ===========================================================================

#[test]
fn test_fixed_regime_unused_when_always_adjusting() {
    let shocks = ShockDistributions::independent(income_shocks(), ReturnDstn::lognormal_from_mean_std(1.08, 0.2, 3).unwrap());
    let a_grid = make_grid_exp_mult(0.001, 30.0, 30, 1).unwrap();
    let share_grid = linspace(0.0, 1.0, 11);
    let params = period_params(1.0, 0.3);

    let terminal = PortfolioSolution::terminal(5.0, 1.0);
    let mut scrambled = terminal.clone();
    scrambled.dvdm_fixed = Arc::new(ConstantFunction(1e6));
    scrambled.dvds_fixed = Arc::new(ConstantFunction(-5.0));
    scrambled.consumption_fixed = Arc::new(ConstantFunction(0.0));

    let clean = solve_one_period(&terminal, &shocks, &params, &a_grid, &share_grid).unwrap();
    let noisy = solve_one_period(&scrambled, &shocks, &params, &a_grid, &share_grid).unwrap();
    for m in linspace(0.1, 30.0, 60) {
        assert_eq!(
            clean.controls(m, Regime::Adjust),
            noisy.controls(m, Regime::Adjust),
            "m = {m}"
        );
    }

    // And simulated agents are never put in the fixed regime
    let sol = PortfolioConsumerType::new(PortfolioParams { cycles: 1, ..small_params() })
        .unwrap()
        .solve()
        .unwrap();
    let ctrl = PortfolioController::new(&sol);
    let mut rng = StdRng::seed_from_u64(7);
    let states: Vec<AgentState> = draw_adjust_flags(500, 1.0, &mut rng)
        .into_iter()
        .enumerate()
        .map(|(i, adjust)| AgentState {
            t: 0,
            m_nrm: 0.5 + i as f64 * 0.05,
            adjust,
            share_prev: 0.0,
        })
        .collect();
    assert!(states.iter().all(|s| s.regime() == Regime::Adjust));
    let controls = ctrl.get_controls(&states).unwrap();
    assert_eq!(controls.len(), 500);
}

#[test]
fn test_sticky_portfolio_changes_the_solution() {
    let flexible = PortfolioConsumerType::new(PortfolioParams { cycles: 2, ..small_params() })
        .unwrap()
        .solve()
        .unwrap();
    let sticky = PortfolioConsumerType::new(PortfolioParams {
        cycles: 2,
        adjust_prb: 0.2,
        ..small_params()
    })
    .unwrap()
    .solve()
    .unwrap();
    let f = flexible.period(0).unwrap();
    let s = sticky.period(0).unwrap();
    assert_eq!(s.adjust_prb, 0.2);
    let differs = linspace(1.0, 20.0, 20)
        .into_iter()
        .any(|m| (f.controls(m, Regime::Adjust).share - s.controls(m, Regime::Adjust).share).abs() > 1e-6);
    assert!(differs);
}

// ===========================================================================
// Configuration errors
// ===========================================================================

#[test]
fn test_configuration_errors_are_fatal() {
    let err = PortfolioConsumerType::new(PortfolioParams {
        boro_cnst_art: 0.1,
        ..small_params()
    })
    .unwrap_err();
    assert!(matches!(err, SolverError::NonZeroBorrowingConstraint(b) if b == 0.1));

    let err = PortfolioConsumerType::new(PortfolioParams {
        discrete_share: true,
        vfunc: false,
        ..small_params()
    })
    .unwrap_err();
    assert!(matches!(err, SolverError::DiscreteShareWithoutValueFunction));

    // The period solver checks too
    let shocks = ShockDistributions::independent(income_shocks(), ReturnDstn::degenerate(1.05));
    let terminal = PortfolioSolution::terminal(5.0, 1.0);
    let bad = PeriodParams {
        boro_cnst_art: -1.0,
        ..period_params(1.0, 0.0)
    };
    assert!(matches!(
        solve_one_period(&terminal, &shocks, &bad, &[0.1, 1.0], &[0.0, 1.0]),
        Err(SolverError::NonZeroBorrowingConstraint(_))
    ));
}
