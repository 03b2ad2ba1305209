//! Solve the same agent across several adjustment probabilities
//!
//! Shows how stickiness of the portfolio changes consumption and the chosen share.
//! Types are solved in parallel. Supports JSON output via --json flag.
//! Accepts config via environment variables:
//!   PORTFOLIO_CONFIG   parameter file (defaults to config/portfolio.json, then built-in defaults)
//!   ADJUST_PRBS        comma separated probabilities, e.g. "1.0,0.5,0.1"
//!   EVAL_M             market resources at which to report controls

use std::env;
use std::path::PathBuf;
use std::time::Instant;

use portfolio_choice::{
    load_params, solve_batch, PortfolioParams, Regime, DEFAULT_PARAMS_PATH,
};
use serde::Serialize;

#[derive(Serialize)]
struct SweepRow {
    adjust_prb: f64,
    consumption: Option<f64>,
    share: Option<f64>,
    consumption_fixed_at_zero: Option<f64>,
    error: Option<String>,
}

#[derive(Serialize)]
struct SweepResponse {
    eval_m: f64,
    rows: Vec<SweepRow>,
    execution_time_ms: u64,
}

fn main() {
    env_logger::init();

    let json_output = env::args().any(|arg| arg == "--json");
    let start = Instant::now();

    let config = PathBuf::from(env::var("PORTFOLIO_CONFIG").unwrap_or_else(|_| DEFAULT_PARAMS_PATH.to_string()));
    let base = if config.exists() {
        match load_params(&config) {
            Ok(p) => p,
            Err(e) => {
                eprintln!("Failed to load {}: {}", config.display(), e);
                std::process::exit(1);
            }
        }
    } else {
        PortfolioParams::default()
    };

    let adjust_prbs: Vec<f64> = env::var("ADJUST_PRBS")
        .ok()
        .map(|s| s.split(',').filter_map(|p| p.trim().parse().ok()).collect())
        .unwrap_or_else(|| vec![1.0, 0.75, 0.5, 0.25, 0.1]);

    let eval_m: f64 = env::var("EVAL_M")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(10.0);

    let types: Vec<PortfolioParams> = adjust_prbs
        .iter()
        .map(|&adjust_prb| PortfolioParams { adjust_prb, ..base.clone() })
        .collect();

    let rows: Vec<SweepRow> = solve_batch(&types)
        .into_iter()
        .zip(&adjust_prbs)
        .map(|(result, &adjust_prb)| match result {
            Ok(solution) => {
                let first = solution.period(0);
                let adj = first.map(|p| p.controls(eval_m, Regime::Adjust));
                SweepRow {
                    adjust_prb,
                    consumption: adj.map(|c| c.consumption),
                    share: adj.map(|c| c.share),
                    consumption_fixed_at_zero: first
                        .map(|p| p.controls(eval_m, Regime::Fixed { held_share: 0.0 }).consumption),
                    error: None,
                }
            }
            Err(e) => SweepRow {
                adjust_prb,
                consumption: None,
                share: None,
                consumption_fixed_at_zero: None,
                error: Some(e.to_string()),
            },
        })
        .collect();

    if json_output {
        let response = SweepResponse {
            eval_m,
            rows,
            execution_time_ms: start.elapsed().as_millis() as u64,
        };
        match serde_json::to_string_pretty(&response) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to serialize response: {}", e),
        }
        return;
    }

    println!("Adjustment probability sweep at m = {:.2}", eval_m);
    println!("{:>10} {:>12} {:>10} {:>14}", "AdjustPrb", "c (adj)", "share", "c (fixed s=0)");
    println!("{}", "-".repeat(50));
    for row in &rows {
        match (&row.error, row.consumption, row.share, row.consumption_fixed_at_zero) {
            (None, Some(c), Some(s), Some(c0)) => {
                println!("{:>10.2} {:>12.6} {:>10.4} {:>14.6}", row.adjust_prb, c, s, c0)
            }
            (Some(e), ..) => println!("{:>10.2}  failed: {}", row.adjust_prb, e),
            _ => println!("{:>10.2}  no periods solved", row.adjust_prb),
        }
    }
    println!("\nCompleted in {:?}", start.elapsed());
}
