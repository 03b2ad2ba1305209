//! Portfolio Choice CLI
//!
//! Solves a portfolio-choice agent type and writes its policy functions to CSV

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use portfolio_choice::{
    load_params, params::save_params, PortfolioConsumerType, PortfolioParams, Regime,
    DEFAULT_PARAMS_PATH,
};

#[derive(Debug, Parser)]
#[command(name = "portfolio_choice", version, about = "Solve a consumption / risky share problem")]
struct Args {
    /// Parameter file (JSON); defaults are used when it does not exist
    #[arg(short, long, default_value = DEFAULT_PARAMS_PATH)]
    config: PathBuf,

    /// Override the probability of being able to adjust the share
    #[arg(long)]
    adjust_prb: Option<f64>,

    /// Number of cycles to solve (0 = infinite horizon)
    #[arg(long)]
    cycles: Option<u32>,

    /// Choose the share from the share grid only (turns on value functions)
    #[arg(long)]
    discrete: bool,

    /// Build value functions
    #[arg(long)]
    vfunc: bool,

    /// Integrate over the joint shock distribution in one pass
    #[arg(long)]
    joint: bool,

    /// Where to write the policy table
    #[arg(short, long, default_value = "policy_output.csv")]
    output: PathBuf,

    /// Write the effective parameters to this file
    #[arg(long)]
    save_params: Option<PathBuf>,
}

/// One row of the policy table
#[derive(Debug, Serialize)]
struct PolicyRow {
    period: usize,
    m_nrm: f64,
    c_adjust: f64,
    share_adjust: f64,
    c_fixed_share_0: f64,
    c_fixed_share_1: f64,
    v_adjust: Option<f64>,
}

fn load_or_default(path: &PathBuf) -> Result<PortfolioParams> {
    if path.exists() {
        load_params(path).with_context(|| format!("loading parameters from {}", path.display()))
    } else {
        log::info!("{} not found, using default parameters", path.display());
        Ok(PortfolioParams::default())
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    println!("Portfolio Choice v{}", env!("CARGO_PKG_VERSION"));
    println!("=======================\n");

    let mut params = load_or_default(&args.config)?;
    if let Some(p) = args.adjust_prb {
        params.adjust_prb = p;
    }
    if let Some(c) = args.cycles {
        params.cycles = c;
    }
    if args.discrete {
        params.discrete_share = true;
        params.vfunc = true;
    }
    if args.vfunc {
        params.vfunc = true;
    }
    if args.joint {
        params.indep_dstn = false;
    }
    if let Some(path) = &args.save_params {
        save_params(&params, path).with_context(|| format!("writing {}", path.display()))?;
    }

    let agent = PortfolioConsumerType::new(params).context("invalid parameters")?;
    let p = agent.params();
    println!("Agent:");
    println!("  CRRA: {:.2}", p.crra);
    println!("  Rfree: {:.4}", p.rfree);
    println!("  Risky mean / std: {:.4} / {:.4}", p.risky_avg, p.risky_std);
    println!("  DiscFac: {:.4}", p.disc_fac);
    println!("  AdjustPrb: {:.2}", p.adjust_prb);
    println!("  Share choice: {}", if p.discrete_share { "discrete" } else { "continuous" });
    println!("  Limiting share: {:.4}", agent.share_limit());
    println!();

    let solution = agent.solve().context("solving the agent's problem")?;
    if solution.infinite_horizon {
        println!(
            "Infinite horizon solution converged after {} iterations (distance {:.2e})",
            solution.iterations, solution.distance
        );
    } else {
        println!("Solved {} periods", solution.len());
    }

    let first = solution.period(0).context("solution has no periods")?;
    println!("\nPeriod 0 policy:");
    println!("{:>8} {:>12} {:>12} {:>12} {:>12}", "m", "c (adj)", "share", "c (s=0)", "c (s=1)");
    println!("{}", "-".repeat(60));
    for &m in &[0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0] {
        let adj = first.controls(m, Regime::Adjust);
        let fixed_0 = first.controls(m, Regime::Fixed { held_share: 0.0 });
        let fixed_1 = first.controls(m, Regime::Fixed { held_share: 1.0 });
        println!(
            "{:>8.2} {:>12.6} {:>12.6} {:>12.6} {:>12.6}",
            m, adj.consumption, adj.share, fixed_0.consumption, fixed_1.consumption
        );
    }

    // Write every period on the asset grid
    let mut writer = csv::Writer::from_path(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    for (t, period) in solution.periods.iter().enumerate() {
        for &m in agent.asset_grid() {
            let adj = period.controls(m, Regime::Adjust);
            writer.serialize(PolicyRow {
                period: t,
                m_nrm: m,
                c_adjust: adj.consumption,
                share_adjust: adj.share,
                c_fixed_share_0: period.controls(m, Regime::Fixed { held_share: 0.0 }).consumption,
                c_fixed_share_1: period.controls(m, Regime::Fixed { held_share: 1.0 }).consumption,
                v_adjust: period.value(m, Regime::Adjust).ok(),
            })?;
        }
    }
    writer.flush()?;
    println!("\nFull policy table written to: {}", args.output.display());

    Ok(())
}
