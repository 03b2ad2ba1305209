//! JSON-based parameter loader
//!
//! Reads and writes [`PortfolioParams`] files. Missing fields fall back to the
//! documented defaults, so a file only needs to list what it overrides.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::SolverResult;
use super::PortfolioParams;

/// Default location of the agent parameter file
pub const DEFAULT_PARAMS_PATH: &str = "config/portfolio.json";

/// Load and validate parameters from a JSON file
pub fn load_params(path: &Path) -> SolverResult<PortfolioParams> {
    let file = File::open(path)?;
    let params: PortfolioParams = serde_json::from_reader(BufReader::new(file))?;
    params.validate()?;
    log::debug!("Loaded portfolio parameters from {}", path.display());
    Ok(params)
}

/// Parse and validate parameters from a JSON string
pub fn params_from_str(json: &str) -> SolverResult<PortfolioParams> {
    let params: PortfolioParams = serde_json::from_str(json)?;
    params.validate()?;
    Ok(params)
}

/// Write parameters as pretty-printed JSON
pub fn save_params(params: &PortfolioParams, path: &Path) -> SolverResult<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), params)?;
    Ok(())
}
