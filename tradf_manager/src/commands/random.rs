//! `tradf random`: randomly allocated baseline schedule

use super::{round3, Inputs};
use anyhow::{Context, Result};
use colored::*;
use rand::Rng;
use serde_json::json;
use std::path::Path;

/// Uniform in `[0.1, 0.9]`, rounded to 2 decimals
pub fn pick_rho<R: Rng>(rng: &mut R) -> f64 {
    (rng.gen_range(0.1..=0.9_f64) * 100.0).round() / 100.0
}

pub fn run_random(inputs: &Inputs, rho: Option<f64>, output: &Path) -> Result<()> {
    let rho = rho.unwrap_or_else(|| pick_rho(&mut rand::thread_rng()));
    let scheduler = inputs.scheduler()?;
    let report = scheduler
        .random(rho)
        .with_context(|| format!("random schedule at rho {} failed", rho))?;

    report
        .graph
        .write(output)
        .with_context(|| format!("failed to write {}", output.display()))?;
    eprintln!("{} {} (rho {})", "Wrote".green(), output.display(), rho);

    let summary = json!({
        "rho": rho,
        "estSNR0": report.snr_db,
        "period": round3(report.period),
        "graph_stat": report.graph_stats,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
