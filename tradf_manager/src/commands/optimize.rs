//! `tradf optimize`: baseline and optimized schedules for one rho

use super::{round3, scheduled_path, Inputs};
use anyhow::{Context, Result};
use colored::*;
use serde_json::json;
use std::path::Path;
use tradf_core::optimize::Outcome;

/// Which artifacts to write
#[derive(Debug, Clone, Copy)]
pub struct Dump {
    pub baseline: bool,
    pub optimized: bool,
}

pub fn run_optimize(inputs: &Inputs, rho: f64, out_dir: &Path, dump: Dump) -> Result<()> {
    let scheduler = inputs.scheduler()?;
    let report = scheduler
        .optimize_by_rho(rho)
        .with_context(|| format!("scheduling {} at rho {} failed", inputs.graph.display(), rho))?;

    let name = inputs.graph_name();
    if dump.baseline {
        let path = scheduled_path(out_dir, "baseline", &name, rho);
        report
            .baseline_graph
            .write(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        eprintln!("{} {}", "Wrote".green(), path.display());
    }
    if dump.optimized {
        let path = scheduled_path(out_dir, "optimized", &name, rho);
        report
            .optimized_graph
            .write(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        eprintln!("{} {}", "Wrote".green(), path.display());
    }

    if let Outcome::Fallback(reason) = &report.outcome {
        eprintln!("{} {}, kept the baseline", "Note:".yellow().bold(), reason);
    }

    let summary = json!({
        "estSNR0": report.baseline_snr_db,
        "estSNR1": report.optimized_snr_db,
        "deltaSNR(%)": report.delta_snr_percent(),
        "execution_time(sec)": round3(report.execution_time.as_secs_f64()),
        "iterations": report.iterations,
        "evaluations": report.evaluations,
        "graph_stat": report.graph_stats,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
