//! `tradf sweep`: SNR gain and solver time over several rhos

use super::{format_rho, round3, Inputs};
use anyhow::Result;
use colored::*;
use serde_json::{Map, Value};

/// Rhos swept when none are given
pub const DEFAULT_RHOS: [f64; 4] = [0.25, 0.5, 0.75, 1.0];

pub fn run_sweep(inputs: &Inputs, rhos: &[f64]) -> Result<()> {
    let scheduler = inputs.scheduler()?;
    let entries = scheduler.sweep(rhos)?;

    let mut delta = Map::new();
    let mut time = Map::new();
    for entry in &entries {
        let key = format_rho(entry.rho);
        let marker = if entry.fallback { " (baseline kept)".dimmed().to_string() } else { String::new() };
        eprintln!(
            "  rho {:>5}  {:>+9.3}%  {:>8.3}s{}",
            key.cyan(),
            entry.delta_snr_percent,
            entry.execution_time.as_secs_f64(),
            marker
        );
        delta.insert(key.clone(), Value::from(entry.delta_snr_percent));
        time.insert(key, Value::from(round3(entry.execution_time.as_secs_f64())));
    }

    let mut summary = Map::new();
    summary.insert("deltaSNR(%)".to_string(), Value::Object(delta));
    summary.insert("execution_time(sec)".to_string(), Value::Object(time));
    println!("{}", serde_json::to_string_pretty(&Value::Object(summary))?);
    Ok(())
}
