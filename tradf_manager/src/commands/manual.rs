//! `tradf manual`: evaluate a hand-written schedule

use super::Inputs;
use anyhow::{bail, Context, Result};
use colored::*;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use tradf_core::units::parse_duration_ms;

/// Read `{"actor": "1.5ms" | 1.5, ...}`; bare numbers are milliseconds
pub fn load_start_times(path: &Path) -> Result<HashMap<String, f64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read start times {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse start times {}", path.display()))?;
    let Value::Object(entries) = value else {
        bail!("start times must be a JSON object keyed by actor name");
    };

    let mut start_times = HashMap::with_capacity(entries.len());
    for (actor, ts) in entries {
        let ms = match &ts {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => Some(parse_duration_ms(s)?),
            _ => None,
        };
        let Some(ms) = ms else {
            bail!("start time of '{}' is not a duration: {}", actor, ts);
        };
        start_times.insert(actor, ms);
    }
    Ok(start_times)
}

pub fn run_manual(inputs: &Inputs, period: &str, start_times: &Path, output: Option<&Path>) -> Result<()> {
    let period = parse_duration_ms(period).with_context(|| format!("bad period '{}'", period))?;
    let named = load_start_times(start_times)?;
    let scheduler = inputs.scheduler()?;
    let start_times = scheduler.start_times_from_names(&named)?;
    let report = scheduler.manual(period, &start_times)?;

    if let Some(path) = output {
        report
            .graph
            .write(path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        eprintln!("{} {}", "Wrote".green(), path.display());
    }

    let summary = json!({
        "estSNR0": report.snr_db,
        "graph_stat": report.graph_stats,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_start_times() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ts.json");
        std::fs::write(&path, r#"{"a": "1.5ms", "b": 4, "c": "250us"}"#).unwrap();
        let ts = load_start_times(&path).unwrap();
        assert_eq!(ts["a"], 1.5);
        assert_eq!(ts["b"], 4.0);
        assert_eq!(ts["c"], 0.25);

        std::fs::write(&path, r#"{"a": true}"#).unwrap();
        assert!(load_start_times(&path).is_err());
        std::fs::write(&path, r#"[1, 2]"#).unwrap();
        assert!(load_start_times(&path).is_err());
    }
}
