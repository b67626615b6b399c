//! `tradf` subcommands

pub mod manual;
pub mod optimize;
pub mod random;
pub mod sweep;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tradf_core::{Scheduler, SchedulerConfig, TradfGraph};

/// Default directory for scheduled graphs
pub const DEFAULT_OUT_DIR: &str = "graphs/scheduled";

/// Files every subcommand needs
#[derive(Debug, Clone)]
pub struct Inputs {
    pub graph: PathBuf,
    pub network: PathBuf,
    pub config: Option<PathBuf>,
}

impl Inputs {
    /// Load the graph, the network and the optional config
    pub fn scheduler(&self) -> Result<Scheduler> {
        let config = SchedulerConfig::load_or_default(self.config.as_ref())
            .with_context(|| match &self.config {
                Some(path) => format!("failed to load config {}", path.display()),
                None => "invalid default config".to_string(),
            })?;
        let graph = TradfGraph::load(&self.graph, &self.network).with_context(|| {
            format!(
                "failed to load graph {} with network {}",
                self.graph.display(),
                self.network.display()
            )
        })?;
        Ok(Scheduler::new(graph, config)?)
    }

    /// Graph file name without directories and the `.tradf.json` suffix
    pub fn graph_name(&self) -> String {
        graph_name(&self.graph)
    }
}

pub fn graph_name(path: &Path) -> String {
    let file = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    match file.split_once(".tradf.json") {
        Some((stem, _)) => stem.to_string(),
        None => file,
    }
}

/// `0.5` -> `"0.5"`, `1.0` -> `"1.0"`
pub fn format_rho(rho: f64) -> String {
    if rho.fract() == 0.0 {
        format!("{:.1}", rho)
    } else {
        format!("{}", rho)
    }
}

/// `<out>/<kind>/<name>_rho_<rho>.tradf.json`
pub fn scheduled_path(out_dir: &Path, kind: &str, name: &str, rho: f64) -> PathBuf {
    out_dir
        .join(kind)
        .join(format!("{}_rho_{}.tradf.json", name, format_rho(rho)))
}

/// Round to 3 decimals for reporting
pub fn round3(value: f64) -> f64 {
    tradf_core::units::round3(value)
}
