//! # TRADF Core
//!
//! Latency-budget scheduling for timed reactive dataflow (TRADF) graphs.
//!
//! A TRADF graph is a set of actors placed on hosts and connected by channels
//! whose one-way delay follows a per host-pair distribution. This crate picks
//! a start time for every actor so that the estimated output SNR is as high
//! as possible while period and end-to-end latency bounds hold:
//!
//! - **Graph**: actors, channels, source/sink bindings and the structural
//!   analysis (components, scheduling order, cycles, simple paths)
//! - **Scheduling**: forward/backward start-time propagation and budget
//!   allocation policies
//! - **Quality**: SNR objective and its analytic gradient
//! - **Optimize**: constraint derivation, the solver and the driver that
//!   reconciles baseline and optimized schedules
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use tradf_core::{Scheduler, SchedulerConfig, TradfGraph};
//!
//! # fn main() -> tradf_core::TradfResult<()> {
//! let graph = TradfGraph::load(Path::new("graph.tradf.json"), Path::new("network.json"))?;
//! let scheduler = Scheduler::new(graph, SchedulerConfig::default())?;
//! let report = scheduler.optimize_by_rho(0.5)?;
//! println!("{:.2} dB -> {:.2} dB", report.baseline_snr_db, report.optimized_snr_db);
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod config;
pub mod error;
pub mod graph;
pub mod ndd;
pub mod optimize;
pub mod quality;
pub mod scheduling;
pub mod stats;
pub mod units;

// Re-export commonly used types for easy access
pub use artifact::ScheduledGraph;
pub use config::SchedulerConfig;
pub use error::{ErrorKind, TradfError, TradfResult};
pub use graph::{ActorId, ChannelKey, GraphDescription, TradfGraph};
pub use ndd::{NetworkDelay, NetworkDescription};
pub use optimize::{BaselineReport, OptimizationReport, Outcome, Scheduler, SessionState, SweepEntry};
pub use quality::{Evaluation, QualityEngine, QualityState};
pub use scheduling::{Constraints, LatencyMap};
pub use stats::GraphStats;
