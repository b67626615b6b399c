//! # Optimization driver
//!
//! - [`scheduler`]: constraint derivation, baseline construction, solver
//!   invocation and fallback to the baseline
//! - [`constraints`]: linear constraint matrix and box bounds
//! - [`solver`]: the solver interface and the built-in projected-gradient solver
//! - [`session`]: the per-run state machine

pub mod constraints;
pub mod scheduler;
pub mod session;
pub mod solver;

pub use constraints::{Bounds, LinearConstraints};
pub use scheduler::{
    percent_change, BaselineReport, FallbackReason, OptimizationReport, Outcome, Scheduler,
    SweepEntry,
};
pub use session::{Session, SessionMode, SessionState};
pub use solver::{NonlinearSolver, Objective, ProjectedGradientSolver, SolverOutcome};
