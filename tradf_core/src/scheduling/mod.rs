//! # Schedule generation
//!
//! - [`generator`]: forward/backward start-time propagation, reference
//!   constraints, period, latencies and constraint validation
//! - [`allocation`]: uniform and random latency-budget policies

pub mod allocation;
pub mod generator;

pub use allocation::{BudgetAllocator, RandomAllocator, UniformAllocator};
pub use generator::{
    latencies, period, reference_constraints, schedule_graph, verify_constraints, Constraints,
    LatencyBudget, LatencyMap, Relation, StartTimes,
};
