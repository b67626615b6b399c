//! TRADF Manager Library
//!
//! Subcommands of the `tradf` binary: loading graph and network files,
//! running the scheduler and writing scheduled graphs.

pub mod commands;
