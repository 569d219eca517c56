//! Command implementations for the evolve CLI.
//!
//! Each command builds what it needs from the loaded configuration, runs,
//! prints its report, and returns an exit code.

pub mod common;
pub mod completions;
pub mod generate;
pub mod providers;
pub mod validate;
