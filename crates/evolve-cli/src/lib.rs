//! evolve CLI library.
//!
//! Holds everything the `evolve` binary does besides parsing `main`'s
//! arguments, so commands and formatters can be tested.

#![allow(clippy::missing_errors_doc)]

use clap::ValueEnum;
use std::fmt;

pub mod cli;
pub mod commands;
pub mod formatters;
pub mod logging;
pub mod runner;
pub mod settings;

/// How command results are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Colored, human-readable report.
    #[default]
    Text,
    /// Pretty-printed JSON for scripts.
    Json,
}

/// Process exit status of a command.
///
/// # Examples
///
/// ```
/// use evolve_cli::ExitCode;
///
/// assert!(ExitCode::SUCCESS.is_success());
/// assert_eq!(ExitCode::REJECTED.as_i32(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Command finished and the code was accepted.
    pub const SUCCESS: Self = Self(0);

    /// Command could not finish.
    pub const ERROR: Self = Self(1);

    /// Input file or arguments were unusable.
    pub const INVALID_INPUT: Self = Self(2);

    /// Command finished but the code was rejected.
    pub const REJECTED: Self = Self(3);

    /// Returns the status as an integer.
    #[must_use]
    pub const fn as_i32(&self) -> i32 {
        self.0
    }

    /// Checks if the status represents success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
