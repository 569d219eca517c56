//! Normalized outcome of a sandboxed execution.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a sandboxed execution did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SandboxFailure {
    /// The isolated-execution substrate is absent. Not a code failure.
    Unavailable {
        /// Probe diagnostic
        reason: String,
    },
    /// Wall-clock budget exceeded; the execution context was terminated.
    Timeout {
        /// Configured timeout in seconds
        timeout_secs: u64,
    },
    /// A caller-supplied cancellation signal fired.
    Cancelled,
    /// The code exited with a non-zero status.
    NonZeroExit {
        /// Exit status
        exit_code: i32,
    },
    /// The substrate failed to start or supervise the code.
    Runtime {
        /// Substrate diagnostic
        message: String,
    },
}

impl SandboxFailure {
    /// Returns `true` if the substrate was missing.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Returns `true` if the run was killed for exceeding its timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Converts the failure into the workspace error taxonomy.
    #[must_use]
    pub fn to_error(&self) -> Error {
        match self {
            Self::Unavailable { reason } => Error::SandboxUnavailable {
                reason: reason.clone(),
            },
            Self::Timeout { timeout_secs } => Error::SandboxTimeout {
                duration_secs: *timeout_secs,
            },
            Self::Cancelled => Error::Cancelled {
                operation: "sandbox execution".to_string(),
            },
            Self::NonZeroExit { exit_code } => Error::SandboxExecutionFailure {
                message: format!("process exited with status {exit_code}"),
                exit_code: Some(*exit_code),
            },
            Self::Runtime { message } => Error::SandboxExecutionFailure {
                message: message.clone(),
                exit_code: None,
            },
        }
    }
}

impl fmt::Display for SandboxFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { reason } => write!(f, "Sandbox substrate unavailable: {reason}"),
            Self::Timeout { timeout_secs } => {
                write!(f, "Execution timed out after {timeout_secs} seconds")
            }
            Self::Cancelled => f.write_str("Execution cancelled"),
            Self::NonZeroExit { exit_code } => write!(f, "Process exited with status {exit_code}"),
            Self::Runtime { message } => write!(f, "Sandbox runtime error: {message}"),
        }
    }
}

/// Resource accounting for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// Measured wall-clock time in milliseconds
    pub wall_time_ms: u64,
    /// Bytes captured from stdout
    pub stdout_bytes: usize,
    /// Bytes captured from stderr
    pub stderr_bytes: usize,
    /// Whether either stream was cut at the output ceiling
    pub output_truncated: bool,
    /// Memory ceiling the run was submitted with
    pub memory_limit_bytes: u64,
}

/// Normalized result of one sandbox execution.
///
/// Sandbox implementations never return an error for a failed run; the
/// failure is described here instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxExecutionResult {
    /// `true` only when the code ran and exited with status 0
    pub success: bool,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
    /// Exit status, when the process exited normally
    pub exit_code: Option<i32>,
    /// Measured wall-clock duration in milliseconds
    pub execution_time_ms: u64,
    /// Resource accounting
    pub resource_usage: ResourceUsage,
    /// Failure details when `success` is false
    pub failure: Option<SandboxFailure>,
}

impl SandboxExecutionResult {
    /// Result for a substrate that cannot be reached.
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::failed(
            SandboxFailure::Unavailable {
                reason: reason.into(),
            },
            0,
        )
    }

    /// Result for a run that produced no usable output.
    #[must_use]
    pub fn failed(failure: SandboxFailure, execution_time_ms: u64) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            execution_time_ms,
            resource_usage: ResourceUsage {
                wall_time_ms: execution_time_ms,
                ..ResourceUsage::default()
            },
            failure: Some(failure),
        }
    }

    /// Returns `true` if the substrate was missing.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        self.failure.as_ref().is_some_and(SandboxFailure::is_unavailable)
    }

    /// Returns `true` if the run timed out.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.failure.as_ref().is_some_and(SandboxFailure::is_timeout)
    }

    /// Human-readable error, when the run failed.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.failure.as_ref().map(ToString::to_string)
    }
}
