//! Error types for evolve code validation.
//!
//! This module provides the error hierarchy shared by every crate in the
//! workspace. The variants mirror the failure taxonomy of the validation
//! pipeline: parse failures, security and complexity violations, semantic
//! rejections, provider exhaustion, and sandbox failures.
//!
//! Validation stages never let these errors escape the orchestrator; each
//! stage converts them into a layer result plus an issue string.
//!
//! # Examples
//!
//! ```
//! use evolve_core::{Error, Result};
//!
//! fn require_model(name: &str) -> Result<()> {
//!     if name.is_empty() {
//!         return Err(Error::ConfigError {
//!             message: "Model name cannot be empty".to_string(),
//!         });
//!     }
//!     Ok(())
//! }
//!
//! let err = require_model("").unwrap_err();
//! assert!(err.is_config_error());
//! ```

use thiserror::Error;

/// Main error type for evolve.
///
/// All library errors use this type, providing consistent error handling
/// across the crates in the workspace.
#[derive(Error, Debug)]
pub enum Error {
    /// Source code could not be parsed into a syntax tree.
    #[error("Syntax error: {message}")]
    ParseFailure {
        /// Parser diagnostic, including position when known
        message: String,
    },

    /// Static scan or pattern match found a forbidden construct.
    #[error("Security policy violation: {reason}")]
    SecurityViolation {
        /// Description of the violation
        reason: String,
    },

    /// A structural metric exceeded its configured ceiling.
    #[error("Complexity limit exceeded: {metric} = {value} (max {limit})")]
    ComplexityViolation {
        /// Name of the metric
        metric: String,
        /// Measured value
        value: usize,
        /// Configured ceiling
        limit: usize,
    },

    /// Remote semantic judgment classified the code as unsafe.
    #[error("Semantic validation rejected code: {reason}")]
    SemanticRejection {
        /// Verdict or explanation returned by the provider
        reason: String,
    },

    /// A single provider cannot serve requests.
    #[error("Provider unavailable: {provider}")]
    ProviderUnavailable {
        /// Provider name
        provider: String,
    },

    /// Every provider in the fallback order failed.
    #[error("All providers failed. Last error: {last_error}")]
    AllProvidersExhausted {
        /// Last error reported by any provider
        last_error: String,
    },

    /// The isolated-execution substrate is absent.
    ///
    /// This is not a failure of the code under validation.
    #[error("Sandbox substrate unavailable: {reason}")]
    SandboxUnavailable {
        /// Why the substrate could not be reached
        reason: String,
    },

    /// Sandboxed execution exceeded its wall-clock budget.
    #[error("Sandbox execution timed out after {duration_secs}s")]
    SandboxTimeout {
        /// Configured timeout in seconds
        duration_secs: u64,
    },

    /// Code ran in the sandbox but failed (non-zero exit or runtime error).
    #[error("Sandbox execution failed: {message}")]
    SandboxExecutionFailure {
        /// Failure description
        message: String,
        /// Exit code reported by the substrate, when any
        exit_code: Option<i32>,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration problem
        message: String,
    },

    /// Operation aborted through a cancellation signal.
    #[error("Operation cancelled: {operation}")]
    Cancelled {
        /// Name of the cancelled operation
        operation: String,
    },

    /// Timeout error for operations other than sandbox execution.
    #[error("Operation timed out after {duration_secs}s: {operation}")]
    Timeout {
        /// Name of the operation that timed out
        operation: String,
        /// Duration in seconds before timeout occurred
        duration_secs: u64,
    },

    /// Filesystem or process I/O failed.
    #[error("I/O error while {context}")]
    Io {
        /// What was being attempted
        context: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {message}")]
    SerializationError {
        /// Description of the serialization failure
        message: String,
    },
}

impl Error {
    /// Returns `true` if this is a parse failure.
    #[must_use]
    pub const fn is_parse_failure(&self) -> bool {
        matches!(self, Self::ParseFailure { .. })
    }

    /// Returns `true` if this is a security violation error.
    ///
    /// # Examples
    ///
    /// ```
    /// use evolve_core::Error;
    ///
    /// let err = Error::SecurityViolation {
    ///     reason: "Dangerous function call: eval".to_string(),
    /// };
    /// assert!(err.is_security_error());
    /// ```
    #[must_use]
    pub const fn is_security_error(&self) -> bool {
        matches!(self, Self::SecurityViolation { .. })
    }

    /// Returns `true` if this is a configuration error.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigError { .. })
    }

    /// Returns `true` if the error came from the provider layer.
    #[must_use]
    pub const fn is_provider_error(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable { .. } | Self::AllProvidersExhausted { .. }
        )
    }

    /// Returns `true` if the sandbox substrate was missing.
    ///
    /// Callers treat this as "not applicable" rather than a failed check.
    #[must_use]
    pub const fn is_sandbox_unavailable(&self) -> bool {
        matches!(self, Self::SandboxUnavailable { .. })
    }

    /// Returns `true` if this is any timeout error.
    ///
    /// # Examples
    ///
    /// ```
    /// use evolve_core::Error;
    ///
    /// let err = Error::SandboxTimeout { duration_secs: 30 };
    /// assert!(err.is_timeout());
    /// ```
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::SandboxTimeout { .. })
    }

    /// Returns `true` if the operation was cancelled.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Result type alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_detection() {
        let err = Error::AllProvidersExhausted {
            last_error: "HTTP 500".to_string(),
        };
        assert!(err.is_provider_error());
        assert!(!err.is_security_error());

        let err = Error::ProviderUnavailable {
            provider: "gemini".to_string(),
        };
        assert!(err.is_provider_error());
    }

    #[test]
    fn test_sandbox_unavailable_is_not_timeout() {
        let err = Error::SandboxUnavailable {
            reason: "docker not found".to_string(),
        };
        assert!(err.is_sandbox_unavailable());
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_exhausted_display_names_last_error() {
        let err = Error::AllProvidersExhausted {
            last_error: "authentication failed".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "All providers failed. Last error: authentication failed"
        );
    }

    #[test]
    fn test_complexity_display() {
        let err = Error::ComplexityViolation {
            metric: "lines".to_string(),
            value: 120,
            limit: 100,
        };
        let display = format!("{err}");
        assert!(display.contains("lines = 120"));
        assert!(display.contains("max 100"));
    }

    #[test]
    fn test_io_error_keeps_source() {
        let err = Error::Io {
            context: "writing sandbox source file".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("writing sandbox source file"));
    }

    #[test]
    fn test_cancelled_detection() {
        let err = Error::Cancelled {
            operation: "validation".to_string(),
        };
        assert!(err.is_cancelled());
        assert!(!err.is_config_error());
    }
}
