//! Isolated execution of untrusted code.
//!
//! Code is written to an ephemeral directory, mounted read-only into a
//! container, and run under the resource envelope described by
//! [`SandboxConfig`](evolve_core::SandboxConfig). Every outcome, including
//! a missing container runtime, is reported as a
//! [`SandboxExecutionResult`](evolve_core::SandboxExecutionResult) rather
//! than an error, so callers can degrade gracefully.
//!
//! # Examples
//!
//! ```no_run
//! use evolve_core::{Language, SandboxConfig};
//! use evolve_sandbox::{DockerSandbox, Sandbox};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! let sandbox = DockerSandbox::new();
//! let config = SandboxConfig::builder()
//!     .memory_limit_mb(64)
//!     .timeout(Duration::from_secs(5))
//!     .build();
//!
//! let result = sandbox
//!     .execute("print(2 + 2)", Language::Python, &config, &CancellationToken::new())
//!     .await;
//! assert_eq!(result.stdout.trim(), "4");
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

mod docker;
mod language;

pub use docker::{DockerSandbox, SANDBOX_LABEL};
pub use language::LanguageProfile;

use async_trait::async_trait;
use evolve_core::{Language, Result, SandboxConfig, SandboxExecutionResult};
use tokio_util::sync::CancellationToken;

/// Execution substrate for untrusted code.
///
/// Implementations never fail `execute`: substrate problems, timeouts, and
/// cancellation are encoded in the returned result's `failure` field.
#[async_trait]
pub trait Sandbox: Send + Sync + std::fmt::Debug {
    /// Whether the substrate can run code at all.
    async fn is_available(&self) -> bool;

    /// Runs `code` once under `config`.
    ///
    /// The source is passed to the runtime byte-for-byte. On timeout or
    /// cancellation the run is killed and its container removed.
    async fn execute(
        &self,
        code: &str,
        language: Language,
        config: &SandboxConfig,
        cancel: &CancellationToken,
    ) -> SandboxExecutionResult;

    /// Removes leftovers from earlier runs, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the substrate refuses the removal.
    async fn cleanup(&self) -> Result<usize>;
}
