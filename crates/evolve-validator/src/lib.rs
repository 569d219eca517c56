//! Layered validation of machine-generated code.
//!
//! This crate decides whether generated code may run. Five layers
//! contribute to one verdict:
//!
//! 1. Input sanitization and destructive-command patterns
//! 2. Static scan of the Python syntax tree
//! 3. Remote SAFE/UNSAFE judgment through the provider router
//! 4. Complexity metrics against configured ceilings
//! 5. Execution in the sandbox
//!
//! The first three are critical: their failure alone rejects the code.
//! Every layer failure also deducts a fixed penalty from a security score
//! that starts at 100, and the code must keep at least the configured
//! minimum.
//!
//! [`CodeGenerator`] produces the code this crate validates.
//!
//! # Examples
//!
//! ```no_run
//! use evolve_core::EvolveConfig;
//! use evolve_llm::ProviderRouter;
//! use evolve_sandbox::DockerSandbox;
//! use evolve_validator::{CodeGenerator, Sanitizer, Validator};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EvolveConfig::default();
//! let router = Arc::new(ProviderRouter::from_config(&config.llm)?);
//!
//! let generator = CodeGenerator::new(Arc::clone(&router), Sanitizer::default());
//! let description = "print the current date";
//! let code = generator.generate(description).await?;
//!
//! let validator = Validator::builder(&config)
//!     .router(router)
//!     .sandbox(Arc::new(DockerSandbox::new()))
//!     .build();
//! let result = validator.validate(&code, description).await;
//! assert!(result.security_score <= 100);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

mod complexity;
mod generator;
mod layer;
mod orchestrator;
mod sanitizer;
mod scanner;
mod semantic;
mod syntax;

pub use complexity::{
    ComplexityAnalyzer, ComplexityMetrics, ComplexityReport, INFINITE_LOOP_WARNING,
};
pub use generator::{CodeGenerator, DEFAULT_MAX_CODE_LENGTH, GENERATOR_SYSTEM_PROMPT, extract_code};
pub use layer::{
    ComplexityLayer, LayerContext, LayerOutput, SANDBOX_UNAVAILABLE_WARNING, SandboxLayer,
    SanitizationLayer, SemanticLayer, StaticScanLayer, ValidationLayer,
};
pub use orchestrator::{CANCELLED_ISSUE, ValidateOptions, Validator, ValidatorBuilder};
pub use sanitizer::{
    DEFAULT_MAX_INPUT_LENGTH, FILTERED_PLACEHOLDER, Sanitizer, TRUNCATION_MARKER,
};
pub use scanner::StaticScanner;
pub use semantic::{SECURITY_SYSTEM_PROMPT, SemanticValidator, Verdict};

/// Violations found by a pattern or syntax-tree scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// One entry per match, in source order
    pub violations: Vec<String>,
}

impl ScanReport {
    /// Returns `true` if nothing was found.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}
