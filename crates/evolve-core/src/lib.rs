//! Core types, configuration, and errors for evolve.
//!
//! This crate provides the foundational types shared by the provider
//! router, the sandbox executor, and the layered validator.
//!
//! # Architecture
//!
//! The core consists of:
//! - Error hierarchy mirroring the validation failure taxonomy
//! - Strong domain types (`Language`, `MemoryLimit`, `LayerName`)
//! - Serde configuration sections with shipped defaults
//! - Result models for layers, validation passes, and sandbox runs
//! - Statistics snapshots for providers

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

mod config;
mod error;
mod execution;
mod types;
mod validation;

pub mod stats;

pub use config::{
    ComplexityConfig, EvolveConfig, LlmConfig, ProviderConfig, ProviderKind, ProviderOverride,
    SandboxConfig, SandboxConfigBuilder, ScannerConfig, ScoringPolicy, ValidationConfig,
};
pub use error::{Error, Result};
pub use execution::{ResourceUsage, SandboxExecutionResult, SandboxFailure};
pub use types::{Language, LayerName, MemoryLimit};
pub use validation::{LayerResult, LayerState, SecurityScore, ValidationResult};
