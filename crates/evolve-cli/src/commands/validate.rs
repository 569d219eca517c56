//! Validate command implementation.
//!
//! Runs a source file through the five validation layers and prints the
//! report.

use anyhow::{Context, Result};
use evolve_core::{EvolveConfig, Language, MemoryLimit};
use evolve_validator::ValidateOptions;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::common::{build_router, build_validator, infer_language, read_source};
use crate::formatters::{render, validation_text};
use crate::{ExitCode, OutputFormat};

/// Arguments of `evolve validate`.
#[derive(Debug, Clone, Default)]
pub struct ValidateArgs {
    /// Source file or `-`
    pub file: PathBuf,
    /// Request the code answers
    pub input: String,
    /// Explicit language
    pub language: Option<Language>,
    /// Skip the sandbox layer
    pub no_sandbox: bool,
    /// Sandbox timeout override in seconds
    pub timeout: Option<u64>,
    /// Sandbox memory override in megabytes
    pub memory_mb: Option<u64>,
    /// Allow sandbox networking
    pub allow_network: bool,
}

impl ValidateArgs {
    /// Applies the command-line overrides to a copy of `config`.
    ///
    /// The language comes from `--language`, then the file extension, then
    /// the configuration.
    pub fn effective_config(&self, config: &EvolveConfig) -> Result<EvolveConfig> {
        let mut config = config.clone();
        if let Some(language) = self.language.or_else(|| infer_language(&self.file)) {
            config.validation.language = language;
        }
        if self.no_sandbox {
            config.validation.sandbox_execution = false;
        }
        if let Some(timeout) = self.timeout {
            config.sandbox.timeout_secs = timeout;
        }
        if let Some(mb) = self.memory_mb {
            config.sandbox.memory_limit = MemoryLimit::from_mb(mb);
        }
        if self.allow_network {
            config.sandbox.network_disabled = false;
        }
        config
            .sandbox
            .validate()
            .context("invalid sandbox override")?;
        Ok(config)
    }
}

/// Runs the validate command.
///
/// Returns [`ExitCode::REJECTED`] when the code fails validation.
pub async fn run(
    args: &ValidateArgs,
    config: &EvolveConfig,
    output_format: OutputFormat,
    cancel: &CancellationToken,
) -> Result<ExitCode> {
    let config = args.effective_config(config)?;
    let code = read_source(&args.file).await?;
    if code.trim().is_empty() {
        anyhow::bail!("no code to validate in {}", args.file.display());
    }

    info!(file = %args.file.display(), language = %config.validation.language, "Validating");
    let validator = build_validator(&config, build_router(&config)?);
    let result = validator
        .validate_with(&code, &args.input, &ValidateOptions::with_cancel(cancel.clone()))
        .await;

    if cancel.is_cancelled() {
        match validator.cleanup().await {
            Ok(removed) => info!(removed, "Removed leftover sandbox containers"),
            Err(err) => warn!(error = %err, "Sandbox cleanup failed"),
        }
    }

    println!("{}", render(&result, output_format, validation_text)?);

    Ok(if result.is_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::REJECTED
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_extension() {
        let args = ValidateArgs {
            file: PathBuf::from("tool.js"),
            ..ValidateArgs::default()
        };
        let config = args.effective_config(&EvolveConfig::default()).unwrap();
        assert_eq!(config.validation.language, Language::Javascript);
    }

    #[test]
    fn test_explicit_language_wins() {
        let args = ValidateArgs {
            file: PathBuf::from("tool.js"),
            language: Some(Language::Bash),
            ..ValidateArgs::default()
        };
        let config = args.effective_config(&EvolveConfig::default()).unwrap();
        assert_eq!(config.validation.language, Language::Bash);
    }

    #[test]
    fn test_sandbox_overrides() {
        let args = ValidateArgs {
            file: PathBuf::from("-"),
            no_sandbox: true,
            timeout: Some(5),
            memory_mb: Some(64),
            allow_network: true,
            ..ValidateArgs::default()
        };
        let config = args.effective_config(&EvolveConfig::default()).unwrap();

        assert_eq!(config.validation.language, Language::Python);
        assert!(!config.validation.sandbox_execution);
        assert_eq!(config.sandbox.timeout_secs, 5);
        assert_eq!(config.sandbox.memory_limit, MemoryLimit::from_mb(64));
        assert!(!config.sandbox.network_disabled);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let args = ValidateArgs {
            file: PathBuf::from("a.py"),
            timeout: Some(0),
            ..ValidateArgs::default()
        };
        assert!(args.effective_config(&EvolveConfig::default()).is_err());
    }

    #[tokio::test]
    async fn test_empty_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.py");
        std::fs::write(&path, "  \n").unwrap();

        let args = ValidateArgs {
            file: path,
            ..ValidateArgs::default()
        };
        let err = run(
            &args,
            &EvolveConfig::default(),
            OutputFormat::Json,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("no code to validate"));
    }
}
