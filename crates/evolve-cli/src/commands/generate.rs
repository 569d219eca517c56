//! Generate command implementation.
//!
//! Asks the provider router for code, validates it when asked or when it
//! is headed for a file, and writes it out. Rejected code is printed but
//! never written.

use anyhow::{Context, Result};
use evolve_core::{EvolveConfig, ValidationResult};
use evolve_validator::{CodeGenerator, Sanitizer, ValidateOptions};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::common::{build_router, build_validator};
use crate::formatters::{generation_text, render};
use crate::{ExitCode, OutputFormat};

/// Result of `evolve generate`.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    /// Generated code
    pub code: String,
    /// Validation verdict, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationResult>,
    /// File the code was written to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub written_to: Option<PathBuf>,
}

impl GenerationReport {
    /// Whether the code may be kept: unvalidated, or validated and accepted.
    #[must_use]
    pub fn accepted(&self) -> bool {
        self.validation.as_ref().is_none_or(|v| v.is_valid)
    }
}

/// Runs the generate command.
pub async fn run(
    description: &str,
    validate: bool,
    output: Option<PathBuf>,
    config: &EvolveConfig,
    output_format: OutputFormat,
    cancel: &CancellationToken,
) -> Result<ExitCode> {
    if description.trim().is_empty() {
        anyhow::bail!("description must not be empty");
    }

    let router = build_router(config)?;
    let generator = CodeGenerator::new(
        Arc::clone(&router),
        Sanitizer::new(config.validation.max_input_length),
    )
    .with_max_retries(config.llm.max_retries);

    let code = generator
        .generate_cancellable(description, cancel)
        .await
        .context("code generation failed")?;

    let validation = if must_validate(validate, output.as_deref()) {
        let validator = build_validator(config, router);
        let result = validator
            .validate_with(&code, description, &ValidateOptions::with_cancel(cancel.clone()))
            .await;
        Some(result)
    } else {
        None
    };

    let mut report = GenerationReport {
        code,
        validation,
        written_to: None,
    };

    if let Some(path) = output {
        if report.accepted() {
            write_code(&path, &report.code).await?;
            report.written_to = Some(path);
        } else {
            warn!(path = %path.display(), "Generated code rejected, not writing it");
        }
    }

    let text = |report: &GenerationReport| {
        let written = report
            .written_to
            .as_ref()
            .map(|p| p.display().to_string());
        generation_text(&report.code, report.validation.as_ref(), written.as_deref())
    };
    println!("{}", render(&report, output_format, text)?);

    Ok(if report.accepted() {
        ExitCode::SUCCESS
    } else {
        ExitCode::REJECTED
    })
}

/// Code written to disk always goes through the validator.
const fn must_validate(requested: bool, output: Option<&Path>) -> bool {
    requested || output.is_some()
}

async fn write_code(path: &Path, code: &str) -> Result<()> {
    let mut contents = code.to_string();
    if !contents.ends_with('\n') {
        contents.push('\n');
    }
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), "Generated code written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unvalidated_report_accepted() {
        let report = GenerationReport {
            code: "print(1)".to_string(),
            validation: None,
            written_to: None,
        };
        assert!(report.accepted());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json, serde_json::json!({"code": "print(1)"}));
    }

    #[test]
    fn test_output_forces_validation() {
        assert!(!must_validate(false, None));
        assert!(must_validate(true, None));
        assert!(must_validate(false, Some(Path::new("out.py"))));
    }

    #[tokio::test]
    async fn test_write_code_adds_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.py");

        write_code(&path, "print(1)").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "print(1)\n");
    }

    #[tokio::test]
    async fn test_empty_description_rejected() {
        let err = run(
            "   ",
            false,
            None,
            &EvolveConfig::default(),
            OutputFormat::Text,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("description must not be empty"));
    }
}
