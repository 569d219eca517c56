//! The five validation layers behind one trait.
//!
//! Layers run in [`LayerName::ORDERED`] order. Each maps its findings to a
//! [`LayerResult`] carrying its own penalty; an `Err` means the layer could
//! not complete and is scored by the orchestrator.

use crate::{ComplexityAnalyzer, Sanitizer, SemanticValidator, StaticScanner};
use async_trait::async_trait;
use evolve_core::{
    Error, Language, LayerName, LayerResult, Result, SandboxConfig, SandboxExecutionResult,
    SandboxFailure,
};
use evolve_sandbox::Sandbox;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Warning recorded when the sandbox substrate is missing.
pub const SANDBOX_UNAVAILABLE_WARNING: &str =
    "Docker sandbox not available - skipping execution validation";

/// Inputs shared by every layer for one validation request.
#[derive(Debug, Clone, Copy)]
pub struct LayerContext<'a> {
    /// Code under validation
    pub code: &'a str,
    /// Description the code was generated from; may be empty
    pub user_input: &'a str,
    /// Language of `code`
    pub language: Language,
    /// Resource envelope for the sandbox layer
    pub sandbox: &'a SandboxConfig,
    /// Request cancellation
    pub cancel: &'a CancellationToken,
}

/// A layer's result plus the sandbox run, if it made one.
#[derive(Debug, Clone)]
pub struct LayerOutput {
    /// Layer outcome
    pub result: LayerResult,
    /// Sandbox run made by this layer
    pub execution: Option<SandboxExecutionResult>,
}

impl From<LayerResult> for LayerOutput {
    fn from(result: LayerResult) -> Self {
        Self {
            result,
            execution: None,
        }
    }
}

/// One stage of the validation pipeline.
#[async_trait]
pub trait ValidationLayer: Send + Sync + fmt::Debug {
    /// Stable layer name.
    fn name(&self) -> LayerName;

    /// Runs the layer against one request.
    ///
    /// # Errors
    ///
    /// Returns an error when the layer could not reach a result. A
    /// cancelled request reports [`Error::Cancelled`].
    async fn run(&self, ctx: &LayerContext<'_>) -> Result<LayerOutput>;
}

/// Layer 1: user-input sanitization and destructive-pattern check.
#[derive(Debug, Clone)]
pub struct SanitizationLayer {
    sanitizer: Sanitizer,
    penalty: u32,
}

impl SanitizationLayer {
    /// Creates the layer.
    #[must_use]
    pub const fn new(sanitizer: Sanitizer, penalty: u32) -> Self {
        Self { sanitizer, penalty }
    }
}

#[async_trait]
impl ValidationLayer for SanitizationLayer {
    fn name(&self) -> LayerName {
        LayerName::InputSanitization
    }

    async fn run(&self, ctx: &LayerContext<'_>) -> Result<LayerOutput> {
        let mut warnings = Vec::new();
        if !ctx.user_input.is_empty() && self.sanitizer.sanitize_input(ctx.user_input) != ctx.user_input {
            warnings.push("User input was sanitized".to_string());
        }

        let report = self.sanitizer.validate_response(ctx.code);
        let result = if report.is_clean() {
            LayerResult::pass()
        } else {
            LayerResult::fail(report.violations, self.penalty)
        };
        Ok(result.with_warnings(warnings).into())
    }
}

/// Layer 2: syntax-tree scan.
#[derive(Debug, Clone)]
pub struct StaticScanLayer {
    scanner: StaticScanner,
    penalty: u32,
}

impl StaticScanLayer {
    /// Creates the layer.
    #[must_use]
    pub const fn new(scanner: StaticScanner, penalty: u32) -> Self {
        Self { scanner, penalty }
    }
}

#[async_trait]
impl ValidationLayer for StaticScanLayer {
    fn name(&self) -> LayerName {
        LayerName::StaticScan
    }

    async fn run(&self, ctx: &LayerContext<'_>) -> Result<LayerOutput> {
        if ctx.language != Language::Python {
            return Ok(LayerResult::not_applicable(format!(
                "Static scan supports python only, not {}",
                ctx.language
            ))
            .into());
        }

        let report = self.scanner.scan(ctx.code);
        debug!(violations = report.violations.len(), "Static scan finished");
        Ok(if report.is_clean() {
            LayerResult::pass()
        } else {
            LayerResult::fail(report.violations, self.penalty)
        }
        .into())
    }
}

/// Layer 3: remote semantic judgment.
#[derive(Debug, Clone)]
pub struct SemanticLayer {
    validator: Option<SemanticValidator>,
    penalty: u32,
}

impl SemanticLayer {
    /// Creates the layer; `None` disables remote judgment.
    #[must_use]
    pub const fn new(validator: Option<SemanticValidator>, penalty: u32) -> Self {
        Self { validator, penalty }
    }
}

#[async_trait]
impl ValidationLayer for SemanticLayer {
    fn name(&self) -> LayerName {
        LayerName::LlmValidation
    }

    async fn run(&self, ctx: &LayerContext<'_>) -> Result<LayerOutput> {
        let Some(validator) = &self.validator else {
            return Ok(LayerResult::not_applicable("LLM validation disabled").into());
        };

        let verdict = validator.judge(ctx.code, ctx.cancel).await?;
        Ok(match verdict.into_result() {
            Ok(()) => LayerResult::pass(),
            Err(Error::SemanticRejection { reason }) => LayerResult::fail(vec![reason], self.penalty),
            Err(err) => return Err(err),
        }
        .into())
    }
}

/// Layer 4: structural metrics.
#[derive(Debug, Clone)]
pub struct ComplexityLayer {
    analyzer: ComplexityAnalyzer,
    issue_penalty: u32,
}

impl ComplexityLayer {
    /// Creates the layer; `issue_penalty` applies per exceeded ceiling.
    #[must_use]
    pub const fn new(analyzer: ComplexityAnalyzer, issue_penalty: u32) -> Self {
        Self {
            analyzer,
            issue_penalty,
        }
    }
}

#[async_trait]
impl ValidationLayer for ComplexityLayer {
    fn name(&self) -> LayerName {
        LayerName::ComplexityAnalysis
    }

    async fn run(&self, ctx: &LayerContext<'_>) -> Result<LayerOutput> {
        if ctx.language != Language::Python {
            return Ok(LayerResult::not_applicable(format!(
                "Complexity analysis supports python only, not {}",
                ctx.language
            ))
            .into());
        }

        let report = self.analyzer.analyze(ctx.code);
        debug!(metrics = ?report.metrics, "Complexity analysis finished");

        let result = if report.passed() {
            LayerResult::pass()
        } else {
            let count = u32::try_from(report.issues.len()).unwrap_or(u32::MAX);
            LayerResult::fail(report.issues, self.issue_penalty.saturating_mul(count))
        };
        Ok(result.with_warnings(report.warnings).into())
    }
}

/// Layer 5: execution in the sandbox.
#[derive(Debug, Clone)]
pub struct SandboxLayer {
    sandbox: Option<Arc<dyn Sandbox>>,
    penalty: u32,
    long_execution: Duration,
}

impl SandboxLayer {
    /// Creates the layer; `None` disables execution.
    #[must_use]
    pub fn new(sandbox: Option<Arc<dyn Sandbox>>, penalty: u32, long_execution: Duration) -> Self {
        Self {
            sandbox,
            penalty,
            long_execution,
        }
    }
}

#[async_trait]
impl ValidationLayer for SandboxLayer {
    fn name(&self) -> LayerName {
        LayerName::SandboxExecution
    }

    async fn run(&self, ctx: &LayerContext<'_>) -> Result<LayerOutput> {
        let Some(sandbox) = &self.sandbox else {
            return Ok(LayerResult::not_applicable("Sandbox execution disabled").into());
        };
        if !sandbox.is_available().await {
            return Ok(LayerResult::not_applicable(SANDBOX_UNAVAILABLE_WARNING).into());
        }

        let execution = sandbox
            .execute(ctx.code, ctx.language, ctx.sandbox, ctx.cancel)
            .await;

        let result = match &execution.failure {
            None => {
                let elapsed = Duration::from_millis(execution.execution_time_ms);
                let mut result = LayerResult::pass();
                if elapsed > self.long_execution {
                    result.warnings.push(format!(
                        "Long execution time: {:.2}s",
                        elapsed.as_secs_f64()
                    ));
                }
                result
            }
            Some(SandboxFailure::Unavailable { .. }) => {
                LayerResult::not_applicable(SANDBOX_UNAVAILABLE_WARNING)
            }
            Some(failure @ SandboxFailure::Cancelled) => return Err(failure.to_error()),
            Some(failure) => {
                warn!(error = %failure.to_error(), "Sandbox run failed");
                LayerResult::fail(
                    vec![format!("Sandbox execution failed: {failure}")],
                    self.penalty,
                )
            }
        };

        Ok(LayerOutput {
            result,
            execution: Some(execution),
        })
    }
}
