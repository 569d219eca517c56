//! The validation orchestrator.
//!
//! Runs the five layers in order against one piece of code, accumulates
//! the security score, and renders the verdict. Each layer is isolated: an
//! error inside one is recorded as a failure with its error penalty and the
//! remaining layers still run.

use crate::layer::{
    ComplexityLayer, LayerContext, LayerOutput, SandboxLayer, SanitizationLayer, SemanticLayer,
    StaticScanLayer, ValidationLayer,
};
use crate::{ComplexityAnalyzer, Sanitizer, SemanticValidator, StaticScanner};
use evolve_core::{
    EvolveConfig, Language, LayerName, LayerResult, LayerState, Result, SandboxConfig,
    SandboxExecutionResult, ScoringPolicy, SecurityScore, ValidationResult,
};
use evolve_llm::ProviderRouter;
use evolve_sandbox::Sandbox;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

/// Issue recorded when the caller cancels a validation.
pub const CANCELLED_ISSUE: &str = "Validation cancelled";

/// Per-call options for [`Validator::validate_with`].
#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    /// Resource envelope overriding the configured one for this call
    pub sandbox: Option<SandboxConfig>,
    /// Cancels in-flight provider calls and sandbox runs
    pub cancel: CancellationToken,
}

impl ValidateOptions {
    /// Options with a cancellation token.
    #[must_use]
    pub fn with_cancel(cancel: CancellationToken) -> Self {
        Self {
            sandbox: None,
            cancel,
        }
    }
}

/// Five-layer validator.
///
/// # Examples
///
/// ```no_run
/// use evolve_core::EvolveConfig;
/// use evolve_llm::ProviderRouter;
/// use evolve_sandbox::DockerSandbox;
/// use evolve_validator::Validator;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = EvolveConfig::default();
/// let validator = Validator::builder(&config)
///     .router(Arc::new(ProviderRouter::from_config(&config.llm)?))
///     .sandbox(Arc::new(DockerSandbox::new()))
///     .build();
///
/// let result = validator.validate("print('hi')", "say hi").await;
/// println!("valid={} score={}", result.is_valid, result.security_score);
/// for issue in &result.issues {
///     println!("issue: {issue}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Validator {
    layers: Vec<Arc<dyn ValidationLayer>>,
    scoring: ScoringPolicy,
    min_security_score: u32,
    language: Language,
    sandbox_config: SandboxConfig,
    sandbox: Option<Arc<dyn Sandbox>>,
}

impl Validator {
    /// Starts building a validator from configuration.
    #[must_use]
    pub fn builder(config: &EvolveConfig) -> ValidatorBuilder {
        ValidatorBuilder::new(config)
    }

    /// Layers in execution order.
    #[must_use]
    pub fn layers(&self) -> &[Arc<dyn ValidationLayer>] {
        &self.layers
    }

    /// Validates `code` with the configured envelope and no cancellation.
    pub async fn validate(&self, code: &str, user_input: &str) -> ValidationResult {
        self.validate_with(code, user_input, &ValidateOptions::default())
            .await
    }

    /// Validates `code`.
    ///
    /// Never fails: every layer problem is folded into the returned result.
    #[instrument(skip_all, fields(code_len = code.len(), language = %self.language))]
    pub async fn validate_with(
        &self,
        code: &str,
        user_input: &str,
        options: &ValidateOptions,
    ) -> ValidationResult {
        let start = Instant::now();
        info!("Starting validation");

        let ctx = LayerContext {
            code,
            user_input,
            language: self.language,
            sandbox: options.sandbox.as_ref().unwrap_or(&self.sandbox_config),
            cancel: &options.cancel,
        };

        let mut score = SecurityScore::new();
        let mut issues = Vec::new();
        let mut warnings = Vec::new();
        let mut layer_results = BTreeMap::new();
        let mut sandbox_result: Option<SandboxExecutionResult> = None;
        let mut cancelled = false;

        for layer in &self.layers {
            let name = layer.name();
            if cancelled || options.cancel.is_cancelled() {
                cancelled = true;
                layer_results.insert(name, skipped());
                continue;
            }

            let output = match layer.run(&ctx).await {
                Ok(output) => output,
                Err(err) if err.is_cancelled() => {
                    cancelled = true;
                    layer_results.insert(name, skipped());
                    continue;
                }
                Err(err) => {
                    error!(layer = %name, error = %err, "Validation layer failed");
                    LayerOutput::from(LayerResult::fail(
                        vec![format!("{} failed: {err}", failure_label(name))],
                        self.scoring.error_penalty(name),
                    ))
                }
            };

            debug!(
                layer = %name,
                state = %output.result.state,
                penalty = output.result.penalty,
                "Layer finished"
            );
            score.deduct(output.result.penalty);
            issues.extend(output.result.issues.iter().cloned());
            warnings.extend(output.result.warnings.iter().cloned());
            if output.execution.is_some() {
                sandbox_result = output.execution;
            }
            layer_results.insert(name, output.result);
        }

        let mut critical_failure = false;
        for name in LayerName::ORDERED.into_iter().filter(|n| n.is_critical()) {
            match layer_results.get(&name).map(|r| r.state) {
                Some(LayerState::Pass) => {}
                Some(LayerState::NotApplicable) if !cancelled => {
                    critical_failure = true;
                    issues.push(format!("Critical layer '{name}' was not applicable"));
                }
                _ => critical_failure = true,
            }
        }

        let security_score = score.value();
        let score_ok = score.raw() >= i64::from(self.min_security_score);
        if !score_ok {
            issues.push(format!("Security score too low: {security_score}/100"));
        }
        if cancelled {
            issues.push(CANCELLED_ISSUE.to_string());
        }

        let is_valid = !cancelled && !critical_failure && score_ok;
        info!(
            valid = is_valid,
            score = security_score,
            issues = issues.len(),
            warnings = warnings.len(),
            "Validation complete"
        );

        ValidationResult {
            is_valid,
            security_score,
            issues,
            warnings,
            layer_results,
            sandbox_result,
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Removes leftover sandbox runs.
    ///
    /// # Errors
    ///
    /// Propagates the sandbox's cleanup error.
    pub async fn cleanup(&self) -> Result<usize> {
        match &self.sandbox {
            Some(sandbox) => sandbox.cleanup().await,
            None => Ok(0),
        }
    }
}

fn skipped() -> LayerResult {
    LayerResult {
        state: LayerState::NotApplicable,
        issues: Vec::new(),
        warnings: Vec::new(),
        penalty: 0,
    }
}

const fn failure_label(name: LayerName) -> &'static str {
    match name {
        LayerName::InputSanitization => "Input sanitization",
        LayerName::StaticScan => "Static scan",
        LayerName::LlmValidation => "LLM validation",
        LayerName::ComplexityAnalysis => "Complexity analysis",
        LayerName::SandboxExecution => "Sandbox validation",
    }
}

/// Builder for [`Validator`].
#[derive(Debug)]
pub struct ValidatorBuilder {
    config: EvolveConfig,
    router: Option<Arc<ProviderRouter>>,
    sandbox: Option<Arc<dyn Sandbox>>,
}

impl ValidatorBuilder {
    fn new(config: &EvolveConfig) -> Self {
        Self {
            config: config.clone(),
            router: None,
            sandbox: None,
        }
    }

    /// Router for the semantic layer.
    ///
    /// Without one the semantic layer is not applicable, which rejects
    /// every verdict since the layer is critical.
    #[must_use]
    pub fn router(mut self, router: Arc<ProviderRouter>) -> Self {
        self.router = Some(router);
        self
    }

    /// Sandbox for the execution layer.
    #[must_use]
    pub fn sandbox(mut self, sandbox: Arc<dyn Sandbox>) -> Self {
        self.sandbox = Some(sandbox);
        self
    }

    /// Builds the validator and its fixed layer table.
    #[must_use]
    pub fn build(self) -> Validator {
        let EvolveConfig {
            validation,
            scanner,
            complexity,
            scoring,
            llm,
            sandbox: sandbox_config,
        } = self.config;

        let semantic = self
            .router
            .filter(|_| validation.llm_validation)
            .map(|router| SemanticValidator::new(router, llm.max_retries));
        let sandbox = self.sandbox.filter(|_| validation.sandbox_execution);

        let layers: Vec<Arc<dyn ValidationLayer>> = vec![
            Arc::new(SanitizationLayer::new(
                Sanitizer::new(validation.max_input_length),
                scoring.sanitization_penalty,
            )),
            Arc::new(StaticScanLayer::new(
                StaticScanner::new(&scanner),
                scoring.static_scan_penalty,
            )),
            Arc::new(SemanticLayer::new(semantic, scoring.semantic_penalty)),
            Arc::new(ComplexityLayer::new(
                ComplexityAnalyzer::new(&complexity),
                scoring.complexity_issue_penalty,
            )),
            Arc::new(SandboxLayer::new(
                sandbox.clone(),
                scoring.sandbox_penalty,
                validation.long_execution_warning(),
            )),
        ];

        Validator {
            layers,
            scoring,
            min_security_score: validation.min_security_score,
            language: validation.language,
            sandbox_config,
            sandbox,
        }
    }
}
