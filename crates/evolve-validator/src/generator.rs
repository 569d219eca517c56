//! Code generation from a prose description.
//!
//! The description is sanitized before it reaches a provider, and the
//! answer is stripped of markdown fences, checked against a length
//! ceiling and scanned for destructive shell commands. Full validation
//! is left to [`Validator`](crate::Validator).

use crate::Sanitizer;
use crate::semantic::router_failure;
use evolve_core::{Error, Result};
use evolve_llm::ProviderRouter;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// System prompt for code generation.
pub const GENERATOR_SYSTEM_PROMPT: &str = "\
You are a Python code generator for a self-evolving CLI tool.
Generate clean, safe, and functional Python code based on the user's description.
The code should be compatible with the Click framework and follow these guidelines:

1. Use only safe imports and avoid dangerous operations
2. Include proper error handling
3. Add docstrings and comments
4. Return complete, executable code
5. Use Click decorators for CLI commands when appropriate
6. Follow PEP 8 style guidelines

Return ONLY the Python code without any explanations or markdown formatting.";

/// Default ceiling on generated code length, in characters.
pub const DEFAULT_MAX_CODE_LENGTH: usize = 10_000;

/// Turns descriptions into code through the provider router.
#[derive(Debug, Clone)]
pub struct CodeGenerator {
    router: Arc<ProviderRouter>,
    sanitizer: Sanitizer,
    max_code_length: usize,
    max_retries: u32,
}

impl CodeGenerator {
    /// Creates a generator with default limits.
    #[must_use]
    pub fn new(router: Arc<ProviderRouter>, sanitizer: Sanitizer) -> Self {
        let max_retries = router.retry_policy().max_attempts;
        Self {
            router,
            sanitizer,
            max_code_length: DEFAULT_MAX_CODE_LENGTH,
            max_retries,
        }
    }

    /// Sets the generated code length ceiling.
    #[must_use]
    pub const fn with_max_code_length(mut self, max: usize) -> Self {
        self.max_code_length = max;
        self
    }

    /// Sets attempts per provider.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Generates code for `description`.
    ///
    /// # Errors
    ///
    /// See [`generate_cancellable`](Self::generate_cancellable).
    pub async fn generate(&self, description: &str) -> Result<String> {
        self.generate_cancellable(description, &CancellationToken::new())
            .await
    }

    /// Generates code for `description`, stopping early if `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns a provider error when no provider produced an answer,
    /// [`Error::ParseFailure`] when the answer holds no code, and
    /// [`Error::ComplexityViolation`] when the code exceeds the length ceiling,
    /// and [`Error::SecurityViolation`] when it carries a destructive command.
    #[instrument(skip(self, description, cancel), fields(description_len = description.len()))]
    pub async fn generate_cancellable(
        &self,
        description: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let prompt = self.sanitizer.sanitize_input(description);
        let response = self
            .router
            .query_with_fallback_cancellable(
                &prompt,
                Some(GENERATOR_SYSTEM_PROMPT),
                self.max_retries,
                cancel,
            )
            .await;
        if !response.success {
            return Err(router_failure(response, cancel, "code generation"));
        }

        let code = extract_code(&response.content);
        if code.is_empty() {
            return Err(Error::ParseFailure {
                message: "provider answer contained no code".to_string(),
            });
        }

        let length = code.chars().count();
        if length > self.max_code_length {
            warn!(length, max = self.max_code_length, "Generated code too long");
            return Err(Error::ComplexityViolation {
                metric: "code_length".to_string(),
                value: length,
                limit: self.max_code_length,
            });
        }

        let report = self.sanitizer.validate_response(&code);
        if !report.is_clean() {
            warn!(
                violations = report.violations.len(),
                "Generated code carries destructive commands"
            );
            return Err(Error::SecurityViolation {
                reason: report.violations.join("; "),
            });
        }

        info!(provider = %response.provider, length, "Code generated");
        Ok(code)
    }
}

/// Extracts code from a model answer, removing markdown fences.
///
/// A ```` ```python ```` fence wins over a bare one. An unterminated fence
/// leaves the answer as is.
///
/// # Examples
///
/// ```
/// use evolve_validator::extract_code;
///
/// assert_eq!(extract_code("Here:\n```python\nprint(1)\n```\nDone."), "print(1)");
/// assert_eq!(extract_code("```\nprint(2)\n```"), "print(2)");
/// assert_eq!(extract_code("  print(3)  "), "print(3)");
/// ```
#[must_use]
pub fn extract_code(answer: &str) -> String {
    const PYTHON_FENCE: &str = "```python";
    const FENCE: &str = "```";

    let fenced = |open: usize, skip_info: bool| -> Option<&str> {
        let mut body = &answer[open..];
        if skip_info {
            // Drop a language tag such as `py` on the opening line.
            let first_line = body.split('\n').next().unwrap_or_default();
            if !first_line.trim().is_empty() && !first_line.trim().contains(char::is_whitespace) {
                body = &body[first_line.len()..];
            }
        }
        body.find(FENCE).map(|end| &body[..end])
    };

    let inner = if let Some(start) = answer.find(PYTHON_FENCE) {
        fenced(start + PYTHON_FENCE.len(), false)
    } else if let Some(start) = answer.find(FENCE) {
        fenced(start + FENCE.len(), true)
    } else {
        None
    };

    inner.unwrap_or(answer).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_fence_preferred() {
        let answer = "```text\nnot this\n```\n```python\nimport click\n```";
        assert_eq!(extract_code(answer), "import click");
    }

    #[test]
    fn test_bare_fence_with_language_tag() {
        assert_eq!(extract_code("```py\nx = 1\n```"), "x = 1");
        assert_eq!(extract_code("```\nx = 2\n```"), "x = 2");
    }

    #[test]
    fn test_unterminated_fence_kept() {
        assert_eq!(extract_code("```python\nx = 1"), "```python\nx = 1");
    }

    #[test]
    fn test_plain_answer_trimmed() {
        assert_eq!(extract_code("\n\nprint('hi')\n"), "print('hi')");
    }
}
