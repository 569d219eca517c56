//! Remote SAFE/UNSAFE judgment of code through the provider router.

use evolve_core::{Error, Result};
use evolve_llm::{LlmResponse, NO_PROVIDERS_ERROR, ProviderRouter};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// System prompt for the security judgment.
pub const SECURITY_SYSTEM_PROMPT: &str = "\
You are a code security validator. Analyze the provided Python code and respond with only 'SAFE' or 'UNSAFE'.

Check for:
1. Dangerous imports or operations (eval, exec, os.system, etc.)
2. File system operations outside allowed directories
3. Network operations without proper validation
4. Infinite loops or resource exhaustion
5. Code injection vulnerabilities

Respond with only 'SAFE' if the code is acceptable, or 'UNSAFE' if it poses any security risks.";

const EXHAUSTED_PREFIX: &str = "All providers failed. Last error: ";

/// Outcome of one semantic judgment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", content = "detail", rename_all = "snake_case")]
pub enum Verdict {
    /// Provider answered `SAFE`.
    Safe,
    /// Provider answered `UNSAFE`.
    Unsafe,
    /// Provider answered neither; the detail is its follow-up explanation.
    Concern(String),
}

impl Verdict {
    /// Reads a strict `SAFE`/`UNSAFE` answer, ignoring case and surrounding space.
    #[must_use]
    pub fn parse(answer: &str) -> Option<Self> {
        let answer = answer.trim();
        if answer.eq_ignore_ascii_case("SAFE") {
            Some(Self::Safe)
        } else if answer.eq_ignore_ascii_case("UNSAFE") {
            Some(Self::Unsafe)
        } else {
            None
        }
    }

    /// Returns `true` for [`Verdict::Safe`].
    #[must_use]
    pub const fn is_safe(&self) -> bool {
        matches!(self, Self::Safe)
    }

    /// Issue text for a rejecting verdict.
    #[must_use]
    pub fn issue(&self) -> Option<String> {
        match self {
            Self::Safe => None,
            Self::Unsafe => Some("LLM identified security risks in code".to_string()),
            Self::Concern(detail) => Some(format!("LLM security concern: {detail}")),
        }
    }

    /// `Ok` for a safe verdict, [`Error::SemanticRejection`] otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SemanticRejection`] carrying the issue text.
    pub fn into_result(self) -> Result<()> {
        match self.issue() {
            None => Ok(()),
            Some(reason) => Err(Error::SemanticRejection { reason }),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Safe => f.write_str("SAFE"),
            Self::Unsafe => f.write_str("UNSAFE"),
            Self::Concern(_) => f.write_str("CONCERN"),
        }
    }
}

/// Asks the provider router whether code is safe.
#[derive(Debug, Clone)]
pub struct SemanticValidator {
    router: Arc<ProviderRouter>,
    max_retries: u32,
}

impl SemanticValidator {
    /// Creates a validator querying `router` with `max_retries` attempts per provider.
    #[must_use]
    pub const fn new(router: Arc<ProviderRouter>, max_retries: u32) -> Self {
        Self {
            router,
            max_retries,
        }
    }

    /// Obtains a verdict for `code`.
    ///
    /// An answer that is neither `SAFE` nor `UNSAFE` triggers one follow-up
    /// query for the concrete concerns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if `cancel` fires,
    /// [`Error::ProviderUnavailable`] if no provider can be asked, and
    /// [`Error::AllProvidersExhausted`] if every attempt failed.
    pub async fn judge(&self, code: &str, cancel: &CancellationToken) -> Result<Verdict> {
        let response = self.ask(code, cancel).await?;

        if let Some(verdict) = Verdict::parse(&response.content) {
            info!(provider = %response.provider, %verdict, "Semantic verdict received");
            return Ok(verdict);
        }

        debug!(provider = %response.provider, "Unclear verdict, asking for details");
        let detail_prompt = format!(
            "The code was flagged as potentially unsafe. Please explain the specific security issues:\n\n{code}"
        );
        let detail = match self.ask(&detail_prompt, cancel).await {
            Ok(response) if !response.content.trim().is_empty() => {
                response.content.trim().to_string()
            }
            Ok(_) => "Unknown security issue".to_string(),
            Err(err) if err.is_cancelled() => return Err(err),
            Err(err) => {
                warn!(error = %err, "Follow-up query failed");
                "Unknown security issue".to_string()
            }
        };

        Ok(Verdict::Concern(detail))
    }

    async fn ask(&self, prompt: &str, cancel: &CancellationToken) -> Result<LlmResponse> {
        let response = self
            .router
            .query_with_fallback_cancellable(
                prompt,
                Some(SECURITY_SYSTEM_PROMPT),
                self.max_retries,
                cancel,
            )
            .await;

        if response.success {
            Ok(response)
        } else {
            Err(router_failure(response, cancel, "semantic validation"))
        }
    }
}

/// Maps a failed router response onto the error taxonomy.
pub(crate) fn router_failure(
    response: LlmResponse,
    cancel: &CancellationToken,
    operation: &str,
) -> Error {
    if cancel.is_cancelled() {
        return Error::Cancelled {
            operation: operation.to_string(),
        };
    }

    let error = response.error.unwrap_or_default();
    if error == NO_PROVIDERS_ERROR {
        return Error::ProviderUnavailable {
            provider: "any configured provider".to_string(),
        };
    }
    Error::AllProvidersExhausted {
        last_error: error
            .strip_prefix(EXHAUSTED_PREFIX)
            .unwrap_or(&error)
            .to_string(),
    }
}
