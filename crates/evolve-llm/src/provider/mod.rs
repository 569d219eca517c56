//! Provider clients.
//!
//! A [`Provider`] performs one authenticated request/response exchange with
//! a single text-generation backend. Implementations supply
//! [`complete`](Provider::complete); the provided [`query`](Provider::query)
//! wraps it with the availability check, the timeout bound, and statistics
//! bookkeeping, and flattens every failure into an [`LlmResponse`].
//!
//! The set of backends is closed: [`build_provider`] maps each
//! [`ProviderKind`] to its client.

mod anthropic;
mod gemini;
mod local;
mod openai;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use local::LocalProvider;
pub use openai::OpenAiProvider;

use crate::ProviderError;
use async_trait::async_trait;
use evolve_core::stats::ProviderStats;
use evolve_core::{ProviderConfig, ProviderKind};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Body bytes kept in API error messages.
const ERROR_BODY_LIMIT: usize = 500;

/// One request as seen by a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// User prompt
    pub prompt: String,
    /// Optional system prompt
    pub system: Option<String>,
    /// Token ceiling
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

/// Text produced by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Generated text
    pub content: String,
    /// Token usage reported by the backend, when any
    pub tokens_used: Option<u32>,
}

/// Outcome of one provider call. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    /// Generated text; empty on failure
    pub content: String,
    /// Provider that answered (or failed)
    pub provider: String,
    /// Model identifier
    pub model: String,
    /// Token usage, reported or estimated
    pub tokens_used: u32,
    /// Call latency in milliseconds
    pub latency_ms: u64,
    /// Whether the call produced text
    pub success: bool,
    /// Failure description
    pub error: Option<String>,
}

impl LlmResponse {
    /// Builds a successful response.
    #[must_use]
    pub fn success(
        provider: impl Into<String>,
        model: impl Into<String>,
        completion: Completion,
        latency: Duration,
    ) -> Self {
        let tokens_used = completion
            .tokens_used
            .unwrap_or_else(|| estimate_tokens(&completion.content));
        Self {
            content: completion.content,
            provider: provider.into(),
            model: model.into(),
            tokens_used,
            latency_ms: duration_ms(latency),
            success: true,
            error: None,
        }
    }

    /// Builds a failed response.
    #[must_use]
    pub fn failure(
        provider: impl Into<String>,
        model: impl Into<String>,
        error: impl Into<String>,
        latency: Duration,
    ) -> Self {
        Self {
            content: String::new(),
            provider: provider.into(),
            model: model.into(),
            tokens_used: 0,
            latency_ms: duration_ms(latency),
            success: false,
            error: Some(error.into()),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn duration_ms(d: Duration) -> u64 {
    d.as_millis() as u64
}

/// Word-count estimate used when the backend does not report usage.
#[allow(clippy::cast_possible_truncation)]
fn estimate_tokens(text: &str) -> u32 {
    text.split_whitespace().count().min(u32::MAX as usize) as u32
}

/// Running counters owned by one provider client.
///
/// Increment-only and lock-free; safe to update from concurrent calls.
#[derive(Debug, Default)]
pub struct ProviderRuntimeStats {
    request_count: AtomicU64,
    error_count: AtomicU64,
    total_latency_us: AtomicU64,
}

impl ProviderRuntimeStats {
    /// Records one completed call.
    #[allow(clippy::cast_possible_truncation)]
    pub fn record(&self, latency: Duration, success: bool) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
        self.total_latency_us
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
    }

    /// Calls recorded so far.
    #[must_use]
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Failed calls recorded so far.
    #[must_use]
    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Sum of recorded latencies.
    #[must_use]
    pub fn total_latency(&self) -> Duration {
        Duration::from_micros(self.total_latency_us.load(Ordering::Relaxed))
    }
}

/// A text-generation backend.
///
/// # Examples
///
/// ```no_run
/// use evolve_core::{ProviderConfig, ProviderKind};
/// use evolve_llm::build_provider;
///
/// # async fn example() -> Result<(), evolve_llm::ProviderError> {
/// let provider = build_provider(ProviderConfig::builtin(ProviderKind::Local))?;
/// let response = provider.query("Say hello", None).await;
/// if response.success {
///     println!("{}", response.content);
/// }
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Provider: Send + Sync + fmt::Debug {
    /// Settings the client was built with.
    fn config(&self) -> &ProviderConfig;

    /// Running counters.
    fn runtime_stats(&self) -> &ProviderRuntimeStats;

    /// Current enabled flag.
    fn is_enabled(&self) -> bool;

    /// Enables or disables the provider.
    fn set_enabled(&self, enabled: bool);

    /// Enabled and holding whatever credential the backend needs.
    ///
    /// Local state only, never I/O. Backends without a credential keep the
    /// default.
    fn is_configured(&self) -> bool {
        self.is_enabled()
    }

    /// Whether the provider can serve a request right now.
    ///
    /// Remote backends check local state only; a locally hosted backend
    /// probes reachability with a short bound.
    async fn is_available(&self) -> bool;

    /// Performs one exchange with the backend.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on transport, status, or schema failures.
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError>;

    /// Provider name.
    fn name(&self) -> &str {
        &self.config().name
    }

    /// Builds a request from the configured token and temperature limits.
    fn request(&self, prompt: &str, system: Option<&str>) -> CompletionRequest {
        let config = self.config();
        CompletionRequest {
            prompt: prompt.to_string(),
            system: system.map(str::to_string),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    /// Queries the backend, never blocking past the configured timeout.
    ///
    /// The availability check and the exchange share one timeout. Every
    /// call, including one rejected as unavailable, updates the running
    /// statistics exactly once.
    async fn query(&self, prompt: &str, system: Option<&str>) -> LlmResponse {
        let config = self.config();
        let start = Instant::now();

        let exchange = async {
            if !self.is_available().await {
                return Err(ProviderError::Unavailable {
                    provider: config.name.clone(),
                });
            }
            self.complete(&self.request(prompt, system)).await
        };
        let outcome = match tokio::time::timeout(config.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                provider: config.name.clone(),
                secs: config.timeout.as_secs(),
            }),
        };

        let latency = start.elapsed();
        self.runtime_stats().record(latency, outcome.is_ok());

        match outcome {
            Ok(completion) => {
                debug!(provider = %config.name, latency_ms = duration_ms(latency), "Provider call succeeded");
                LlmResponse::success(&config.name, &config.model, completion, latency)
            }
            Err(err) => {
                warn!(provider = %config.name, error = %err, "Provider call failed");
                LlmResponse::failure(&config.name, &config.model, err.to_string(), latency)
            }
        }
    }

    /// Snapshot of counters and settings.
    fn stats(&self) -> ProviderStats {
        let config = self.config();
        let runtime = self.runtime_stats();
        ProviderStats::new(&config.name, &config.model, self.is_enabled(), config.priority).with_counters(
            runtime.request_count(),
            runtime.error_count(),
            runtime.total_latency(),
        )
    }
}

/// Builds the client for a configuration's backend family.
///
/// # Errors
///
/// Returns [`ProviderError::Http`] if the HTTP client cannot be created.
pub fn build_provider(config: ProviderConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let provider: Arc<dyn Provider> = match config.kind {
        ProviderKind::Gemini => Arc::new(GeminiProvider::new(config)?),
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(config)?),
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(config)?),
        ProviderKind::Local => Arc::new(LocalProvider::new(config)?),
    };
    Ok(provider)
}

/// Builds every client in a configuration list.
///
/// # Errors
///
/// Returns the first construction failure.
pub fn build_providers(
    configs: impl IntoIterator<Item = ProviderConfig>,
) -> Result<Vec<Arc<dyn Provider>>, ProviderError> {
    configs.into_iter().map(build_provider).collect()
}

/// State shared by the HTTP-backed clients.
#[derive(Debug)]
pub(crate) struct HttpProviderState {
    pub(crate) config: ProviderConfig,
    pub(crate) api_key: Option<SecretString>,
    pub(crate) client: Client,
    enabled: AtomicBool,
    stats: ProviderRuntimeStats,
}

impl HttpProviderState {
    pub(crate) fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        let api_key = resolve_api_key(&config);
        if api_key.is_none() && config.kind.requires_credential() {
            debug!(provider = %config.name, "No API key resolved");
        }
        Ok(Self {
            enabled: AtomicBool::new(config.enabled),
            config,
            api_key,
            client,
            stats: ProviderRuntimeStats::default(),
        })
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub(crate) const fn stats(&self) -> &ProviderRuntimeStats {
        &self.stats
    }

    /// Enabled and holding a credential.
    pub(crate) fn has_credential(&self) -> bool {
        self.is_enabled() && self.api_key.is_some()
    }

    pub(crate) fn api_key(&self) -> Result<&str, ProviderError> {
        self.api_key
            .as_ref()
            .map(|key| key.expose_secret())
            .ok_or_else(|| ProviderError::MissingApiKey {
                provider: self.config.name.clone(),
            })
    }

    /// Base URL without a trailing slash.
    pub(crate) fn base_url<'a>(&'a self, default: &'a str) -> &'a str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or(default)
            .trim_end_matches('/')
    }

    /// Maps a non-success status to an error, consuming the body.
    pub(crate) async fn check_status(
        &self,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderError::Authentication {
                provider: self.config.name.clone(),
                status: status.as_u16(),
            });
        }
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > ERROR_BODY_LIMIT {
            let mut cut = ERROR_BODY_LIMIT;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        Err(ProviderError::Api {
            status: status.as_u16(),
            body,
        })
    }

    pub(crate) fn non_empty(&self, content: Option<String>) -> Result<String, ProviderError> {
        content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ProviderError::EmptyResponse {
                provider: self.config.name.clone(),
            })
    }
}

/// Resolves the credential: inline key first, then the first non-empty
/// environment variable.
fn resolve_api_key(config: &ProviderConfig) -> Option<SecretString> {
    if let Some(key) = config.api_key.as_ref().filter(|k| !k.is_empty()) {
        return Some(SecretString::from(key.clone()));
    }
    config
        .api_key_env
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.is_empty())
        .map(SecretString::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_stats_record() {
        let stats = ProviderRuntimeStats::default();
        stats.record(Duration::from_millis(10), true);
        stats.record(Duration::from_millis(30), false);
        assert_eq!(stats.request_count(), 2);
        assert_eq!(stats.error_count(), 1);
        assert_eq!(stats.total_latency(), Duration::from_millis(40));
    }

    #[test]
    fn test_token_estimate_when_unreported() {
        let response = LlmResponse::success(
            "local",
            "llama2",
            Completion {
                content: "print('hello world')\nprint(2)".to_string(),
                tokens_used: None,
            },
            Duration::from_millis(5),
        );
        assert_eq!(response.tokens_used, 3);
        assert!(response.success);
        assert!(response.error.is_none());
    }

    #[test]
    fn test_inline_key_wins() {
        let mut config = ProviderConfig::builtin(ProviderKind::OpenAi);
        config.api_key = Some("sk-inline".to_string());
        config.api_key_env = vec!["EVOLVE_TEST_UNSET_VARIABLE".to_string()];
        let key = resolve_api_key(&config).unwrap();
        assert_eq!(key.expose_secret(), "sk-inline");
    }

    #[test]
    fn test_missing_key_resolves_to_none() {
        let mut config = ProviderConfig::builtin(ProviderKind::Anthropic);
        config.api_key = Some(String::new());
        config.api_key_env = vec!["EVOLVE_TEST_UNSET_VARIABLE".to_string()];
        assert!(resolve_api_key(&config).is_none());
    }

    #[test]
    fn test_build_provider_table() {
        for kind in [
            ProviderKind::Gemini,
            ProviderKind::OpenAi,
            ProviderKind::Anthropic,
            ProviderKind::Local,
        ] {
            let provider = build_provider(ProviderConfig::builtin(kind)).unwrap();
            assert_eq!(provider.name(), kind.as_str());
            assert_eq!(provider.config().kind, kind);
        }
    }
}
