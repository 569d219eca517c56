//! Priority-ordered provider router with bounded retry and fallback.
//!
//! The router owns a fixed set of providers. Its fallback order is the list
//! of currently available providers sorted ascending by priority
//! (registration order breaks ties). It starts from the providers that are
//! enabled and hold their credential, and is recomputed with the full
//! availability check on [`ProviderRouter::refresh_availability`] and on
//! enable changes. Each recomputation is swapped in atomically, so
//! concurrent readers always see a complete order.
//!
//! # Examples
//!
//! ```no_run
//! use evolve_core::EvolveConfig;
//! use evolve_llm::ProviderRouter;
//!
//! # async fn example() -> Result<(), evolve_llm::ProviderError> {
//! let config = EvolveConfig::default();
//! let router = ProviderRouter::from_config(&config.llm)?;
//!
//! let response = router.query_with_fallback("Explain ownership", None, 3).await;
//! if response.success {
//!     println!("{} answered: {}", response.provider, response.content);
//! } else {
//!     eprintln!("{}", response.error.unwrap_or_default());
//! }
//! # Ok(())
//! # }
//! ```

use crate::{LlmResponse, Provider, ProviderError, RetryPolicy, build_providers};
use arc_swap::ArcSwap;
use evolve_core::LlmConfig;
use evolve_core::stats::RouterStats;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Provider name used on router-level failure responses.
pub const ROUTER_NAME: &str = "router";

/// Error text when no provider could be asked.
pub const NO_PROVIDERS_ERROR: &str = "No LLM providers available";

/// Routes queries across providers in priority order.
pub struct ProviderRouter {
    providers: Vec<Arc<dyn Provider>>,
    fallback_order: ArcSwap<Vec<String>>,
    retry: RetryPolicy,
}

impl fmt::Debug for ProviderRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRouter")
            .field("providers", &self.providers.len())
            .field("fallback_order", &self.fallback_order())
            .field("retry", &self.retry)
            .finish()
    }
}

impl ProviderRouter {
    /// Creates a router with the default retry policy.
    ///
    /// The initial fallback order holds the enabled providers that have
    /// their credential; call
    /// [`refresh_availability`](Self::refresh_availability) to also probe
    /// reachability.
    #[must_use]
    pub fn new(providers: Vec<Arc<dyn Provider>>) -> Self {
        Self::with_retry_policy(providers, RetryPolicy::default())
    }

    /// Creates a router with an explicit retry policy.
    #[must_use]
    pub fn with_retry_policy(providers: Vec<Arc<dyn Provider>>, retry: RetryPolicy) -> Self {
        let mut configured: Vec<&Arc<dyn Provider>> =
            providers.iter().filter(|p| p.is_configured()).collect();
        configured.sort_by_key(|p| p.config().priority);
        let order = configured.iter().map(|p| p.name().to_string()).collect();

        Self {
            fallback_order: ArcSwap::from_pointee(order),
            providers,
            retry,
        }
    }

    /// Builds every configured provider and the retry policy from
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if a client cannot be constructed.
    pub fn from_config(config: &LlmConfig) -> Result<Self, ProviderError> {
        let providers = build_providers(config.provider_configs())?;
        let retry = RetryPolicy::new(config.max_retries, config.retry_delay());
        Ok(Self::with_retry_policy(providers, retry))
    }

    /// Retry policy in effect.
    #[must_use]
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Registered providers, in registration order.
    #[must_use]
    pub fn providers(&self) -> &[Arc<dyn Provider>] {
        &self.providers
    }

    /// Looks up a provider by name.
    #[must_use]
    pub fn provider(&self, name: &str) -> Option<&Arc<dyn Provider>> {
        self.providers.iter().find(|p| p.name() == name)
    }

    /// Current fallback order.
    #[must_use]
    pub fn fallback_order(&self) -> Vec<String> {
        Vec::clone(&self.fallback_order.load())
    }

    /// Names of providers that are available right now, sorted by priority.
    pub async fn available_providers(&self) -> Vec<String> {
        let mut available = Vec::new();
        for provider in &self.providers {
            if provider.is_available().await {
                available.push(Arc::clone(provider));
            }
        }
        available.sort_by_key(|p| p.config().priority);
        available.iter().map(|p| p.name().to_string()).collect()
    }

    /// Recomputes and stores the fallback order. Returns the new order.
    pub async fn refresh_availability(&self) -> Vec<String> {
        let order = self.available_providers().await;
        let previous = self.fallback_order.swap(Arc::new(order.clone()));
        if *previous != order {
            info!(order = ?order, "Fallback order updated");
        }
        order
    }

    /// Enables or disables a provider and recomputes the fallback order.
    ///
    /// Returns `false` if no provider has that name.
    pub async fn set_provider_enabled(&self, name: &str, enabled: bool) -> bool {
        let Some(provider) = self.provider(name) else {
            return false;
        };
        provider.set_enabled(enabled);
        self.refresh_availability().await;
        true
    }

    /// Snapshot of every provider's counters and the current order.
    #[must_use]
    pub fn provider_stats(&self) -> RouterStats {
        RouterStats::new(
            self.providers.iter().map(|p| p.stats()).collect(),
            self.fallback_order(),
        )
    }

    /// Queries providers in fallback order, retrying each up to
    /// `max_retries` times.
    ///
    /// Walks the stored fallback order; a provider that is unavailable when
    /// its turn comes is skipped. Authentication-class errors stop retries
    /// on that provider and move to the next. Returns the first success,
    /// otherwise a failure whose error names the last error seen.
    #[instrument(skip(self, prompt, system), fields(prompt_len = prompt.len()))]
    pub async fn query_with_fallback(
        &self,
        prompt: &str,
        system: Option<&str>,
        max_retries: u32,
    ) -> LlmResponse {
        self.run(prompt, system, max_retries, None).await
    }

    /// Like [`query_with_fallback`](Self::query_with_fallback), abandoning
    /// the in-flight call and any pending delay when `cancel` fires.
    #[instrument(skip(self, prompt, system, cancel), fields(prompt_len = prompt.len()))]
    pub async fn query_with_fallback_cancellable(
        &self,
        prompt: &str,
        system: Option<&str>,
        max_retries: u32,
        cancel: &CancellationToken,
    ) -> LlmResponse {
        self.run(prompt, system, max_retries, Some(cancel)).await
    }

    /// Queries with the policy's attempt budget; `None` on failure.
    pub async fn query(&self, prompt: &str, system: Option<&str>) -> Option<String> {
        let response = self
            .query_with_fallback(prompt, system, self.retry.max_attempts)
            .await;
        response.success.then_some(response.content)
    }

    async fn run(
        &self,
        prompt: &str,
        system: Option<&str>,
        max_retries: u32,
        cancel: Option<&CancellationToken>,
    ) -> LlmResponse {
        let start = Instant::now();
        let order = self.fallback_order.load_full();
        let mut last_error: Option<String> = None;

        for name in order.as_slice() {
            let Some(provider) = self.provider(name) else {
                continue;
            };
            if !provider.is_available().await {
                debug!(provider = %name, "Skipping unavailable provider");
                continue;
            }

            for attempt in 1..=max_retries {
                let response = match cancel {
                    Some(token) => tokio::select! {
                        biased;
                        () = token.cancelled() => return cancelled(start.elapsed()),
                        response = provider.query(prompt, system) => response,
                    },
                    None => provider.query(prompt, system).await,
                };

                if response.success {
                    info!(provider = %name, attempt, latency_ms = response.latency_ms, "Query succeeded");
                    return response;
                }

                let error = response.error.unwrap_or_else(|| "unknown error".to_string());
                warn!(provider = %name, attempt, error = %error, "Query attempt failed");
                let abort = self.retry.should_abort(&error);
                last_error = Some(error);

                if abort {
                    debug!(provider = %name, "Authentication error, skipping remaining retries");
                    break;
                }

                if attempt < max_retries && !self.retry.delay.is_zero() {
                    match cancel {
                        Some(token) => tokio::select! {
                            biased;
                            () = token.cancelled() => return cancelled(start.elapsed()),
                            () = tokio::time::sleep(self.retry.delay) => {}
                        },
                        None => tokio::time::sleep(self.retry.delay).await,
                    }
                }
            }
        }

        let Some(last_error) = last_error else {
            warn!("No LLM providers available");
            return LlmResponse::failure(ROUTER_NAME, "", NO_PROVIDERS_ERROR, start.elapsed());
        };
        LlmResponse::failure(
            ROUTER_NAME,
            "",
            format!("All providers failed. Last error: {last_error}"),
            start.elapsed(),
        )
    }
}

fn cancelled(elapsed: Duration) -> LlmResponse {
    warn!("Query cancelled");
    LlmResponse::failure(ROUTER_NAME, "", "Query cancelled", elapsed)
}
