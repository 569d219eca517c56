//! Locally hosted Ollama-compatible client.

use super::{Completion, CompletionRequest, HttpProviderState, Provider, ProviderRuntimeStats};
use crate::ProviderError;
use async_trait::async_trait;
use evolve_core::ProviderConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Bound on the `/api/tags` reachability probe.
const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Local server client. Needs no credential; availability is a
/// reachability probe.
#[derive(Debug)]
pub struct LocalProvider {
    state: HttpProviderState,
}

impl LocalProvider {
    /// Creates the client. `base_url` is the server root.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Http`] if the HTTP client cannot be built.
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            state: HttpProviderState::new(config)?,
        })
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    eval_count: Option<u32>,
    prompt_eval_count: Option<u32>,
}

#[async_trait]
impl Provider for LocalProvider {
    fn config(&self) -> &ProviderConfig {
        &self.state.config
    }

    fn runtime_stats(&self) -> &ProviderRuntimeStats {
        self.state.stats()
    }

    fn is_enabled(&self) -> bool {
        self.state.is_enabled()
    }

    fn set_enabled(&self, enabled: bool) {
        self.state.set_enabled(enabled);
    }

    async fn is_available(&self) -> bool {
        if !self.state.is_enabled() {
            return false;
        }
        let url = format!("{}/api/tags", self.state.base_url(DEFAULT_BASE_URL));
        match self
            .state
            .client
            .get(&url)
            .timeout(HEALTH_PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                debug!(provider = %self.state.config.name, error = %err.without_url(), "Health probe failed");
                false
            }
        }
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
        let url = format!("{}/api/generate", self.state.base_url(DEFAULT_BASE_URL));

        let body = GenerateRequest {
            model: &self.state.config.model,
            prompt: &request.prompt,
            system: request.system.as_deref(),
            stream: false,
            options: GenerateOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        let response = self.state.client.post(&url).json(&body).send().await?;
        let response = self.state.check_status(response).await?;
        let parsed: GenerateResponse = serde_json::from_slice(&response.bytes().await?)?;

        let tokens_used = match (parsed.prompt_eval_count, parsed.eval_count) {
            (Some(prompt), Some(completion)) => Some(prompt.saturating_add(completion)),
            (None, Some(completion)) => Some(completion),
            _ => None,
        };

        Ok(Completion {
            content: self.state.non_empty(Some(parsed.response))?,
            tokens_used,
        })
    }
}
