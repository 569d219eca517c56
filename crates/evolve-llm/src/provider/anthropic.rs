//! Anthropic messages API client.

use super::{Completion, CompletionRequest, HttpProviderState, Provider, ProviderRuntimeStats};
use crate::ProviderError;
use async_trait::async_trait;
use evolve_core::ProviderConfig;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// Anthropic client authenticating with `x-api-key`.
#[derive(Debug)]
pub struct AnthropicProvider {
    state: HttpProviderState,
}

impl AnthropicProvider {
    /// Creates the client, resolving its credential once.
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
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[async_trait]
impl Provider for AnthropicProvider {
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

    fn is_configured(&self) -> bool {
        self.state.has_credential()
    }

    async fn is_available(&self) -> bool {
        self.is_configured()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
        let key = self.state.api_key()?;
        let url = format!("{}/v1/messages", self.state.base_url(DEFAULT_BASE_URL));

        let body = MessagesRequest {
            model: &self.state.config.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: request.system.as_deref(),
            messages: [Message {
                role: "user",
                content: &request.prompt,
            }],
        };

        let response = self
            .state
            .client
            .post(&url)
            .header("x-api-key", key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;
        let response = self.state.check_status(response).await?;
        let parsed: MessagesResponse = serde_json::from_slice(&response.bytes().await?)?;

        let content = parsed
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .map(|block| block.text);

        Ok(Completion {
            content: self.state.non_empty(content)?,
            tokens_used: parsed
                .usage
                .map(|u| u.input_tokens.saturating_add(u.output_tokens)),
        })
    }
}
