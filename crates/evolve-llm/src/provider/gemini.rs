//! Google Gemini `generateContent` client.

use super::{Completion, CompletionRequest, HttpProviderState, Provider, ProviderRuntimeStats};
use crate::ProviderError;
use async_trait::async_trait;
use evolve_core::ProviderConfig;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini client. The API key travels as the `key` query parameter.
#[derive(Debug)]
pub struct GeminiProvider {
    state: HttpProviderState,
}

impl GeminiProvider {
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
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    total_token_count: Option<u32>,
}

#[async_trait]
impl Provider for GeminiProvider {
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
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.state.base_url(DEFAULT_BASE_URL),
            self.state.config.model
        );

        // No separate system role on this endpoint; fold it into the text.
        let text = match &request.system {
            Some(system) => format!("System: {system}\n\nUser: {}", request.prompt),
            None => request.prompt.clone(),
        };

        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text }],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        };

        let response = self
            .state
            .client
            .post(&url)
            .query(&[("key", key)])
            .json(&body)
            .send()
            .await?;
        let response = self.state.check_status(response).await?;
        let parsed: GenerateResponse = serde_json::from_slice(&response.bytes().await?)?;

        let content = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .map(|p| p.text);

        Ok(Completion {
            content: self.state.non_empty(content)?,
            tokens_used: parsed.usage_metadata.and_then(|u| u.total_token_count),
        })
    }
}
