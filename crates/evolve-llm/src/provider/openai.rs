//! OpenAI chat completions client.

use super::{Completion, CompletionRequest, HttpProviderState, Provider, ProviderRuntimeStats};
use crate::ProviderError;
use async_trait::async_trait;
use evolve_core::ProviderConfig;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// OpenAI client using bearer authentication.
#[derive(Debug)]
pub struct OpenAiProvider {
    state: HttpProviderState,
}

impl OpenAiProvider {
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
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: u32,
}

#[async_trait]
impl Provider for OpenAiProvider {
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
        let url = format!("{}/v1/chat/completions", self.state.base_url(DEFAULT_BASE_URL));

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        let body = ChatRequest {
            model: &self.state.config.model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .state
            .client
            .post(&url)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await?;
        let response = self.state.check_status(response).await?;
        let parsed: ChatResponse = serde_json::from_slice(&response.bytes().await?)?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content);

        Ok(Completion {
            content: self.state.non_empty(content)?,
            tokens_used: parsed.usage.map(|u| u.total_tokens),
        })
    }
}
