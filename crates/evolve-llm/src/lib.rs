//! Multi-provider text generation for evolve.
//!
//! This crate provides the provider clients and the router that the
//! semantic validation layer and code generation depend on.
//!
//! # Architecture
//!
//! - [`Provider`]: one backend exchange with timeout and statistics
//! - Four clients: Gemini, `OpenAI`, Anthropic, and a local Ollama server
//! - [`RetryPolicy`]: attempts, fixed delay, abort predicate
//! - [`ProviderRouter`]: priority fallback order with bounded retry
//!
//! # Examples
//!
//! ```no_run
//! use evolve_core::EvolveConfig;
//! use evolve_llm::ProviderRouter;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let router = ProviderRouter::from_config(&EvolveConfig::default().llm)?;
//! println!("order: {:?}", router.refresh_availability().await);
//!
//! if let Some(text) = router.query("Write a haiku about borrowing", None).await {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

mod error;
mod provider;
mod retry;
mod router;

pub use error::ProviderError;
pub use provider::{
    AnthropicProvider, Completion, CompletionRequest, GeminiProvider, LlmResponse, LocalProvider,
    OpenAiProvider, Provider, ProviderRuntimeStats, build_provider, build_providers,
};
pub use retry::{RetryPolicy, is_auth_error};
pub use router::{NO_PROVIDERS_ERROR, ProviderRouter, ROUTER_NAME};
