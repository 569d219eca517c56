//! Errors raised inside a single provider exchange.
//!
//! These never escape [`Provider::query`](crate::Provider::query): they are
//! flattened into the `error` string of an [`LlmResponse`](crate::LlmResponse),
//! where the router's abort predicate inspects them.

use thiserror::Error;

/// Failure of one request/response exchange with a backend.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Transport-level failure. The URL is stripped so query-string keys
    /// never reach logs.
    #[error("HTTP request failed: {0}")]
    Http(#[source] reqwest::Error),

    /// Response body did not match the backend's schema.
    #[error("Invalid response body: {0}")]
    Json(#[from] serde_json::Error),

    /// Backend answered with a non-success status.
    #[error("API error (HTTP {status}): {body}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body, truncated
        body: String,
    },

    /// Backend rejected the credential.
    #[error("Authentication failed for {provider} (HTTP {status})")]
    Authentication {
        /// Provider name
        provider: String,
        /// HTTP status code
        status: u16,
    },

    /// No credential was resolved for a backend that requires one.
    #[error("API key not configured for {provider}")]
    MissingApiKey {
        /// Provider name
        provider: String,
    },

    /// Backend answered successfully but produced no text.
    #[error("Empty response from {provider}")]
    EmptyResponse {
        /// Provider name
        provider: String,
    },

    /// The call exceeded the provider's timeout.
    #[error("Request to {provider} timed out after {secs}s")]
    Timeout {
        /// Provider name
        provider: String,
        /// Configured timeout in seconds
        secs: u64,
    },

    /// The provider is disabled or unreachable.
    #[error("Provider {provider} is not available")]
    Unavailable {
        /// Provider name
        provider: String,
    },
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.without_url())
    }
}

impl ProviderError {
    /// Returns `true` for credential problems.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::MissingApiKey { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_messages_match_abort_keywords() {
        let missing = ProviderError::MissingApiKey {
            provider: "openai".to_string(),
        };
        assert!(missing.is_auth());
        assert!(missing.to_string().contains("API key"));

        let rejected = ProviderError::Authentication {
            provider: "anthropic".to_string(),
            status: 401,
        };
        assert!(rejected.is_auth());
        assert!(rejected.to_string().to_lowercase().contains("authentication"));
    }

    #[test]
    fn test_server_error_is_not_auth() {
        let err = ProviderError::Api {
            status: 500,
            body: "internal".to_string(),
        };
        assert!(!err.is_auth());
        assert_eq!(err.to_string(), "API error (HTTP 500): internal");
    }
}
