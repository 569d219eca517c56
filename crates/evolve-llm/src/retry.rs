//! Retry policy for the provider router.

use std::fmt;
use std::time::Duration;

/// Attempts per provider, the fixed delay between them, and the predicate
/// that stops retrying a provider early.
///
/// # Examples
///
/// ```
/// use evolve_llm::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default().with_delay(Duration::ZERO);
/// assert_eq!(policy.max_attempts, 3);
/// assert!(policy.should_abort("API key not configured for openai"));
/// assert!(!policy.should_abort("API error (HTTP 500): overloaded"));
/// ```
#[derive(Clone, Copy)]
pub struct RetryPolicy {
    /// Calls per provider before moving to the next one
    pub max_attempts: u32,
    /// Delay between consecutive attempts on one provider
    pub delay: Duration,
    /// Returns `true` if an error text means retrying is pointless
    pub abort: fn(&str) -> bool,
}

impl RetryPolicy {
    /// Default attempts per provider.
    pub const DEFAULT_ATTEMPTS: u32 = 3;

    /// Default inter-attempt delay.
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

    /// Creates a policy with the default abort predicate.
    #[must_use]
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            abort: is_auth_error,
        }
    }

    /// Replaces the attempt budget.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Replaces the delay.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Replaces the abort predicate.
    #[must_use]
    pub const fn with_abort(mut self, abort: fn(&str) -> bool) -> Self {
        self.abort = abort;
        self
    }

    /// Applies the abort predicate.
    #[must_use]
    pub fn should_abort(&self, error: &str) -> bool {
        (self.abort)(error)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ATTEMPTS, Self::DEFAULT_DELAY)
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

/// Authentication-class errors: text containing `API key`, or
/// `authentication` in any case.
#[must_use]
pub fn is_auth_error(error: &str) -> bool {
    error.contains("API key") || error.to_lowercase().contains("authentication")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_detection() {
        assert!(is_auth_error("Invalid API key provided"));
        assert!(is_auth_error("Authentication failed for anthropic (HTTP 401)"));
        assert!(is_auth_error("AUTHENTICATION required"));
        assert!(!is_auth_error("api key rotated"));
        assert!(!is_auth_error("Request to gemini timed out after 30s"));
    }

    #[test]
    fn test_custom_abort() {
        let policy = RetryPolicy::default().with_abort(|e| e.contains("quota"));
        assert!(policy.should_abort("quota exceeded"));
        assert!(!policy.should_abort("Invalid API key"));
    }

    #[test]
    fn test_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_secs(1));
    }
}
