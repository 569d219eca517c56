//! Provider statistics snapshots.
//!
//! Provider clients keep lock-free running counters; these types are the
//! read-only snapshots handed to callers. Every snapshot carries the
//! moment it was captured.
//!
//! # Examples
//!
//! ```
//! use evolve_core::stats::ProviderStats;
//! use std::time::Duration;
//!
//! let stats = ProviderStats::new("openai", "gpt-3.5-turbo", true, 2)
//!     .with_counters(4, 1, Duration::from_millis(800));
//!
//! assert_eq!(stats.avg_latency_ms(), Some(200.0));
//! assert_eq!(stats.error_rate(), Some(0.25));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Snapshot of one provider's counters and settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderStats {
    /// Provider name
    pub name: String,
    /// Model identifier
    pub model: String,
    /// Enabled flag at capture time
    pub enabled: bool,
    /// Priority (lower is preferred)
    pub priority: u32,
    /// Calls made, including failed ones
    pub request_count: u64,
    /// Calls that failed
    pub error_count: u64,
    /// Sum of call latencies in milliseconds
    pub total_latency_ms: u64,
    /// Capture time (UTC)
    pub snapshot_time: DateTime<Utc>,
}

impl ProviderStats {
    /// Creates a snapshot with zero counters.
    #[must_use]
    pub fn new(name: impl Into<String>, model: impl Into<String>, enabled: bool, priority: u32) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            enabled,
            priority,
            request_count: 0,
            error_count: 0,
            total_latency_ms: 0,
            snapshot_time: Utc::now(),
        }
    }

    /// Sets the running counters.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn with_counters(mut self, requests: u64, errors: u64, total_latency: Duration) -> Self {
        self.request_count = requests;
        self.error_count = errors;
        self.total_latency_ms = total_latency.as_millis() as u64;
        self
    }

    /// Mean latency per call, or `None` before the first call.
    #[must_use]
    pub fn avg_latency_ms(&self) -> Option<f64> {
        (self.request_count > 0).then(|| self.total_latency_ms as f64 / self.request_count as f64)
    }

    /// Fraction of calls that failed, or `None` before the first call.
    #[must_use]
    pub fn error_rate(&self) -> Option<f64> {
        (self.request_count > 0).then(|| self.error_count as f64 / self.request_count as f64)
    }
}

/// Snapshot of every provider owned by a router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterStats {
    /// Capture time (UTC)
    pub snapshot_time: DateTime<Utc>,
    /// Per-provider snapshots, in registration order
    pub providers: Vec<ProviderStats>,
    /// Current fallback order
    pub fallback_order: Vec<String>,
}

impl RouterStats {
    /// Creates a router snapshot stamped with the current time.
    #[must_use]
    pub fn new(providers: Vec<ProviderStats>, fallback_order: Vec<String>) -> Self {
        Self {
            snapshot_time: Utc::now(),
            providers,
            fallback_order,
        }
    }

    /// Total calls across every provider.
    #[must_use]
    pub fn total_requests(&self) -> u64 {
        self.providers.iter().map(|p| p.request_count).sum()
    }

    /// Looks up one provider's snapshot.
    #[must_use]
    pub fn provider(&self, name: &str) -> Option<&ProviderStats> {
        self.providers.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_undefined_without_calls() {
        let stats = ProviderStats::new("local", "llama2", true, 4);
        assert_eq!(stats.avg_latency_ms(), None);
        assert_eq!(stats.error_rate(), None);
        assert!(stats.snapshot_time <= Utc::now());
    }

    #[test]
    fn test_router_totals() {
        let a = ProviderStats::new("gemini", "gemini-2.0-flash", true, 1).with_counters(3, 0, Duration::ZERO);
        let b = ProviderStats::new("openai", "gpt-3.5-turbo", false, 2).with_counters(2, 2, Duration::ZERO);
        let router = RouterStats::new(vec![a, b], vec!["gemini".to_string()]);
        assert_eq!(router.total_requests(), 5);
        assert_eq!(router.provider("openai").unwrap().error_rate(), Some(1.0));
        assert!(router.provider("anthropic").is_none());
    }

    #[test]
    fn test_serializes_timestamp() {
        let stats = ProviderStats::new("anthropic", "claude-3-sonnet-20240229", true, 3);
        let json = serde_json::to_value(&stats).unwrap();
        assert!(json["snapshot_time"].is_string());
        assert_eq!(json["priority"], 3);
    }
}
