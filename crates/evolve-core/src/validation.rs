//! Validation result models.
//!
//! A validation pass produces one [`LayerResult`] per layer and a single
//! aggregated [`ValidationResult`]. Scores are accumulated in a
//! [`SecurityScore`], which never increases and is clamped to `0..=100`
//! only when reported.

use crate::{LayerName, SandboxExecutionResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Outcome state of a single layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerState {
    /// The layer ran and found nothing blocking.
    Pass,
    /// The layer ran and rejected the code, or could not complete.
    Fail,
    /// The layer could not run (disabled, substrate or providers missing).
    NotApplicable,
}

impl LayerState {
    /// Returns `true` for [`LayerState::Pass`].
    #[must_use]
    pub const fn is_pass(self) -> bool {
        matches!(self, Self::Pass)
    }
}

impl fmt::Display for LayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::NotApplicable => "not-applicable",
        })
    }
}

/// What one layer contributed to the verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerResult {
    /// Tri-state outcome
    pub state: LayerState,
    /// Blocking findings
    pub issues: Vec<String>,
    /// Non-blocking findings
    pub warnings: Vec<String>,
    /// Points deducted from the security score
    pub penalty: u32,
}

impl LayerResult {
    /// A passing result with no findings.
    #[must_use]
    pub const fn pass() -> Self {
        Self {
            state: LayerState::Pass,
            issues: Vec::new(),
            warnings: Vec::new(),
            penalty: 0,
        }
    }

    /// A failing result with the given issues and penalty.
    #[must_use]
    pub const fn fail(issues: Vec<String>, penalty: u32) -> Self {
        Self {
            state: LayerState::Fail,
            issues,
            warnings: Vec::new(),
            penalty,
        }
    }

    /// A not-applicable result carrying the reason as a warning.
    #[must_use]
    pub fn not_applicable(reason: impl Into<String>) -> Self {
        Self {
            state: LayerState::NotApplicable,
            issues: Vec::new(),
            warnings: vec![reason.into()],
            penalty: 0,
        }
    }

    /// Adds warnings to the result.
    #[must_use]
    pub fn with_warnings(mut self, warnings: impl IntoIterator<Item = String>) -> Self {
        self.warnings.extend(warnings);
        self
    }
}

/// Security score accumulator.
///
/// Starts at 100. Deductions are unsigned, so the raw value only
/// decreases; it may go below zero and is clamped when read through
/// [`value`](Self::value).
///
/// # Examples
///
/// ```
/// use evolve_core::SecurityScore;
///
/// let mut score = SecurityScore::new();
/// score.deduct(25);
/// score.deduct(90);
/// assert_eq!(score.raw(), -15);
/// assert_eq!(score.value(), 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityScore(i64);

impl SecurityScore {
    /// Score before any deduction.
    pub const MAX: u32 = 100;

    /// Creates a score of 100.
    #[must_use]
    pub const fn new() -> Self {
        Self(Self::MAX as i64)
    }

    /// Subtracts a penalty.
    pub const fn deduct(&mut self, penalty: u32) {
        self.0 -= penalty as i64;
    }

    /// Unclamped accumulated value.
    #[must_use]
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Reported value, clamped to `0..=100`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub const fn value(self) -> u32 {
        if self.0 < 0 {
            0
        } else if self.0 > Self::MAX as i64 {
            Self::MAX
        } else {
            self.0 as u32
        }
    }
}

impl Default for SecurityScore {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregated outcome of one validation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Overall verdict
    pub is_valid: bool,
    /// Reported security score, `0..=100`
    pub security_score: u32,
    /// Blocking findings from every layer, in pipeline order
    pub issues: Vec<String>,
    /// Non-blocking findings from every layer, in pipeline order
    pub warnings: Vec<String>,
    /// Per-layer results keyed by layer name
    pub layer_results: BTreeMap<LayerName, LayerResult>,
    /// Sandbox outcome, when the sandbox layer ran
    pub sandbox_result: Option<SandboxExecutionResult>,
    /// Wall-clock duration of the pass in milliseconds
    pub duration_ms: u64,
}

impl ValidationResult {
    /// Returns the result recorded for a layer.
    #[must_use]
    pub fn layer(&self, name: LayerName) -> Option<&LayerResult> {
        self.layer_results.get(&name)
    }

    /// Returns the state recorded for a layer.
    #[must_use]
    pub fn layer_state(&self, name: LayerName) -> Option<LayerState> {
        self.layer(name).map(|r| r.state)
    }

    /// Returns `true` if any issue contains `needle`.
    #[must_use]
    pub fn has_issue_containing(&self, needle: &str) -> bool {
        self.issues.iter().any(|i| i.contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_never_increases() {
        let mut score = SecurityScore::new();
        let mut previous = score.raw();
        for penalty in [0, 10, 25, 30, 15] {
            score.deduct(penalty);
            assert!(score.raw() <= previous);
            previous = score.raw();
        }
        assert_eq!(score.value(), 20);
    }

    #[test]
    fn test_score_clamped_at_reporting() {
        let mut score = SecurityScore::new();
        score.deduct(250);
        assert_eq!(score.value(), 0);
        assert_eq!(score.raw(), -150);
    }

    #[test]
    fn test_not_applicable_records_warning() {
        let result = LayerResult::not_applicable("Docker sandbox not available");
        assert_eq!(result.state, LayerState::NotApplicable);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.penalty, 0);
    }

    #[test]
    fn test_result_serializes_layer_names() {
        let mut layer_results = BTreeMap::new();
        layer_results.insert(LayerName::StaticScan, LayerResult::pass());
        let result = ValidationResult {
            is_valid: true,
            security_score: 100,
            issues: vec![],
            warnings: vec![],
            layer_results,
            sandbox_result: None,
            duration_ms: 3,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["layer_results"]["static_scan"]["state"], "pass");
        assert_eq!(result.layer_state(LayerName::StaticScan), Some(LayerState::Pass));
        assert!(result.layer(LayerName::SandboxExecution).is_none());
    }
}
