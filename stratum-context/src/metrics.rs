//! Derived context metrics and compaction trigger reasons.

use serde::{Deserialize, Serialize};

/// Why a compaction was (or would be) triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompactTrigger {
    /// The standard pre-model threshold fired.
    ContextSize,
    /// The tighter post-tool threshold fired.
    PostTool,
    /// Requested explicitly.
    Manual,
}

/// A snapshot of context utilization against the configured thresholds.
///
/// Derived, never stored: recompute (or hit the analysis cache) whenever the
/// message list changes. Utilization and thresholds are percentages of the
/// context window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContextMetrics {
    /// Estimated tokens in the conversation.
    pub tokens_used: usize,
    /// The configured context window.
    pub max_tokens: usize,
    /// `tokens_used / max_tokens`, as a percentage.
    pub utilization_pct: f64,
    /// Standard trigger threshold, as a percentage.
    pub trigger_threshold: f64,
    /// Post-tool trigger threshold, as a percentage.
    pub post_tool_threshold: f64,
}

impl ContextMetrics {
    /// Build metrics from a raw token count and fractional thresholds.
    #[must_use]
    pub fn from_tokens(
        tokens_used: usize,
        max_tokens: usize,
        trigger_threshold: f64,
        post_tool_threshold: f64,
    ) -> Self {
        let utilization_pct = if max_tokens > 0 {
            tokens_used as f64 / max_tokens as f64 * 100.0
        } else {
            0.0
        };
        Self {
            tokens_used,
            max_tokens,
            utilization_pct,
            trigger_threshold: trigger_threshold * 100.0,
            post_tool_threshold: post_tool_threshold * 100.0,
        }
    }

    /// Whether the standard threshold fires. Inclusive: utilization exactly at
    /// the threshold triggers.
    #[must_use]
    pub fn should_compact(&self) -> bool {
        self.utilization_pct >= self.trigger_threshold
    }

    /// Whether the post-tool threshold fires (inclusive).
    #[must_use]
    pub fn should_compact_post_tool(&self) -> bool {
        self.utilization_pct >= self.post_tool_threshold
    }

    /// Diagnostic: utilization at or above 90 % of the window.
    #[must_use]
    pub fn near_limit(&self) -> bool {
        self.utilization_pct >= 90.0
    }

    /// Whether the hard budget is violated (`tokens_used > max_tokens`).
    #[must_use]
    pub fn over_budget(&self) -> bool {
        self.tokens_used > self.max_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_comparison_is_inclusive() {
        let metrics = ContextMetrics::from_tokens(850, 1000, 0.85, 0.70);
        assert!((metrics.utilization_pct - 85.0).abs() < f64::EPSILON);
        assert!(metrics.should_compact());
        assert!(metrics.should_compact_post_tool());
    }

    #[test]
    fn below_threshold_does_not_trigger() {
        let metrics = ContextMetrics::from_tokens(849, 1000, 0.85, 0.70);
        assert!(!metrics.should_compact());
    }

    #[test]
    fn near_limit_at_ninety_percent() {
        assert!(ContextMetrics::from_tokens(900, 1000, 0.85, 0.70).near_limit());
        assert!(!ContextMetrics::from_tokens(899, 1000, 0.85, 0.70).near_limit());
    }

    #[test]
    fn zero_window_yields_zero_utilization() {
        let metrics = ContextMetrics::from_tokens(0, 0, 0.85, 0.70);
        assert_eq!(metrics.utilization_pct, 0.0);
        assert!(!metrics.should_compact());
    }
}
