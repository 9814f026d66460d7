//! Runtime configuration and its validation rules.

use serde::{Deserialize, Serialize};
use stratum_types::ConfigError;

/// Character-count thresholds for the oversized-tool-output archive protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveThresholds {
    /// At or above this size a soft "suggested" archive marker is emitted.
    pub large: usize,
    /// At or above this size the content is rewritten to an immediate
    /// archive marker.
    pub huge: usize,
}

impl Default for ArchiveThresholds {
    fn default() -> Self {
        Self {
            large: 3_000,
            huge: 5_000,
        }
    }
}

/// Configuration for the context manager, compressor, and hook pipeline.
///
/// Thresholds are fractions of `max_context_window` in the open interval
/// (0, 1). [`ContextConfig::validate`] rejects out-of-range values and logs
/// warnings for accepted-but-suspect combinations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Context window in tokens.
    pub max_context_window: usize,
    /// Standard compression trigger, fraction of the window.
    pub trigger_threshold: f64,
    /// Post-tool compression trigger, fraction of the window. Normally below
    /// `trigger_threshold` to catch rapid growth between model calls.
    pub post_tool_threshold: f64,
    /// Above this utilization the LLM strategy is forced regardless of
    /// content profile.
    pub force_llm_threshold: f64,
    /// Fraction of tool-noise vocabulary above which LLM summarisation is
    /// avoided in favour of selective compression.
    pub mcp_noise_threshold: f64,
    /// How many trailing messages every compression preserves verbatim.
    pub preserve_last_n_messages: usize,
    /// Wall-clock budget for one compression attempt, seconds.
    pub compression_timeout_seconds: f64,
    /// Whether a failed LLM compression falls back to the template summary.
    pub enable_fallback: bool,
    /// Minimum reduction (fraction) for an LLM compression to be accepted.
    pub min_reduction_threshold: f64,
    /// How long a cached context analysis stays fresh, seconds.
    pub analysis_cache_duration_seconds: f64,
    /// Whether the compressor's rate limiter adjusts its ceiling from
    /// observed error rates.
    pub auto_tuning_enabled: bool,
    /// Compression LLM calls allowed per minute.
    pub rate_limit_per_minute: u32,
    /// Compression LLM calls allowed per hour.
    pub rate_limit_per_hour: u32,
    /// Archive marker size thresholds.
    pub archive_thresholds: ArchiveThresholds,
    /// Minimum wall time between two compression-hook firings, seconds.
    pub hook_cooldown_seconds: f64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_context_window: 50_000,
            trigger_threshold: 0.85,
            post_tool_threshold: 0.70,
            force_llm_threshold: 0.90,
            mcp_noise_threshold: 0.60,
            preserve_last_n_messages: 5,
            compression_timeout_seconds: 30.0,
            enable_fallback: true,
            min_reduction_threshold: 0.30,
            analysis_cache_duration_seconds: 60.0,
            auto_tuning_enabled: true,
            rate_limit_per_minute: 10,
            rate_limit_per_hour: 100,
            archive_thresholds: ArchiveThresholds::default(),
            hook_cooldown_seconds: 60.0,
        }
    }
}

impl ContextConfig {
    /// A profile sized for large context windows.
    #[must_use]
    pub fn large_window() -> Self {
        Self {
            max_context_window: 200_000,
            ..Self::default()
        }
    }

    /// Validate the configuration.
    ///
    /// Thresholds at or outside (0, 1) and non-positive sizes are rejected.
    /// Suspect-but-legal combinations (a post-tool threshold at or above the
    /// standard trigger, a force-LLM threshold below the trigger) are
    /// accepted with a warning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("trigger_threshold", self.trigger_threshold),
            ("post_tool_threshold", self.post_tool_threshold),
            ("force_llm_threshold", self.force_llm_threshold),
            ("mcp_noise_threshold", self.mcp_noise_threshold),
            ("min_reduction_threshold", self.min_reduction_threshold),
        ] {
            if value <= 0.0 || value >= 1.0 {
                return Err(ConfigError::ThresholdOutOfRange { name, value });
            }
        }
        if self.max_context_window == 0 {
            return Err(ConfigError::NotPositive {
                name: "max_context_window",
                value: 0,
            });
        }
        if self.rate_limit_per_minute == 0 {
            return Err(ConfigError::NotPositive {
                name: "rate_limit_per_minute",
                value: 0,
            });
        }
        if self.rate_limit_per_hour == 0 {
            return Err(ConfigError::NotPositive {
                name: "rate_limit_per_hour",
                value: 0,
            });
        }
        if self.compression_timeout_seconds <= 0.0 {
            return Err(ConfigError::NotPositive {
                name: "compression_timeout_seconds",
                value: self.compression_timeout_seconds as i64,
            });
        }

        if self.post_tool_threshold >= self.trigger_threshold {
            tracing::warn!(
                post_tool_threshold = self.post_tool_threshold,
                trigger_threshold = self.trigger_threshold,
                "post_tool_threshold at or above trigger_threshold; post-tool checks will never fire first"
            );
        }
        if self.force_llm_threshold < self.trigger_threshold {
            tracing::warn!(
                force_llm_threshold = self.force_llm_threshold,
                trigger_threshold = self.trigger_threshold,
                "force_llm_threshold below trigger_threshold; LLM strategy will always be forced"
            );
        }
        if self.archive_thresholds.large >= self.archive_thresholds.huge {
            tracing::warn!(
                large = self.archive_thresholds.large,
                huge = self.archive_thresholds.huge,
                "archive large threshold at or above huge threshold"
            );
        }
        Ok(())
    }
}
