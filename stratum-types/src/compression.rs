//! Records describing a completed compression, kept for debugging.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which compression strategy produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionStrategy {
    /// Rule-based partition-and-summarise.
    Selective,
    /// LLM summarisation of a message prefix.
    LlmSummarize,
    /// Selective first, LLM on the residue.
    Hybrid,
    /// Deterministic template summary after an LLM failure.
    FallbackTemplate,
}

impl CompressionStrategy {
    /// Stable snake_case name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            CompressionStrategy::Selective => "selective",
            CompressionStrategy::LlmSummarize => "llm_summarize",
            CompressionStrategy::Hybrid => "hybrid",
            CompressionStrategy::FallbackTemplate => "fallback_template",
        }
    }
}

/// One entry of the bounded compression history.
///
/// Carries enough metadata for a deterministic undo-for-debug: how many
/// messages went in, how many came out, the measured reduction, and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionRecord {
    /// Strategy that produced this result.
    pub strategy: CompressionStrategy,
    /// Messages before compression.
    pub original_count: usize,
    /// Messages after compression.
    pub compressed_count: usize,
    /// Estimated tokens before.
    pub tokens_before: usize,
    /// Estimated tokens after.
    pub tokens_after: usize,
    /// Token reduction as a percentage.
    pub reduction_pct: f64,
    /// When the compression ran.
    pub compressed_at: DateTime<Utc>,
}
