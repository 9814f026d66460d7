#![deny(missing_docs)]
//! Context compression for stratum.
//!
//! The [`Compressor`] takes a message list that the context manager flagged
//! as too large and produces a shorter one, preserving the elements the
//! runtime can never lose: system messages, todo-carrying messages, and the
//! last N messages verbatim. Three strategies are available (rule-based
//! [`selective`] partitioning, LLM summarisation, and a hybrid of the two)
//! with a deterministic template fallback when the LLM path fails.
//!
//! Oversized tool output is handled separately by the [`archive`] protocol:
//! the message is rewritten into a marker that instructs the agent to move
//! the content into the virtual file system.
//!
//! LLM summarisation calls are bounded by a [`limiter::RateLimiter`]
//! (sliding windows + exponential backoff) and a concurrency semaphore.

pub mod archive;
pub mod cache;
pub mod compressor;
pub mod limiter;
pub mod llm;
pub mod selective;

pub use archive::{ArchiveAnalysis, ArchiveUrgency};
pub use compressor::{CompressionOutcome, Compressor, NullModel};
pub use limiter::{RateLimitConfig, RateLimiter};
pub use llm::{CompressionKind, LlmCompressor};
pub use selective::SelectiveCompressor;
