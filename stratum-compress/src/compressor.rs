//! The compressor: strategy selection, execution, and acceptance policy.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::sync::Semaphore;

use stratum_context::{ContextConfig, ContextMetrics, TokenCounter};
use stratum_types::{
    meta, CompletionRequest, CompletionResponse, CompressionError, CompressionRecord,
    CompressionStrategy, Message, Provider, ProviderError,
};

use crate::cache::{CachedCompression, CompressionCache};
use crate::limiter::{RateLimitConfig, RateLimiter};
use crate::llm::{fallback_summary, CompressionKind, LlmCompressor};
use crate::selective::SelectiveCompressor;

/// Target reduction requested from the LLM summariser, percent.
const TARGET_REDUCTION_PCT: f64 = 60.0;

/// Concurrent LLM compressions allowed across sessions.
const MAX_PARALLEL_COMPRESSIONS: usize = 3;

/// Time-to-live for cached compression results.
const CACHE_TTL: Duration = Duration::from_secs(3_600);

/// A provider that refuses every call. Used as the type parameter of a
/// selective-only [`Compressor`].
pub struct NullModel;

impl Provider for NullModel {
    fn complete(
        &self,
        _request: CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, ProviderError>> + Send {
        async {
            Err(ProviderError::InvalidRequest(
                "no compression model configured".to_string(),
            ))
        }
    }
}

/// The result of one compression attempt.
///
/// Never an error: failures come back as the original messages with
/// `changed == false` and a reason string.
#[derive(Debug, Clone)]
pub struct CompressionOutcome {
    /// The (possibly replaced) message list.
    pub messages: Vec<Message>,
    /// Whether `messages` differs from the input.
    pub changed: bool,
    /// The strategy that ran, if any.
    pub strategy: Option<CompressionStrategy>,
    /// `applied`, `nothing_to_compress`, `insufficient_reduction`,
    /// `timeout`, or `error: …`.
    pub reason: String,
    /// History record for an applied compression.
    pub record: Option<CompressionRecord>,
}

impl CompressionOutcome {
    fn unchanged(messages: &[Message], reason: impl Into<String>) -> Self {
        Self {
            messages: messages.to_vec(),
            changed: false,
            strategy: None,
            reason: reason.into(),
            record: None,
        }
    }
}

/// Executes compressions under the configured policy.
///
/// Shared across sessions behind an `Arc`; the semaphore bounds parallel
/// LLM summarisation and the rate limiter bounds its QPS. Every strategy is
/// wrapped in the configured timeout, and no failure crosses this boundary
/// as `Err`.
pub struct Compressor<P: Provider> {
    config: ContextConfig,
    counter: TokenCounter,
    selective: SelectiveCompressor,
    llm: Option<LlmCompressor<P>>,
    limiter: Mutex<RateLimiter>,
    semaphore: Arc<Semaphore>,
    cache: Mutex<CompressionCache>,
}

impl Compressor<NullModel> {
    /// A compressor without an LLM path: selective strategy only.
    #[must_use]
    pub fn selective_only(config: ContextConfig) -> Self {
        Self::build(config, None)
    }
}

impl<P: Provider> Compressor<P> {
    /// A compressor with the full strategy set.
    #[must_use]
    pub fn new(config: ContextConfig, llm: LlmCompressor<P>) -> Self {
        Self::build(config, Some(llm))
    }

    fn build(config: ContextConfig, llm: Option<LlmCompressor<P>>) -> Self {
        let limiter = RateLimiter::new(RateLimitConfig {
            requests_per_minute: config.rate_limit_per_minute,
            requests_per_hour: config.rate_limit_per_hour,
            ..Default::default()
        });
        Self {
            selective: SelectiveCompressor::new(
                config.preserve_last_n_messages,
                config.archive_thresholds,
            ),
            counter: TokenCounter::new(),
            limiter: Mutex::new(limiter),
            semaphore: Arc::new(Semaphore::new(MAX_PARALLEL_COMPRESSIONS)),
            cache: Mutex::new(CompressionCache::new(16, CACHE_TTL)),
            llm,
            config,
        }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Compress a message list.
    ///
    /// Selects a strategy from the metrics and content profile, runs it under
    /// the configured timeout, and accepts the result only when it reduces
    /// the token count by at least `min_reduction_threshold`. On any failure
    /// the input comes back unchanged with a reason.
    pub async fn compress(
        &self,
        messages: &[Message],
        metrics: &ContextMetrics,
        model: &str,
    ) -> CompressionOutcome {
        if messages.len() <= 1 {
            return CompressionOutcome::unchanged(messages, "nothing_to_compress");
        }

        let key = CompressionCache::key(messages);
        if let Some(hit) = self.cache.lock().unwrap_or_else(|e| e.into_inner()).get(key).cloned() {
            tracing::debug!(key, "compression cache hit");
            return self.accept(messages, hit.messages, hit.strategy, model);
        }

        let strategy = self.select_strategy(metrics, messages);
        tracing::info!(
            strategy = strategy.name(),
            utilization_pct = format!("{:.1}", metrics.utilization_pct),
            messages = messages.len(),
            "compression starting"
        );

        let timeout = Duration::from_secs_f64(self.config.compression_timeout_seconds);
        let attempt = tokio::time::timeout(timeout, self.run_strategy(strategy, messages, model));

        let (candidate, ran_strategy) = match attempt.await {
            Ok(Ok(candidate)) => (candidate, strategy),
            Ok(Err(error)) => {
                tracing::warn!(%error, strategy = strategy.name(), "compression strategy failed");
                if self.config.enable_fallback && strategy != CompressionStrategy::Selective {
                    (
                        self.fallback_compress(messages),
                        CompressionStrategy::FallbackTemplate,
                    )
                } else {
                    return CompressionOutcome::unchanged(messages, format!("error: {error}"));
                }
            }
            Err(_elapsed) => {
                tracing::warn!(strategy = strategy.name(), ?timeout, "compression timed out");
                if self.config.enable_fallback && strategy != CompressionStrategy::Selective {
                    (
                        self.fallback_compress(messages),
                        CompressionStrategy::FallbackTemplate,
                    )
                } else {
                    return CompressionOutcome::unchanged(messages, "timeout");
                }
            }
        };

        let outcome = self.accept(messages, candidate, ran_strategy, model);
        if outcome.changed {
            let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            cache.put(
                key,
                CachedCompression {
                    messages: outcome.messages.clone(),
                    strategy: ran_strategy,
                    reduction_pct: outcome.record.as_ref().map_or(0.0, |r| r.reduction_pct),
                },
            );
        }
        outcome
    }

    /// Measure a candidate and decide acceptance.
    fn accept(
        &self,
        input: &[Message],
        candidate: Vec<Message>,
        strategy: CompressionStrategy,
        model: &str,
    ) -> CompressionOutcome {
        if candidate == input {
            return CompressionOutcome::unchanged(input, "insufficient_reduction");
        }
        let tokens_before = self.counter.estimate_messages(input, model);
        let tokens_after = self.counter.estimate_messages(&candidate, model);
        let reduction_pct = if tokens_before > 0 {
            (tokens_before.saturating_sub(tokens_after)) as f64 / tokens_before as f64 * 100.0
        } else {
            0.0
        };

        if reduction_pct < self.config.min_reduction_threshold * 100.0 {
            tracing::info!(
                reduction_pct = format!("{reduction_pct:.1}"),
                required = self.config.min_reduction_threshold * 100.0,
                "compression rejected: insufficient reduction"
            );
            return CompressionOutcome::unchanged(input, "insufficient_reduction");
        }

        let record = CompressionRecord {
            strategy,
            original_count: input.len(),
            compressed_count: candidate.len(),
            tokens_before,
            tokens_after,
            reduction_pct,
            compressed_at: Utc::now(),
        };
        tracing::info!(
            strategy = strategy.name(),
            tokens_before,
            tokens_after,
            reduction_pct = format!("{reduction_pct:.1}"),
            "compression applied"
        );
        CompressionOutcome {
            messages: candidate,
            changed: true,
            strategy: Some(strategy),
            reason: "applied".to_string(),
            record: Some(record),
        }
    }

    fn select_strategy(&self, metrics: &ContextMetrics, messages: &[Message]) -> CompressionStrategy {
        if self.llm.is_none() {
            return CompressionStrategy::Selective;
        }
        if metrics.utilization_pct >= self.config.force_llm_threshold * 100.0 {
            return CompressionStrategy::LlmSummarize;
        }
        if CompressionKind::is_semantically_rich(messages)
            && !self.noise_dominated(messages)
        {
            return CompressionStrategy::Hybrid;
        }
        CompressionStrategy::Selective
    }

    /// Whether structured tool noise dominates the conversation, making LLM
    /// summarisation a poor fit.
    fn noise_dominated(&self, messages: &[Message]) -> bool {
        let tool_like = messages
            .iter()
            .filter(|m| m.role == stratum_types::Role::Tool)
            .count();
        let ratio = tool_like as f64 / messages.len().max(1) as f64;
        ratio >= self.config.mcp_noise_threshold
    }

    async fn run_strategy(
        &self,
        strategy: CompressionStrategy,
        messages: &[Message],
        model: &str,
    ) -> Result<Vec<Message>, CompressionError> {
        match strategy {
            CompressionStrategy::Selective => Ok(self.selective.compress(messages).0),
            CompressionStrategy::LlmSummarize => self.llm_compress(messages).await,
            CompressionStrategy::Hybrid => {
                let (first_pass, _) = self.selective.compress(messages);
                let still_over = {
                    let tokens = self.counter.estimate_messages(&first_pass, model);
                    let metrics = ContextMetrics::from_tokens(
                        tokens,
                        self.config.max_context_window,
                        self.config.trigger_threshold,
                        self.config.post_tool_threshold,
                    );
                    metrics.should_compact()
                };
                if still_over {
                    self.llm_compress(&first_pass).await
                } else {
                    Ok(first_pass)
                }
            }
            CompressionStrategy::FallbackTemplate => Ok(self.fallback_compress(messages)),
        }
    }

    /// The LLM path: rate-limited, semaphore-bounded summarisation of every
    /// compressible message into one summary, preserving the rest in order.
    async fn llm_compress(&self, messages: &[Message]) -> Result<Vec<Message>, CompressionError> {
        let Some(llm) = &self.llm else {
            return Err(CompressionError::Failed(
                "no compression model configured".to_string(),
            ));
        };

        let (compressible, first_index) = self.partition(messages);
        if compressible.len() < 2 {
            return Ok(messages.to_vec());
        }

        {
            let mut limiter = self.limiter.lock().unwrap_or_else(|e| e.into_inner());
            if let Err(wait) = limiter.try_acquire() {
                return Err(CompressionError::RateLimited(wait));
            }
        }

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| CompressionError::Failed("semaphore closed".to_string()))?;

        let kind = CompressionKind::detect(&compressible);
        let result = llm
            .summarize(&compressible, kind, TARGET_REDUCTION_PCT)
            .await;

        let summary_text = {
            let mut limiter = self.limiter.lock().unwrap_or_else(|e| e.into_inner());
            match &result {
                Ok(_) => limiter.record_success(),
                Err(_) => limiter.record_error(),
            }
            if self.config.auto_tuning_enabled {
                limiter.auto_tune();
            }
            result?
        };

        let summary = Message::system(summary_text)
            .with_metadata(meta::TYPE, meta::COMPRESSION_SUMMARY.into())
            .with_metadata(meta::ORIGINAL_COUNT, json!(compressible.len()))
            .with_metadata(meta::COMPRESSED_AT, json!(Utc::now().to_rfc3339()));

        Ok(self.rebuild(messages, summary, first_index))
    }

    /// Deterministic template path used after LLM failures.
    fn fallback_compress(&self, messages: &[Message]) -> Vec<Message> {
        let (compressible, first_index) = self.partition(messages);
        if compressible.len() < 2 {
            return messages.to_vec();
        }
        let text = fallback_summary(&compressible, self.config.preserve_last_n_messages);
        let summary = Message::system(text)
            .with_metadata(meta::TYPE, meta::COMPRESSION_SUMMARY.into())
            .with_metadata(meta::ORIGINAL_COUNT, json!(compressible.len()))
            .with_metadata(meta::COMPRESSED_AT, json!(Utc::now().to_rfc3339()));
        self.rebuild(messages, summary, first_index)
    }

    /// Split messages into (compressible, index of the first compressible).
    fn partition(&self, messages: &[Message]) -> (Vec<Message>, usize) {
        let total = messages.len();
        let rules = self.selective.rules();
        let mut compressible = Vec::new();
        let mut first_index = 0;
        for (index, message) in messages.iter().enumerate() {
            if !rules.should_preserve(message, index, total) {
                if compressible.is_empty() {
                    first_index = index;
                }
                compressible.push(message.clone());
            }
        }
        (compressible, first_index)
    }

    /// Reassemble: preserved messages in order, with the summary standing in
    /// at the position of the first compressed message.
    fn rebuild(&self, messages: &[Message], summary: Message, first_index: usize) -> Vec<Message> {
        let total = messages.len();
        let rules = self.selective.rules();
        let mut out = Vec::with_capacity(total);
        for (index, message) in messages.iter().enumerate() {
            if rules.should_preserve(message, index, total) {
                out.push(message.clone());
            } else if index == first_index {
                out.push(summary.clone());
            }
        }
        out
    }
}
