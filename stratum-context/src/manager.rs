//! The context manager: analysis entry point with a bounded recency cache.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use stratum_types::{Message, ToolDefinition};

use crate::config::ContextConfig;
use crate::counter::TokenCounter;
use crate::metrics::{CompactTrigger, ContextMetrics};

/// Maximum number of cached analyses.
const CACHE_CAP: usize = 10;

struct CacheEntry {
    key: u64,
    at: Instant,
    metrics: ContextMetrics,
}

/// Analyses conversations against the configured thresholds.
///
/// Results are cached for `analysis_cache_duration_seconds`, keyed by a
/// structural hash of the messages, model id, and tool set, so repeated
/// checks within one loop iteration are O(1). The cache is bounded and
/// oldest-evicted; the mutex guarding it is held only for O(1) operations
/// plus the eviction scan over at most [`CACHE_CAP`] entries.
pub struct ContextManager {
    config: ContextConfig,
    counter: TokenCounter,
    cache: Mutex<Vec<CacheEntry>>,
}

impl ContextManager {
    /// Create a manager with the default [`TokenCounter`].
    #[must_use]
    pub fn new(config: ContextConfig) -> Self {
        Self::with_counter(config, TokenCounter::new())
    }

    /// Create a manager with a custom counter.
    #[must_use]
    pub fn with_counter(config: ContextConfig, counter: TokenCounter) -> Self {
        Self {
            config,
            counter,
            cache: Mutex::new(Vec::new()),
        }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// The token counter in use.
    #[must_use]
    pub fn counter(&self) -> &TokenCounter {
        &self.counter
    }

    /// Analyse a conversation, returning utilization metrics.
    ///
    /// Deterministic: identical input returns identical metrics, whether
    /// served from cache or recomputed. An empty message list reports zero
    /// tokens without touching the cache.
    pub fn analyze(
        &self,
        messages: &[Message],
        model: &str,
        tools: &[ToolDefinition],
    ) -> ContextMetrics {
        if messages.is_empty() {
            return ContextMetrics::from_tokens(
                0,
                self.config.max_context_window,
                self.config.trigger_threshold,
                self.config.post_tool_threshold,
            );
        }

        let key = structural_hash(messages, model, tools);
        let ttl = Duration::from_secs_f64(self.config.analysis_cache_duration_seconds);

        if let Some(metrics) = self.cache_lookup(key, ttl) {
            tracing::debug!(key, "analysis cache hit");
            return metrics;
        }

        let tokens = self.counter.estimate_messages(messages, model)
            + self.counter.estimate_tools(tools);
        let metrics = ContextMetrics::from_tokens(
            tokens,
            self.config.max_context_window,
            self.config.trigger_threshold,
            self.config.post_tool_threshold,
        );

        tracing::info!(
            messages = messages.len(),
            tokens,
            utilization_pct = format!("{:.1}", metrics.utilization_pct),
            "context analysis"
        );

        self.cache_insert(key, metrics);
        metrics
    }

    /// Whether compression should run now, and why.
    pub fn should_compact(
        &self,
        messages: &[Message],
        trigger: CompactTrigger,
        model: &str,
        tools: &[ToolDefinition],
    ) -> (bool, ContextMetrics) {
        let metrics = self.analyze(messages, model, tools);
        let fire = match trigger {
            CompactTrigger::PostTool => metrics.should_compact_post_tool(),
            CompactTrigger::ContextSize => metrics.should_compact(),
            CompactTrigger::Manual => true,
        };
        if fire {
            tracing::info!(
                ?trigger,
                utilization_pct = format!("{:.1}", metrics.utilization_pct),
                threshold = format!("{:.1}", metrics.trigger_threshold),
                "compression triggered"
            );
        }
        (fire, metrics)
    }

    fn cache_lookup(&self, key: u64, ttl: Duration) -> Option<ContextMetrics> {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache
            .iter()
            .find(|entry| entry.key == key && entry.at.elapsed() < ttl)
            .map(|entry| entry.metrics)
    }

    fn cache_insert(&self, key: u64, metrics: ContextMetrics) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.retain(|entry| entry.key != key);
        if cache.len() >= CACHE_CAP {
            // Evict the oldest entry.
            if let Some(oldest) = cache
                .iter()
                .enumerate()
                .min_by_key(|(_, entry)| entry.at)
                .map(|(i, _)| i)
            {
                cache.remove(oldest);
            }
        }
        cache.push(CacheEntry {
            key,
            at: Instant::now(),
            metrics,
        });
    }
}

/// Structural hash over everything that influences a token count.
fn structural_hash(messages: &[Message], model: &str, tools: &[ToolDefinition]) -> u64 {
    let mut hasher = DefaultHasher::new();
    model.hash(&mut hasher);
    messages.len().hash(&mut hasher);
    for message in messages {
        message.content.hash(&mut hasher);
        message.name.hash(&mut hasher);
        message.tool_call_id.hash(&mut hasher);
        for call in &message.tool_calls {
            call.id.hash(&mut hasher);
            call.name.hash(&mut hasher);
            call.arguments.to_string().hash(&mut hasher);
        }
    }
    for tool in tools {
        tool.name.hash(&mut hasher);
    }
    hasher.finish()
}
