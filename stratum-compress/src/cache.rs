//! Bounded in-memory cache for compression results.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use stratum_types::{CompressionStrategy, Message};

/// A cached compression result.
#[derive(Debug, Clone)]
pub struct CachedCompression {
    /// The replacement message list.
    pub messages: Vec<Message>,
    /// The strategy that produced it.
    pub strategy: CompressionStrategy,
    /// Measured reduction percentage.
    pub reduction_pct: f64,
}

struct Entry {
    at: Instant,
    value: CachedCompression,
}

/// LRU-ish cache keyed by a structural hash of the input messages.
///
/// Avoids re-running an identical compression when the same oversized
/// conversation is checked twice in quick succession (e.g. a post-tool and a
/// pre-model trigger in the same iteration).
pub struct CompressionCache {
    entries: HashMap<u64, Entry>,
    cap: usize,
    ttl: Duration,
}

impl CompressionCache {
    /// Create a cache holding at most `cap` entries for `ttl` each.
    #[must_use]
    pub fn new(cap: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            cap,
            ttl,
        }
    }

    /// Structural hash of a message list.
    #[must_use]
    pub fn key(messages: &[Message]) -> u64 {
        let mut hasher = DefaultHasher::new();
        messages.len().hash(&mut hasher);
        for message in messages {
            message.content.hash(&mut hasher);
            message.tool_call_id.hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Look up a fresh entry.
    #[must_use]
    pub fn get(&self, key: u64) -> Option<&CachedCompression> {
        self.entries
            .get(&key)
            .filter(|entry| entry.at.elapsed() < self.ttl)
            .map(|entry| &entry.value)
    }

    /// Insert an entry, evicting the oldest when over capacity.
    pub fn put(&mut self, key: u64, value: CachedCompression) {
        if self.entries.len() >= self.cap && !self.entries.contains_key(&key) {
            if let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.at)
                .map(|(k, _)| *k)
            {
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(
            key,
            Entry {
                at: Instant::now(),
                value,
            },
        );
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
