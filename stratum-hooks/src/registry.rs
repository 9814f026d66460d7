//! Priority-ordered hook registry and dispatch.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use stratum_state::StateUpdate;

use crate::hook::{Hook, HookContext, HookKind, HookOutcome};

/// Per-hook execution statistics.
#[derive(Debug, Clone, Default)]
pub struct HookStats {
    /// Times the hook ran.
    pub runs: u64,
    /// Times it returned an error (swallowed, counted here).
    pub failures: u64,
    /// The most recent error string.
    pub last_error: Option<String>,
}

/// The merged result of one dispatch over a hook chain.
#[derive(Debug, Clone, Default)]
pub struct DispatchSummary {
    /// Combined state delta, highest-priority hook winning conflicts.
    pub update: Option<StateUpdate>,
    /// First fatal escalation raised, if any.
    pub fatal: Option<String>,
    /// Whether any hook applied a compression.
    pub compressed: bool,
}

/// Holds hooks sorted by ascending priority within each kind.
///
/// Dispatch runs every matching hook in priority order. A hook error is
/// recorded in its stats and the chain continues; the failed hook counts as
/// a no-op.
#[derive(Default)]
pub struct HookRegistry {
    hooks: Vec<Arc<dyn Hook>>,
    stats: Mutex<HashMap<String, HookStats>>,
}

impl HookRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook. Hooks are kept sorted by priority; registration
    /// order breaks ties.
    pub fn register(&mut self, hook: Arc<dyn Hook>) {
        self.hooks.push(hook);
        self.hooks.sort_by_key(|h| h.priority());
    }

    /// Number of registered hooks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Statistics for a hook by name.
    #[must_use]
    pub fn stats(&self, name: &str) -> Option<HookStats> {
        self.stats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    /// Run every hook registered for `ctx.kind`, in ascending priority.
    ///
    /// Deltas are combined so that the highest-priority hook's writes win
    /// conflicts. The first fatal flag is kept; later hooks still run (their
    /// stats matter), but their deltas cannot clear a fatal.
    pub async fn dispatch(&self, ctx: &HookContext<'_>) -> DispatchSummary {
        let mut outcomes: Vec<HookOutcome> = Vec::new();
        let mut summary = DispatchSummary::default();

        for hook in self
            .hooks
            .iter()
            .filter(|h| h.kinds().contains(&ctx.kind))
        {
            let name = hook.name().to_string();
            let result = hook.on_event(ctx).await;
            let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
            let entry = stats.entry(name.clone()).or_default();
            entry.runs += 1;
            match result {
                Ok(Some(outcome)) => {
                    if summary.fatal.is_none() {
                        summary.fatal = outcome.flags.fatal.clone();
                    }
                    summary.compressed |= outcome.flags.compressed;
                    outcomes.push(outcome);
                }
                Ok(None) => {}
                Err(error) => {
                    entry.failures += 1;
                    entry.last_error = Some(error.to_string());
                    tracing::warn!(hook = %name, %error, "hook failed; continuing chain");
                }
            }
        }

        // Fold from lowest to highest priority so the highest-priority delta
        // merges last and wins conflicts.
        let mut combined = StateUpdate::default();
        let mut any = false;
        for outcome in outcomes.into_iter().rev() {
            if let Some(update) = outcome.update {
                combined.merge(update);
                any = true;
            }
        }
        if any {
            summary.update = Some(combined);
        }
        summary
    }
}
