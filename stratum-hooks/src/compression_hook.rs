//! The built-in compression hook.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use stratum_compress::Compressor;
use stratum_context::{CompactTrigger, ContextManager};
use stratum_state::StateUpdate;
use stratum_types::{HookError, Provider};

use crate::hook::{Hook, HookContext, HookFlags, HookKind, HookOutcome};

/// Pre-step and post-tool hook that keeps the conversation inside the token
/// budget.
///
/// Consults the [`ContextManager`] at each firing point and, when a
/// threshold fires, runs the [`Compressor`] and returns the replaced message
/// list as a replace-all state delta. A cooldown (wall time between applied
/// compressions) prevents thrashing when utilization hovers at the trigger.
pub struct CompressionHook<P: Provider> {
    manager: Arc<ContextManager>,
    compressor: Arc<Compressor<P>>,
    model: String,
    last_applied: Mutex<Option<Instant>>,
}

impl<P: Provider> CompressionHook<P> {
    /// Create the hook over shared manager and compressor handles.
    #[must_use]
    pub fn new(
        manager: Arc<ContextManager>,
        compressor: Arc<Compressor<P>>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            manager,
            compressor,
            model: model.into(),
            last_applied: Mutex::new(None),
        }
    }

    fn in_cooldown(&self) -> bool {
        let cooldown =
            Duration::from_secs_f64(self.manager.config().hook_cooldown_seconds);
        self.last_applied
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some_and(|at| at.elapsed() < cooldown)
    }

    fn mark_applied(&self) {
        *self
            .last_applied
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
    }
}

#[async_trait]
impl<P: Provider + 'static> Hook for CompressionHook<P> {
    fn name(&self) -> &str {
        "compression"
    }

    fn kinds(&self) -> &[HookKind] {
        &[HookKind::PreStep, HookKind::PostTool]
    }

    fn priority(&self) -> u8 {
        10
    }

    async fn on_event(&self, ctx: &HookContext<'_>) -> Result<Option<HookOutcome>, HookError> {
        let trigger = match ctx.kind {
            HookKind::PreStep => CompactTrigger::ContextSize,
            HookKind::PostTool => CompactTrigger::PostTool,
            _ => return Ok(None),
        };

        if self.in_cooldown() {
            tracing::debug!("compression hook in cooldown");
            return Ok(None);
        }

        let messages = &ctx.state.messages;
        let (fire, metrics) = self
            .manager
            .should_compact(messages, trigger, &self.model, &[]);
        if !fire {
            return Ok(None);
        }

        let outcome = self
            .compressor
            .compress(messages, &metrics, &self.model)
            .await;
        if !outcome.changed {
            tracing::debug!(reason = %outcome.reason, "compression declined");
            return Ok(None);
        }

        self.mark_applied();
        let mut update = StateUpdate::replace_messages(outcome.messages);
        if let Some(record) = outcome.record {
            update.compression_records.push(record);
        }
        Ok(Some(HookOutcome {
            update: Some(update),
            flags: HookFlags {
                fatal: None,
                compressed: true,
            },
        }))
    }
}
