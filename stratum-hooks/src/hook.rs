//! The hook interface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stratum_state::{AgentState, StateUpdate};
use stratum_types::HookError;

/// Where in the loop a hook fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    /// Before the model call of an iteration.
    PreStep,
    /// After an iteration's tool round completes.
    PostStep,
    /// Before a single tool executes.
    PreTool,
    /// After a single tool executes.
    PostTool,
    /// Before a message is appended to the conversation.
    PreMessage,
    /// After a message is appended to the conversation.
    PostMessage,
    /// Before a sub-agent is spawned.
    PreSubagent,
    /// After a sub-agent completes.
    PostSubagent,
}

/// What a hook sees when it fires.
///
/// The state is a read-only snapshot; the only way a hook affects the run is
/// through the returned [`HookOutcome`].
pub struct HookContext<'a> {
    /// The firing point.
    pub kind: HookKind,
    /// Read-only view of the agent state.
    pub state: &'a AgentState,
    /// Point-specific metadata (tool name, message index, ...).
    pub metadata: serde_json::Value,
    /// When the hook fired.
    pub timestamp: DateTime<Utc>,
}

impl<'a> HookContext<'a> {
    /// Build a context for `kind` over a state snapshot.
    #[must_use]
    pub fn new(kind: HookKind, state: &'a AgentState) -> Self {
        Self {
            kind,
            state,
            metadata: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }

    /// Attach metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Outcome flags a hook may raise alongside its delta.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HookFlags {
    /// Escalate the current failure to fatal; the loop aborts.
    pub fatal: Option<String>,
    /// A compression was applied by this hook.
    pub compressed: bool,
}

/// What a hook returned. `None` from [`Hook::on_event`] means "no change".
#[derive(Debug, Clone, Default)]
pub struct HookOutcome {
    /// State delta to merge.
    pub update: Option<StateUpdate>,
    /// Outcome flags.
    pub flags: HookFlags,
}

impl HookOutcome {
    /// An outcome carrying only a state delta.
    #[must_use]
    pub fn update(update: StateUpdate) -> Self {
        Self {
            update: Some(update),
            flags: HookFlags::default(),
        }
    }

    /// An outcome escalating to fatal.
    #[must_use]
    pub fn fatal(reason: impl Into<String>) -> Self {
        Self {
            update: None,
            flags: HookFlags {
                fatal: Some(reason.into()),
                compressed: false,
            },
        }
    }
}

/// A typed, priority-ordered callback at a fixed point in the loop.
///
/// Hooks must be side-effect-free with respect to external I/O except for
/// logging; their only effect on the run is the returned outcome. An `Err`
/// is counted against the hook and treated as "no change"; it does not
/// abort the chain.
#[async_trait]
pub trait Hook: Send + Sync {
    /// Stable name, used for per-hook statistics.
    fn name(&self) -> &str;

    /// Which points this hook fires at.
    fn kinds(&self) -> &[HookKind];

    /// Execution priority: 1 is highest, 100 lowest. Defaults to 50.
    fn priority(&self) -> u8 {
        50
    }

    /// Called at each registered point.
    async fn on_event(&self, ctx: &HookContext<'_>) -> Result<Option<HookOutcome>, HookError>;
}
