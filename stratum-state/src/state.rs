//! The typed agent state record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use stratum_types::{CompressionRecord, Message, PhaseState, Plan, Role, Todo};

/// How many compression records the state retains.
const COMPRESSION_HISTORY_CAP: usize = 20;

/// The complete state of one agent session.
///
/// Owned by a single session and never shared across sessions. Created empty
/// at session start, mutated only through [`crate::reduce`] and the
/// orchestrator, discarded (or persisted by the host) at session end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    /// The conversation, append-only except for compression replacement.
    pub messages: Vec<Message>,
    /// Task tracking. Never discarded by compression.
    #[serde(default)]
    pub todos: Vec<Todo>,
    /// The virtual file system: path → content. Sized in characters,
    /// otherwise opaque.
    #[serde(default)]
    pub files: BTreeMap<String, String>,
    /// Workflow position and per-phase bookkeeping.
    #[serde(default)]
    pub phase: PhaseState,
    /// Plans awaiting or returned from review, deduplicated by id.
    #[serde(default)]
    pub pending_plans: Vec<Plan>,
    /// The most recently approved plan, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_plan: Option<Plan>,
    /// Bounded history of compressions applied to this session.
    #[serde(default)]
    pub compression_history: Vec<CompressionRecord>,
    /// One-line summary written on phase advancement.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub context_summary: String,
}

impl AgentState {
    /// A fresh, empty state positioned at the first phase.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a compression record, evicting the oldest past the cap.
    pub fn push_compression_record(&mut self, record: CompressionRecord) {
        self.compression_history.push(record);
        if self.compression_history.len() > COMPRESSION_HISTORY_CAP {
            let overflow = self.compression_history.len() - COMPRESSION_HISTORY_CAP;
            self.compression_history.drain(..overflow);
        }
    }

    /// The pending plan with the given id, if present.
    #[must_use]
    pub fn pending_plan(&self, id: &str) -> Option<&Plan> {
        self.pending_plans.iter().find(|p| p.id == id)
    }

    /// Verify the tool-message linkage invariant: every `Tool`-role message
    /// references a preceding assistant message whose tool-call list contains
    /// its `tool_call_id`.
    #[must_use]
    pub fn tool_messages_linked(&self) -> bool {
        let mut seen_call_ids: Vec<&str> = Vec::new();
        for message in &self.messages {
            match message.role {
                Role::Assistant => {
                    seen_call_ids.extend(message.tool_calls.iter().map(|c| c.id.as_str()));
                }
                Role::Tool => {
                    let Some(id) = message.tool_call_id.as_deref() else {
                        return false;
                    };
                    if !seen_call_ids.contains(&id) {
                        return false;
                    }
                }
                _ => {}
            }
        }
        true
    }
}
