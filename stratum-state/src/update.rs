//! State updates and the reducer that applies them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use stratum_types::{meta, CompressionRecord, Message, Plan, Todo};

use crate::state::AgentState;

/// A delta to apply to an [`AgentState`].
///
/// Hooks and tools return these instead of mutating state directly; the loop
/// merges them through [`reduce`]. The message list follows the append/replace
/// contract: updates append, except when the first element is the replace-all
/// sentinel produced by [`StateUpdate::replace_messages`], in which case the
/// remainder becomes the new list. No caller hand-crafts the sentinel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    /// Messages to append (or, with a leading sentinel, to replace with).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,
    /// Todo list replacement. Todos are owned wholesale by their writer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub todos: Option<Vec<Todo>>,
    /// Virtual-file writes, merged last-write-wins per path.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub files: BTreeMap<String, String>,
    /// Plans to merge into `pending_plans`, deduplicated by id.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_plans: Vec<Plan>,
    /// Replacement for the approved plan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_plan: Option<Plan>,
    /// Compression records to append to the bounded history.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compression_records: Vec<CompressionRecord>,
}

impl StateUpdate {
    /// An update that appends the given messages.
    #[must_use]
    pub fn append_messages(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    /// An update that replaces the whole message list.
    ///
    /// Prepends the replace-all sentinel consumed by [`reduce`].
    #[must_use]
    pub fn replace_messages(messages: Vec<Message>) -> Self {
        let mut with_sentinel = Vec::with_capacity(messages.len() + 1);
        with_sentinel
            .push(Message::system("").with_metadata(meta::TYPE, meta::REPLACE_ALL.into()));
        with_sentinel.extend(messages);
        Self {
            messages: with_sentinel,
            ..Default::default()
        }
    }

    /// An update that writes one virtual file.
    #[must_use]
    pub fn write_file(path: impl Into<String>, content: impl Into<String>) -> Self {
        let mut files = BTreeMap::new();
        files.insert(path.into(), content.into());
        Self {
            files,
            ..Default::default()
        }
    }

    /// Whether this update changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
            && self.todos.is_none()
            && self.files.is_empty()
            && self.pending_plans.is_empty()
            && self.approved_plan.is_none()
            && self.compression_records.is_empty()
    }

    /// Merge another update into this one, the other side winning conflicts.
    pub fn merge(&mut self, other: StateUpdate) {
        // A replace-all in either side turns the combination into a replace.
        let other_replaces = other
            .messages
            .first()
            .is_some_and(|m| m.metadata_str(meta::TYPE) == Some(meta::REPLACE_ALL));
        if other_replaces {
            self.messages = other.messages;
        } else {
            self.messages.extend(other.messages);
        }
        if other.todos.is_some() {
            self.todos = other.todos;
        }
        self.files.extend(other.files);
        self.pending_plans.extend(other.pending_plans);
        if other.approved_plan.is_some() {
            self.approved_plan = other.approved_plan;
        }
        self.compression_records.extend(other.compression_records);
    }
}

/// Apply an update to the state.
///
/// - `messages` append, unless led by the replace-all sentinel, which is
///   stripped and the remainder becomes the new list;
/// - `files` merge last-write-wins per path;
/// - `pending_plans` merge deduplicating by plan id, last write wins;
/// - `todos` and `approved_plan` replace wholesale when present.
pub fn reduce(state: &mut AgentState, update: StateUpdate) {
    let StateUpdate {
        mut messages,
        todos,
        files,
        pending_plans,
        approved_plan,
        compression_records,
    } = update;

    let replaces = messages
        .first()
        .is_some_and(|m| m.metadata_str(meta::TYPE) == Some(meta::REPLACE_ALL));
    if replaces {
        messages.remove(0);
        tracing::debug!(
            old = state.messages.len(),
            new = messages.len(),
            "replacing message list"
        );
        state.messages = messages;
    } else {
        state.messages.extend(messages);
    }

    if let Some(todos) = todos {
        state.todos = todos;
    }

    for (path, content) in files {
        state.files.insert(path, content);
    }

    for plan in pending_plans {
        if let Some(existing) = state.pending_plans.iter_mut().find(|p| p.id == plan.id) {
            *existing = plan;
        } else {
            state.pending_plans.push(plan);
        }
    }

    if let Some(plan) = approved_plan {
        state.approved_plan = Some(plan);
    }

    for record in compression_records {
        state.push_compression_record(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_types::PlanStatus;

    #[test]
    fn plain_updates_append() {
        let mut state = AgentState::new();
        reduce(&mut state, StateUpdate::append_messages(vec![Message::user("a")]));
        reduce(&mut state, StateUpdate::append_messages(vec![Message::user("b")]));
        assert_eq!(state.messages.len(), 2);
    }

    #[test]
    fn replace_all_sentinel_replaces_and_is_stripped() {
        let mut state = AgentState::new();
        reduce(
            &mut state,
            StateUpdate::append_messages(vec![Message::user("a"), Message::user("b")]),
        );
        reduce(
            &mut state,
            StateUpdate::replace_messages(vec![Message::system("summary")]),
        );
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].content, "summary");
        assert!(state.messages[0].metadata_str(meta::TYPE).is_none());
    }

    #[test]
    fn files_merge_last_write_wins() {
        let mut state = AgentState::new();
        reduce(&mut state, StateUpdate::write_file("a.md", "one"));
        reduce(&mut state, StateUpdate::write_file("b.md", "two"));
        reduce(&mut state, StateUpdate::write_file("a.md", "three"));
        assert_eq!(state.files["a.md"], "three");
        assert_eq!(state.files["b.md"], "two");
    }

    #[test]
    fn plans_deduplicate_by_id() {
        let mut state = AgentState::new();
        let mut plan = Plan::new("documentation", "Docs", "v1", vec![]);
        reduce(
            &mut state,
            StateUpdate {
                pending_plans: vec![plan.clone()],
                ..Default::default()
            },
        );
        plan.description = "v2".into();
        plan.status = PlanStatus::Modified;
        reduce(
            &mut state,
            StateUpdate {
                pending_plans: vec![plan.clone()],
                ..Default::default()
            },
        );
        assert_eq!(state.pending_plans.len(), 1);
        assert_eq!(state.pending_plans[0].description, "v2");
    }

    #[test]
    fn merge_combines_updates_in_priority_order() {
        let mut first = StateUpdate::write_file("a.md", "first");
        let second = StateUpdate::write_file("a.md", "second");
        first.merge(second);
        assert_eq!(first.files["a.md"], "second");

        let mut appends = StateUpdate::append_messages(vec![Message::user("x")]);
        appends.merge(StateUpdate::replace_messages(vec![Message::system("s")]));
        let mut state = AgentState::new();
        reduce(&mut state, appends);
        assert_eq!(state.messages.len(), 1);
    }
}
