//! Conversation message types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The role of a message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A human user.
    User,
    /// The AI assistant.
    Assistant,
    /// A system message (instructions, compression summaries, markers).
    System,
    /// The result of a tool invocation.
    Tool,
}

/// A tool invocation requested by the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this call. Tool result messages reference it.
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON input arguments.
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Create a tool call with a fresh v4 UUID id.
    #[must_use]
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: format!("call_{}", uuid::Uuid::new_v4().simple()),
            name: name.into(),
            arguments,
        }
    }
}

/// Well-known metadata keys and values used across the runtime.
pub mod meta {
    /// Key discriminating synthetic messages (`compression_summary`,
    /// `archive_marker`, `replace_all`).
    pub const TYPE: &str = "type";
    /// Metadata type of a compression summary message.
    pub const COMPRESSION_SUMMARY: &str = "compression_summary";
    /// Metadata type of an archive marker message.
    pub const ARCHIVE_MARKER: &str = "archive_marker";
    /// Metadata type of the reducer's replace-all sentinel.
    pub const REPLACE_ALL: &str = "replace_all";
    /// Key flagging a message that records an error.
    pub const ERROR: &str = "error";
    /// Key carrying the number of messages a summary replaced.
    pub const ORIGINAL_COUNT: &str = "original_count";
    /// Key carrying the reduction percentage achieved by a compression.
    pub const REDUCTION_PCT: &str = "reduction_pct";
    /// Key carrying the ISO-8601 timestamp of a compression.
    pub const COMPRESSED_AT: &str = "compressed_at";
}

/// A message in a conversation.
///
/// Messages are append-only from the agent's point of view; only the
/// compressor replaces runs of them, and it does so through the state
/// reducer's replace-all sentinel rather than by mutating in place.
///
/// # Example
///
/// ```
/// use stratum_types::Message;
///
/// let msg = Message::user("What does the investigation phase need?");
/// assert!(msg.tool_calls.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message author.
    pub role: Role,
    /// The textual content.
    pub content: String,
    /// Tool identifier, set on `Tool`-role messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The id of the [`ToolCall`] this message answers, set on `Tool`-role
    /// messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool invocations requested by an `Assistant`-role message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Free-form metadata. Synthetic messages use [`meta`] keys.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Message {
    fn base(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
            tool_call_id: None,
            tool_calls: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Create a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::base(Role::User, content)
    }

    /// Create an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::base(Role::Assistant, content)
    }

    /// Create a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::base(Role::System, content)
    }

    /// Create a tool result message answering `tool_call_id`.
    #[must_use]
    pub fn tool(
        name: impl Into<String>,
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let mut msg = Self::base(Role::Tool, content);
        msg.name = Some(name.into());
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }

    /// Attach tool calls (assistant messages only make sense with these).
    #[must_use]
    pub fn with_tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.tool_calls = calls;
        self
    }

    /// Set a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Read a metadata entry as a string, if present and a string.
    #[must_use]
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }

    /// Whether this message is a synthetic compression summary.
    #[must_use]
    pub fn is_compression_summary(&self) -> bool {
        self.metadata_str(meta::TYPE) == Some(meta::COMPRESSION_SUMMARY)
    }

    /// Whether this message is an archive marker.
    #[must_use]
    pub fn is_archive_marker(&self) -> bool {
        self.metadata_str(meta::TYPE) == Some(meta::ARCHIVE_MARKER)
    }

    /// Whether this message carries an error flag in its metadata.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.metadata
            .get(meta::ERROR)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Content length in characters, the unit the archive thresholds use.
    #[must_use]
    pub fn content_len(&self) -> usize {
        self.content.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_roles() {
        assert_eq!(Message::user("hi").role, Role::User);
        assert_eq!(Message::assistant("ok").role, Role::Assistant);
        assert_eq!(Message::system("rules").role, Role::System);
        let tool = Message::tool("ls", "call_1", "[]");
        assert_eq!(tool.role, Role::Tool);
        assert_eq!(tool.name.as_deref(), Some("ls"));
        assert_eq!(tool.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn metadata_roundtrips_through_json() {
        let msg = Message::system("summary")
            .with_metadata(meta::TYPE, meta::COMPRESSION_SUMMARY.into())
            .with_metadata(meta::ORIGINAL_COUNT, 12.into());
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert!(back.is_compression_summary());
        assert_eq!(back.metadata[meta::ORIGINAL_COUNT], serde_json::json!(12));
    }

    #[test]
    fn empty_fields_are_omitted() {
        let json = serde_json::to_string(&Message::user("hi")).unwrap();
        assert!(!json.contains("tool_calls"));
        assert!(!json.contains("metadata"));
        assert!(!json.contains("tool_call_id"));
    }

    #[test]
    fn tool_call_ids_are_unique() {
        let a = ToolCall::new("ls", serde_json::json!({}));
        let b = ToolCall::new("ls", serde_json::json!({}));
        assert_ne!(a.id, b.id);
    }
}
