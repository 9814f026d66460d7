//! LLM-based conversation summarisation.

use stratum_types::{
    CompletionRequest, CompressionError, Message, Provider, Role, SystemPrompt,
};

/// Prompt profile for LLM summarisation, detected from the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionKind {
    /// Mixed conversation with no dominant profile.
    General,
    /// Dominated by structured tool output.
    McpHeavy,
    /// Dominated by source code discussion.
    Code,
    /// Dominated by planning vocabulary.
    Planning,
    /// Deep technical detail worth keeping precise.
    Technical,
}

const MCP_INDICATORS: &[&str] = &[
    "project_id",
    "entity_id",
    "repository_id",
    "tool_call",
    "rag_retrieve",
];
const CODE_INDICATORS: &[&str] = &["function", "class", "import", "fn ", "impl ", "file_path"];
const PLANNING_INDICATORS: &[&str] = &[
    "todo",
    "task",
    "plan",
    "requirement",
    "user story",
    "implementation",
];
const TECHNICAL_INDICATORS: &[&str] = &["architecture", "protocol", "schema", "invariant"];

fn score(haystack: &str, needles: &[&str]) -> usize {
    needles.iter().filter(|n| haystack.contains(*n)).count()
}

impl CompressionKind {
    /// Detect the dominant profile of a conversation.
    #[must_use]
    pub fn detect(messages: &[Message]) -> Self {
        let text: String = messages
            .iter()
            .map(|m| m.content.to_lowercase())
            .collect::<Vec<_>>()
            .join("\n");

        let mcp = score(&text, MCP_INDICATORS);
        let code = score(&text, CODE_INDICATORS);
        let planning = score(&text, PLANNING_INDICATORS);
        let technical = score(&text, TECHNICAL_INDICATORS);

        if mcp >= 5 {
            CompressionKind::McpHeavy
        } else if code >= 3 {
            CompressionKind::Code
        } else if planning >= 3 {
            CompressionKind::Planning
        } else if technical >= 3 {
            CompressionKind::Technical
        } else {
            CompressionKind::General
        }
    }

    /// Whether the content profile is semantically rich enough to justify an
    /// LLM summary over the template path.
    #[must_use]
    pub fn is_semantically_rich(messages: &[Message]) -> bool {
        !matches!(Self::detect(messages), CompressionKind::General)
    }

    fn template(self) -> &'static str {
        match self {
            CompressionKind::General => {
                "Compress this conversation while preserving essential information for \
                 seamless continuation. Keep decisions, open questions, and results of \
                 tool calls. Target roughly {target}% reduction, at most {max_tokens} tokens.\n\n\
                 Conversation:\n{conversation}"
            }
            CompressionKind::McpHeavy => {
                "Compress this tool-heavy conversation. Collapse raw tool output into the \
                 facts it established; always keep identifiers such as project_id, \
                 entity_id, and file paths verbatim. Target roughly {target}% reduction, \
                 at most {max_tokens} tokens.\n\n\
                 Conversation:\n{conversation}"
            }
            CompressionKind::Code => {
                "Compress this code-focused conversation. Keep function and type names, \
                 file paths, and the reasoning behind each change; drop restated code \
                 that lives in files. Target roughly {target}% reduction, at most \
                 {max_tokens} tokens.\n\n\
                 Conversation:\n{conversation}"
            }
            CompressionKind::Planning => {
                "Compress this planning conversation. Keep every task, requirement, \
                 decision, and open question with its current status; drop conversational \
                 filler. Target roughly {target}% reduction, at most {max_tokens} tokens.\n\n\
                 Conversation:\n{conversation}"
            }
            CompressionKind::Technical => {
                "Compress this technical deep-dive. Keep invariants, constraints, exact \
                 names, and agreed designs; summarise exploration that led nowhere. \
                 Target roughly {target}% reduction, at most {max_tokens} tokens.\n\n\
                 Conversation:\n{conversation}"
            }
        }
    }
}

/// Format a conversation for the summarisation prompt, truncating very long
/// tool outputs.
#[must_use]
pub fn format_conversation(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::User => "USER",
                Role::Assistant => "ASSISTANT",
                Role::System => "SYSTEM",
                Role::Tool => "TOOL",
            };
            let content = if m.role == Role::Tool && m.content.len() > 2_000 {
                let mut end = 1_500;
                while !m.content.is_char_boundary(end) {
                    end -= 1;
                }
                format!("{}\n... [truncated for compression] ...", &m.content[..end])
            } else {
                m.content.clone()
            };
            format!("[{role}]: {content}")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Summarises message prefixes through an LLM provider.
pub struct LlmCompressor<P: Provider> {
    provider: P,
    model: String,
    max_output_tokens: usize,
}

impl<P: Provider> LlmCompressor<P> {
    /// Create a compressor calling `model` on `provider`.
    #[must_use]
    pub fn new(provider: P, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_output_tokens: 2_000,
        }
    }

    /// Override the summary's output token budget.
    #[must_use]
    pub fn with_max_output_tokens(mut self, max: usize) -> Self {
        self.max_output_tokens = max;
        self
    }

    /// Summarise `messages` using the template for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`CompressionError::Provider`] when the underlying call fails;
    /// the caller decides between fallback and returning the input unchanged.
    pub async fn summarize(
        &self,
        messages: &[Message],
        kind: CompressionKind,
        target_reduction_pct: f64,
    ) -> Result<String, CompressionError> {
        let prompt = kind
            .template()
            .replace("{target}", &format!("{target_reduction_pct:.0}"))
            .replace("{max_tokens}", &self.max_output_tokens.to_string())
            .replace("{conversation}", &format_conversation(messages));

        let request = CompletionRequest {
            model: self.model.clone(),
            messages: vec![Message::user(prompt)],
            system: Some(SystemPrompt::Text(
                "You are an expert at compressing conversations while preserving \
                 essential context."
                    .to_string(),
            )),
            tools: Vec::new(),
            max_tokens: Some(self.max_output_tokens),
            temperature: Some(0.0),
        };

        let response = self.provider.complete(request).await?;
        Ok(response.message.content)
    }
}

/// Deterministic template summary used when the LLM path fails.
///
/// Summarises the last few user requests and assistant actions without any
/// model call, so it always succeeds and always produces the same output for
/// the same input.
#[must_use]
pub fn fallback_summary(messages: &[Message], last_n: usize) -> String {
    let recent_users: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::User)
        .rev()
        .take(last_n)
        .map(|m| m.content.as_str())
        .collect();
    let recent_assistants: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::Assistant)
        .rev()
        .take(last_n)
        .map(|m| m.content.as_str())
        .collect();

    let mut out = format!(
        "[Fallback Summary - {} messages compressed]\n\nRecent user requests:\n",
        messages.len()
    );
    for content in recent_users.iter().rev() {
        let line: &str = content.lines().next().unwrap_or("");
        out.push_str(&format!("- {}\n", truncate(line, 120)));
    }
    out.push_str("\nRecent assistant actions:\n");
    for content in recent_assistants.iter().rev() {
        let line: &str = content.lines().next().unwrap_or("");
        out.push_str(&format!("- {}\n", truncate(line, 120)));
    }
    out
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_planning_conversations() {
        let messages = vec![
            Message::user("Draft the plan with every task and requirement"),
            Message::assistant("The implementation plan has three tasks"),
        ];
        assert_eq!(CompressionKind::detect(&messages), CompressionKind::Planning);
    }

    #[test]
    fn detects_mcp_heavy_conversations() {
        let messages = vec![Message::tool(
            "rag_retrieve",
            "call_1",
            "project_id: a entity_id: b repository_id: c tool_call rag_retrieve output",
        )];
        assert_eq!(CompressionKind::detect(&messages), CompressionKind::McpHeavy);
    }

    #[test]
    fn plain_chat_is_general() {
        let messages = vec![Message::user("hello"), Message::assistant("hi there")];
        assert_eq!(CompressionKind::detect(&messages), CompressionKind::General);
        assert!(!CompressionKind::is_semantically_rich(&messages));
    }

    #[test]
    fn format_truncates_long_tool_output() {
        let messages = vec![Message::tool("get_file", "call_1", "x".repeat(5_000))];
        let formatted = format_conversation(&messages);
        assert!(formatted.contains("[TOOL]:"));
        assert!(formatted.contains("[truncated for compression]"));
        assert!(formatted.len() < 5_000);
    }

    #[test]
    fn fallback_summary_is_deterministic() {
        let messages = vec![
            Message::user("first request"),
            Message::assistant("did a thing"),
            Message::user("second request"),
        ];
        let a = fallback_summary(&messages, 3);
        let b = fallback_summary(&messages, 3);
        assert_eq!(a, b);
        assert!(a.contains("first request"));
        assert!(a.contains("second request"));
        assert!(a.contains("did a thing"));
    }
}
