//! Token count estimation from messages and tool definitions.

use stratum_types::{Message, ToolDefinition};

/// Estimates token counts from text using a configurable chars-per-token
/// ratio, with per-model-family correction factors applied on top.
///
/// This is a heuristic estimator; real tokenization varies per model. The
/// default ratio of 4.0 chars/token approximates GPT-family and Claude
/// models. Some model families systematically over-count under that heuristic;
/// their correction factors are configuration, not constants, because the
/// right value comes from observed provider billing rather than a derivation.
///
/// # Example
///
/// ```
/// use stratum_context::TokenCounter;
///
/// let counter = TokenCounter::new();
/// let estimate = counter.estimate_text("Hello, world!");
/// assert!(estimate > 0);
/// ```
#[derive(Debug, Clone)]
pub struct TokenCounter {
    chars_per_token: f32,
    /// `(model substring, factor)` pairs. The first pair whose substring
    /// occurs in the lowercased model id wins.
    correction_factors: Vec<(String, f32)>,
}

/// Tokens added per message for role markers and formatting.
const ROLE_OVERHEAD: usize = 4;

impl Default for TokenCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCounter {
    /// Creates a counter with the default 4.0 chars/token ratio and the
    /// stock correction table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            chars_per_token: 4.0,
            correction_factors: vec![("glm-4.5".into(), 0.65), ("z-ai".into(), 0.65)],
        }
    }

    /// Creates a counter with a custom chars-per-token ratio.
    #[must_use]
    pub fn with_ratio(chars_per_token: f32) -> Self {
        Self {
            chars_per_token: chars_per_token.max(0.1),
            ..Self::new()
        }
    }

    /// Replace the correction-factor table.
    #[must_use]
    pub fn with_correction_factors(mut self, factors: Vec<(String, f32)>) -> Self {
        self.correction_factors = factors;
        self
    }

    /// Estimates the number of tokens in a text string.
    #[must_use]
    pub fn estimate_text(&self, text: &str) -> usize {
        (text.len() as f32 / self.chars_per_token).ceil() as usize
    }

    /// Estimates the total token count for a message list under `model`.
    ///
    /// Deterministic for identical input: the same messages and model id
    /// always produce the same count.
    #[must_use]
    pub fn estimate_messages(&self, messages: &[Message], model: &str) -> usize {
        if messages.is_empty() {
            return 0;
        }
        let raw: usize = messages.iter().map(|m| self.estimate_message(m)).sum();
        self.apply_correction(raw, model)
    }

    /// Estimates the token cost of tool definitions sent with a request.
    #[must_use]
    pub fn estimate_tools(&self, tools: &[ToolDefinition]) -> usize {
        tools
            .iter()
            .map(|t| {
                self.estimate_text(&t.name)
                    + self.estimate_text(&t.description)
                    + self.estimate_text(&t.input_schema.to_string())
            })
            .sum()
    }

    fn estimate_message(&self, message: &Message) -> usize {
        let mut tokens = ROLE_OVERHEAD + self.estimate_text(&message.content);
        for call in &message.tool_calls {
            tokens += self.estimate_text(&call.name);
            tokens += self.estimate_text(&call.arguments.to_string());
        }
        if let Some(name) = &message.name {
            tokens += self.estimate_text(name);
        }
        tokens
    }

    fn apply_correction(&self, raw: usize, model: &str) -> usize {
        let model = model.to_ascii_lowercase();
        for (family, factor) in &self.correction_factors {
            if model.contains(family.as_str()) {
                let corrected = (raw as f32 * factor) as usize;
                tracing::debug!(
                    model = %model,
                    family = %family,
                    factor,
                    raw,
                    corrected,
                    "applied token correction factor"
                );
                return corrected;
            }
        }
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimates_text_by_ratio() {
        let counter = TokenCounter::new();
        // 400 chars / 4.0 = 100
        assert_eq!(counter.estimate_text(&"a".repeat(400)), 100);
    }

    #[test]
    fn message_estimate_includes_role_overhead() {
        let counter = TokenCounter::new();
        let messages = vec![Message::user("a".repeat(400))];
        assert_eq!(counter.estimate_messages(&messages, "claude-sonnet-4"), 104);
    }

    #[test]
    fn empty_messages_cost_nothing() {
        let counter = TokenCounter::new();
        assert_eq!(counter.estimate_messages(&[], "any-model"), 0);
    }

    #[test]
    fn correction_factor_applies_per_family() {
        let counter = TokenCounter::new();
        let messages = vec![Message::user("a".repeat(4000))];
        let plain = counter.estimate_messages(&messages, "claude-sonnet-4");
        let corrected = counter.estimate_messages(&messages, "openrouter/z-ai/glm-4.5");
        assert_eq!(corrected, (plain as f32 * 0.65) as usize);
    }

    #[test]
    fn correction_table_is_configurable() {
        let counter = TokenCounter::new().with_correction_factors(vec![("mymodel".into(), 0.5)]);
        let messages = vec![Message::user("a".repeat(800))];
        let plain = counter.estimate_messages(&messages, "other");
        let halved = counter.estimate_messages(&messages, "MyModel-v2");
        assert_eq!(halved, plain / 2);
    }

    #[test]
    fn tool_calls_count_toward_estimate() {
        let counter = TokenCounter::new();
        let bare = vec![Message::assistant("ok")];
        let with_call = vec![Message::assistant("ok").with_tool_calls(vec![
            stratum_types::ToolCall::new("read_file", serde_json::json!({"file_path": "a.md"})),
        ])];
        assert!(
            counter.estimate_messages(&with_call, "m") > counter.estimate_messages(&bare, "m")
        );
    }
}
