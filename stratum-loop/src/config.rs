//! Loop runtime configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the agent loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Model identifier, passed to the provider and the token counter.
    pub model: String,
    /// Base system prompt, prepended to the phase prompt.
    pub system_prompt: String,
    /// Iteration guard. `None` means no limit.
    pub max_iterations: Option<usize>,
    /// Whether tool calls within one assistant turn run concurrently.
    pub parallel_tool_execution: bool,
    /// Consecutive retryable provider failures tolerated before the turn
    /// becomes fatal.
    pub max_consecutive_provider_failures: usize,
    /// Maximum tokens to request from the provider per call.
    pub max_tokens: Option<usize>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            system_prompt: String::new(),
            max_iterations: Some(25),
            parallel_tool_execution: false,
            max_consecutive_provider_failures: 3,
            max_tokens: None,
            temperature: None,
        }
    }
}

impl RuntimeConfig {
    /// A config for `model` with defaults elsewhere.
    #[must_use]
    pub fn for_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }
}
