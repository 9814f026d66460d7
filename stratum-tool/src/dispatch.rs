//! Tool dispatch: name resolution, argument normalisation, execution, and
//! result post-processing.

use std::collections::HashSet;

use serde_json::Value;
use stratum_context::ArchiveThresholds;
use stratum_state::{AgentState, StateUpdate};
use stratum_types::{meta, Message, PlanApprovalRequest, ToolCall};

use crate::registry::ToolRegistry;
use crate::tool::ToolResponse;

/// Everything one tool call produced.
#[derive(Debug, Clone)]
pub struct DispatchResult {
    /// The tool message to append to the conversation.
    pub message: Message,
    /// State delta returned by the tool, if any.
    pub update: Option<StateUpdate>,
    /// Interrupt request raised by the tool, if any.
    pub interrupt: Option<PlanApprovalRequest>,
}

/// Resolves and executes tool calls.
///
/// Unknown tools, bad arguments, and execution failures all come back as
/// error tool messages the model gets to see and react to; nothing here
/// panics or aborts the loop.
pub struct Dispatcher {
    registry: ToolRegistry,
    /// Tools whose string-encoded JSON arguments are repaired before dispatch.
    compat_fix_tools: HashSet<String>,
    /// Tools whose oversized output is wrapped in the archive protocol.
    content_producing: HashSet<String>,
    archive_thresholds: ArchiveThresholds,
}

impl Dispatcher {
    /// Create a dispatcher over a registry.
    #[must_use]
    pub fn new(registry: ToolRegistry, archive_thresholds: ArchiveThresholds) -> Self {
        Self {
            registry,
            compat_fix_tools: HashSet::new(),
            content_producing: HashSet::new(),
            archive_thresholds,
        }
    }

    /// The underlying registry.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Mutable access to the underlying registry.
    pub fn registry_mut(&mut self) -> &mut ToolRegistry {
        &mut self.registry
    }

    /// Register a tool for argument normalisation.
    pub fn mark_compat_fix(&mut self, name: impl Into<String>) {
        self.compat_fix_tools.insert(name.into());
    }

    /// Register a tool as content-producing (archive wrapping applies).
    pub fn mark_content_producing(&mut self, name: impl Into<String>) {
        self.content_producing.insert(name.into());
    }

    /// Execute one tool call against the phase-visible subset.
    ///
    /// `visible` is the list of tool names the active phase exposes; a name
    /// outside it is treated the same as an unregistered one.
    pub async fn dispatch(
        &self,
        call: &ToolCall,
        visible: &[String],
        state: &AgentState,
    ) -> DispatchResult {
        if !self.registry.is_visible(&call.name, visible) {
            tracing::warn!(tool = %call.name, "tool not found in active set");
            return error_result(call, format!("Error: tool '{}' not found", call.name));
        }
        // `is_visible` just confirmed registration.
        let Some(tool) = self.registry.get(&call.name) else {
            return error_result(call, format!("Error: tool '{}' not found", call.name));
        };

        let arguments = match self.normalize_arguments(&call.name, call.arguments.clone()) {
            Ok(arguments) => arguments,
            Err(reason) => return error_result(call, reason),
        };

        let response = match tool.call(arguments, state).await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(tool = %call.name, %error, "tool execution failed");
                ToolResponse::error(format!("Error executing '{}': {error}", call.name))
            }
        };

        self.build_result(call, response)
    }

    /// Repair JSON-encoded string arguments for registered compat-fix tools.
    ///
    /// Some models serialise list/object parameters as strings. For marked
    /// tools, string values that look like JSON containers are parsed; a
    /// value that looks like JSON but fails to parse is a descriptive error.
    fn normalize_arguments(&self, tool_name: &str, arguments: Value) -> Result<Value, String> {
        if !self.compat_fix_tools.contains(tool_name) {
            return Ok(arguments);
        }

        // The whole argument payload may itself arrive as a string.
        let arguments = match arguments {
            Value::String(text) if looks_like_json(&text) => serde_json::from_str(text.trim())
                .map_err(|e| {
                    format!("Error: arguments for '{tool_name}' are malformed JSON: {e}")
                })?,
            other => other,
        };

        let map = match arguments {
            Value::Object(map) => map,
            other => return Ok(other),
        };

        let mut repaired = serde_json::Map::with_capacity(map.len());
        for (key, value) in map {
            let value = match value {
                Value::String(text) if looks_like_json(&text) => {
                    serde_json::from_str(text.trim()).map_err(|e| {
                        format!(
                            "Error: parameter '{key}' of '{tool_name}' is malformed JSON: {e}"
                        )
                    })?
                }
                other => other,
            };
            repaired.insert(key, value);
        }
        Ok(Value::Object(repaired))
    }

    fn build_result(&self, call: &ToolCall, response: ToolResponse) -> DispatchResult {
        let mut message = Message::tool(&call.name, &call.id, response.output.content);
        if response.output.is_error {
            message = message.with_metadata(meta::ERROR, true.into());
        }

        // Archive wrapping for content-producing tools.
        if self.content_producing.contains(&call.name) {
            if let Some(marker) =
                stratum_compress::archive::wrap_if_oversized(&message, &self.archive_thresholds)
            {
                message = marker;
            }
        }

        DispatchResult {
            message,
            update: response.update,
            interrupt: response.interrupt,
        }
    }
}

fn looks_like_json(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.starts_with('{') || trimmed.starts_with('[')
}

fn error_result(call: &ToolCall, reason: String) -> DispatchResult {
    DispatchResult {
        message: Message::tool(&call.name, &call.id, reason)
            .with_metadata(meta::ERROR, true.into()),
        update: None,
        interrupt: None,
    }
}
