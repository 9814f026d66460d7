//! The object-safe tool trait and its response type.

use async_trait::async_trait;
use stratum_state::{AgentState, StateUpdate};
use stratum_types::{PlanApprovalRequest, ToolError, ToolOutput};

/// What a tool execution produced.
///
/// Besides plain output, a tool may return a state delta (the virtual-fs and
/// todo tools do) and may request a human interrupt (`review_plan` does).
#[derive(Debug, Clone)]
pub struct ToolResponse {
    /// The output handed back to the model as a tool message.
    pub output: ToolOutput,
    /// Optional state delta to merge before the next iteration.
    pub update: Option<StateUpdate>,
    /// Optional interrupt: suspend the loop and wait for the host.
    pub interrupt: Option<PlanApprovalRequest>,
}

impl ToolResponse {
    /// A plain successful response.
    #[must_use]
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            output: ToolOutput::ok(content),
            update: None,
            interrupt: None,
        }
    }

    /// A plain error response. The message text goes to the model.
    #[must_use]
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            output: ToolOutput::error(content),
            update: None,
            interrupt: None,
        }
    }

    /// Attach a state delta.
    #[must_use]
    pub fn with_update(mut self, update: StateUpdate) -> Self {
        self.update = Some(update);
        self
    }

    /// Attach an interrupt request.
    #[must_use]
    pub fn with_interrupt(mut self, interrupt: PlanApprovalRequest) -> Self {
        self.interrupt = Some(interrupt);
        self
    }
}

/// Object-safe trait for tool implementations.
///
/// Tools are stored as `Arc<dyn ToolDyn>` in the registry. They receive a
/// read-only view of the agent state; mutation happens through the returned
/// [`StateUpdate`], never in place.
#[async_trait]
pub trait ToolDyn: Send + Sync {
    /// The tool's unique name.
    fn name(&self) -> &str;

    /// Human-readable description of what the tool does.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's input parameters.
    fn input_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given input.
    async fn call(
        &self,
        input: serde_json::Value,
        state: &AgentState,
    ) -> Result<ToolResponse, ToolError>;
}
