//! Loop outcomes and streamed state events.

use serde::{Deserialize, Serialize};
use stratum_types::{Phase, PlanApprovalRequest, TokenUsage};

/// Why the loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopOutcome {
    /// The assistant finished without tool calls.
    Terminal,
    /// The cancellation signal fired.
    Cancelled,
    /// Token budget exceeded after a compression attempt.
    FatalTokenOverflow,
    /// A tool failure was escalated to fatal by a hook.
    FatalToolError,
    /// The iteration guard fired.
    MaxIterationsExceeded,
    /// Suspended on a plan-approval interrupt; resume and re-run.
    AwaitingApproval,
}

/// The result of one loop run.
///
/// All exits, fatal ones included, come back this way; the loop never
/// surfaces a stack trace to the host.
#[derive(Debug, Clone)]
pub struct LoopRun {
    /// Why the loop returned.
    pub outcome: LoopOutcome,
    /// Human-readable detail for non-clean outcomes.
    pub reason: Option<String>,
    /// Iterations completed.
    pub iterations: usize,
    /// Cumulative token usage across provider calls.
    pub usage: TokenUsage,
    /// The pending interrupt for [`LoopOutcome::AwaitingApproval`].
    pub interrupt: Option<PlanApprovalRequest>,
}

impl LoopRun {
    pub(crate) fn finished(outcome: LoopOutcome, iterations: usize, usage: TokenUsage) -> Self {
        Self {
            outcome,
            reason: None,
            iterations,
            usage,
            interrupt: None,
        }
    }

    pub(crate) fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Incremental events emitted while the loop runs, one per completed node.
#[derive(Debug, Clone)]
pub enum StateEvent {
    /// The pre-step chain applied a compression.
    Compressed {
        /// Messages before.
        before: usize,
        /// Messages after.
        after: usize,
    },
    /// The provider responded.
    ModelResponded {
        /// Number of tool calls in the response.
        tool_calls: usize,
    },
    /// One tool finished and its message was collected.
    ToolCompleted {
        /// Tool name.
        name: String,
        /// Whether the result was an error.
        is_error: bool,
    },
    /// The orchestrator advanced the phase.
    PhaseAdvanced {
        /// The new phase.
        to: Phase,
    },
    /// A plan-approval interrupt was raised.
    Interrupted(PlanApprovalRequest),
    /// The run finished with this outcome.
    Finished(LoopOutcome),
}
