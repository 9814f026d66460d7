//! Integration tests for the agent loop with a mock provider.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use stratum_loop::{AgentLoop, LoopOutcome, RuntimeConfig};
use stratum_phase::{Orchestrator, PhaseCatalog, PhaseSpec, ValidationRule};
use stratum_state::{reduce, AgentState, StateUpdate};
use stratum_tool::{register_builtins, ToolDyn, ToolRegistry, ToolResponse};
use stratum_types::{
    ApprovalAction, CompletionRequest, CompletionResponse, Message, Phase, PlanApprovalResponse,
    PlanStatus, Provider, ProviderError, Role, StopReason, Todo, TokenUsage, ToolCall, ToolError,
};

/// A mock provider that returns pre-configured responses in sequence and
/// records every request it sees.
struct MockProvider {
    responses: Mutex<Vec<Message>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockProvider {
    fn new(responses: Vec<Message>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn requests(&self) -> Arc<Mutex<Vec<CompletionRequest>>> {
        Arc::clone(&self.requests)
    }
}

impl Provider for MockProvider {
    fn complete(
        &self,
        request: CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, ProviderError>> + Send {
        self.requests.lock().unwrap().push(request);
        let next = {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                None
            } else {
                Some(responses.remove(0))
            }
        };
        async move {
            match next {
                Some(message) => {
                    let stop_reason = if message.tool_calls.is_empty() {
                        StopReason::EndTurn
                    } else {
                        StopReason::ToolUse
                    };
                    Ok(CompletionResponse {
                        id: "resp".into(),
                        model: "test-model".into(),
                        message,
                        usage: TokenUsage {
                            input_tokens: 10,
                            output_tokens: 5,
                        },
                        stop_reason,
                    })
                }
                None => Err(ProviderError::ServiceUnavailable("exhausted".into())),
            }
        }
    }
}

/// Echo tool with an optional artificial delay, for ordering tests.
struct Echo;

#[async_trait]
impl ToolDyn for Echo {
    fn name(&self) -> &str {
        "echo"
    }
    fn description(&self) -> &str {
        "echoes text after an optional delay"
    }
    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": {"type": "string"},
                "delay_ms": {"type": "integer"}
            },
            "required": ["text"]
        })
    }
    async fn call(
        &self,
        input: serde_json::Value,
        _state: &AgentState,
    ) -> Result<ToolResponse, ToolError> {
        let delay = input["delay_ms"].as_u64().unwrap_or(0);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let text = input["text"].as_str().unwrap_or_default();
        Ok(ToolResponse::ok(format!("echo: {text}")))
    }
}

/// A single-phase catalog that never advances, with the echo tool visible.
fn pinned_catalog() -> PhaseCatalog {
    PhaseCatalog::new(vec![PhaseSpec {
        phase: Phase::Investigation,
        name: "investigation".into(),
        goal: "poke at things".into(),
        duration_estimate: "whenever".into(),
        label: "Investigator".into(),
        tool_names: vec!["echo".into(), "write_file".into(), "review_plan".into()],
        required_outputs: vec!["never.md".into()],
        validation_rules: vec![ValidationRule::new("never passes", |_| false)],
        requires_approval: false,
        todo_template: Arc::new(|_| vec![Todo::pending("poke")]),
    }])
}

fn registry_with_echo() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    register_builtins(&mut registry);
    registry.register(Arc::new(Echo));
    registry
}

#[tokio::test]
async fn idle_passthrough_terminates_cleanly() {
    let provider = MockProvider::new(vec![Message::assistant("hello back")]);
    let requests = provider.requests();
    let agent = AgentLoop::builder(provider)
        .config(RuntimeConfig::for_model("test-model"))
        .orchestrator(Orchestrator::new(pinned_catalog()))
        .tools(registry_with_echo())
        .selective_compression()
        .build();

    let mut state = AgentState::new();
    let run = agent.run(&mut state, Some(Message::user("hello"))).await;

    assert_eq!(run.outcome, LoopOutcome::Terminal);
    assert_eq!(run.iterations, 1);
    // No compression delta was applied: the model saw exactly one message.
    let seen = requests.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].messages.len(), 1);
    assert_eq!(seen[0].messages[0].content, "hello");
    assert_eq!(state.messages.len(), 2);
    assert_eq!(state.messages[1].role, Role::Assistant);
}

#[tokio::test]
async fn tool_round_trip_preserves_linkage() {
    let call = ToolCall::new("echo", serde_json::json!({"text": "hi"}));
    let provider = MockProvider::new(vec![
        Message::assistant("let me echo that").with_tool_calls(vec![call.clone()]),
        Message::assistant("done"),
    ]);
    let agent = AgentLoop::builder(provider)
        .config(RuntimeConfig::for_model("test-model"))
        .orchestrator(Orchestrator::new(pinned_catalog()))
        .tools(registry_with_echo())
        .build();

    let mut state = AgentState::new();
    let run = agent.run(&mut state, Some(Message::user("say hi"))).await;

    assert_eq!(run.outcome, LoopOutcome::Terminal);
    assert_eq!(run.iterations, 2);
    assert!(state.tool_messages_linked());
    let tool_msg = state
        .messages
        .iter()
        .find(|m| m.role == Role::Tool)
        .unwrap();
    assert_eq!(tool_msg.tool_call_id.as_deref(), Some(call.id.as_str()));
    assert_eq!(tool_msg.content, "echo: hi");
}

#[tokio::test]
async fn parallel_tools_append_in_model_order() {
    let slow = ToolCall::new("echo", serde_json::json!({"text": "slow", "delay_ms": 40}));
    let fast = ToolCall::new("echo", serde_json::json!({"text": "fast"}));
    let provider = MockProvider::new(vec![
        Message::assistant("two calls").with_tool_calls(vec![slow.clone(), fast.clone()]),
        Message::assistant("done"),
    ]);
    let mut config = RuntimeConfig::for_model("test-model");
    config.parallel_tool_execution = true;
    let agent = AgentLoop::builder(provider)
        .config(config)
        .orchestrator(Orchestrator::new(pinned_catalog()))
        .tools(registry_with_echo())
        .build();

    let mut state = AgentState::new();
    agent.run(&mut state, Some(Message::user("go"))).await;

    let tool_messages: Vec<&Message> = state
        .messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .collect();
    assert_eq!(tool_messages.len(), 2);
    // Model order, not completion order.
    assert_eq!(tool_messages[0].tool_call_id.as_deref(), Some(slow.id.as_str()));
    assert_eq!(tool_messages[1].tool_call_id.as_deref(), Some(fast.id.as_str()));
}

#[tokio::test]
async fn unknown_tool_yields_error_message_and_continues() {
    let call = ToolCall::new("ghost", serde_json::json!({}));
    let provider = MockProvider::new(vec![
        Message::assistant("calling a ghost").with_tool_calls(vec![call]),
        Message::assistant("recovered"),
    ]);
    let agent = AgentLoop::builder(provider)
        .config(RuntimeConfig::for_model("test-model"))
        .orchestrator(Orchestrator::new(pinned_catalog()))
        .tools(registry_with_echo())
        .build();

    let mut state = AgentState::new();
    let run = agent.run(&mut state, Some(Message::user("go"))).await;

    assert_eq!(run.outcome, LoopOutcome::Terminal);
    let tool_msg = state
        .messages
        .iter()
        .find(|m| m.role == Role::Tool)
        .unwrap();
    assert!(tool_msg.is_error());
    assert!(tool_msg.content.contains("not found"));
}

#[tokio::test]
async fn iteration_guard_fires() {
    // The model asks for a tool every turn; the guard must cut it off.
    let responses: Vec<Message> = (0..10)
        .map(|_| {
            Message::assistant("again").with_tool_calls(vec![ToolCall::new(
                "echo",
                serde_json::json!({"text": "x"}),
            )])
        })
        .collect();
    let provider = MockProvider::new(responses);
    let mut config = RuntimeConfig::for_model("test-model");
    config.max_iterations = Some(3);
    let agent = AgentLoop::builder(provider)
        .config(config)
        .orchestrator(Orchestrator::new(pinned_catalog()))
        .tools(registry_with_echo())
        .build();

    let mut state = AgentState::new();
    let run = agent.run(&mut state, Some(Message::user("loop forever"))).await;

    assert_eq!(run.outcome, LoopOutcome::MaxIterationsExceeded);
    assert_eq!(run.iterations, 3);
    assert!(run.reason.unwrap().contains("limit of 3"));
}

#[tokio::test]
async fn cancellation_is_a_distinct_outcome() {
    let provider = MockProvider::new(vec![Message::assistant("never seen")]);
    let token = CancellationToken::new();
    token.cancel();
    let agent = AgentLoop::builder(provider)
        .config(RuntimeConfig::for_model("test-model"))
        .orchestrator(Orchestrator::new(pinned_catalog()))
        .tools(registry_with_echo())
        .cancellation(token)
        .build();

    let mut state = AgentState::new();
    let run = agent.run(&mut state, Some(Message::user("go"))).await;
    assert_eq!(run.outcome, LoopOutcome::Cancelled);
    assert_eq!(run.iterations, 0);
}

#[tokio::test]
async fn token_overflow_without_compression_is_fatal() {
    let provider = MockProvider::new(vec![Message::assistant("never seen")]);
    let requests = provider.requests();
    let context = stratum_context::ContextConfig {
        max_context_window: 10,
        ..Default::default()
    };
    let agent = AgentLoop::builder(provider)
        .config(RuntimeConfig::for_model("test-model"))
        .context_config(context)
        .orchestrator(Orchestrator::new(pinned_catalog()))
        .tools(registry_with_echo())
        .build();

    let mut state = AgentState::new();
    let run = agent
        .run(&mut state, Some(Message::user("a".repeat(4_000))))
        .await;

    assert_eq!(run.outcome, LoopOutcome::FatalTokenOverflow);
    // The budget violation was caught before any provider call.
    assert!(requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn compression_runs_before_the_model_sees_the_conversation() {
    let provider = MockProvider::new(vec![Message::assistant("ok")]);
    let requests = provider.requests();
    let context = stratum_context::ContextConfig {
        max_context_window: 2_000,
        ..Default::default()
    };
    let agent = AgentLoop::builder(provider)
        .config(RuntimeConfig::for_model("test-model"))
        .context_config(context)
        .orchestrator(Orchestrator::new(pinned_catalog()))
        .tools(registry_with_echo())
        .selective_compression()
        .build();

    let mut state = AgentState::new();
    let filler: Vec<Message> = (0..80)
        .map(|i| Message::user(format!("turn {i}: {}", "context ".repeat(30))))
        .collect();
    reduce(&mut state, StateUpdate::append_messages(filler));

    let run = agent.run(&mut state, None).await;
    assert_eq!(run.outcome, LoopOutcome::Terminal);

    let seen = requests.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].messages.len() < 80, "model saw the compressed list");
    assert!(seen[0].messages.iter().any(|m| m.is_compression_summary()));
    assert_eq!(state.compression_history.len(), 1);
}

#[tokio::test]
async fn provider_exhaustion_terminates_with_error_message() {
    let provider = MockProvider::new(vec![]);
    let agent = AgentLoop::builder(provider)
        .config(RuntimeConfig::for_model("test-model"))
        .orchestrator(Orchestrator::new(pinned_catalog()))
        .tools(registry_with_echo())
        .build();

    let mut state = AgentState::new();
    let run = agent.run(&mut state, Some(Message::user("go"))).await;

    assert_eq!(run.outcome, LoopOutcome::Terminal);
    assert!(run.reason.unwrap().contains("consecutive"));
    let last = state.messages.last().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert!(last.is_error());
}

#[tokio::test]
async fn plan_approval_interrupt_and_edit_resume() {
    let sections: Vec<serde_json::Value> = (0..5)
        .map(|i| {
            serde_json::json!({
                "title": format!("Section {i}"),
                "description": "part of the plan",
                "estimated_length": "1-2 pages",
                "content_type": "technical"
            })
        })
        .collect();
    let review_call = ToolCall::new(
        "review_plan",
        serde_json::json!({
            "plan_type": "implementation",
            "plan_content": {
                "title": "Implementation Plan",
                "description": "Build the feature",
                "sections": sections
            }
        }),
    );
    let provider = MockProvider::new(vec![
        Message::assistant("submitting plan").with_tool_calls(vec![review_call]),
        Message::assistant("waiting on review"),
    ]);
    let agent = AgentLoop::builder(provider)
        .config(RuntimeConfig::for_model("test-model"))
        .orchestrator(Orchestrator::new(pinned_catalog()))
        .tools(registry_with_echo())
        .build();

    let mut state = AgentState::new();
    let run = agent.run(&mut state, Some(Message::user("plan it"))).await;

    assert_eq!(run.outcome, LoopOutcome::AwaitingApproval);
    let interrupt = run.interrupt.unwrap();
    assert_eq!(state.pending_plans.len(), 1);
    assert_eq!(state.pending_plans[0].sections.len(), 5);
    assert!(interrupt.options.contains_key("approve"));

    // Host asks for an edit; the plan is re-stored modified with 6 sections.
    let status = agent
        .resume(
            &mut state,
            &interrupt.plan_id,
            &PlanApprovalResponse {
                action: ApprovalAction::Edit,
                modifications: Some("add security section".into()),
                feedback: None,
            },
        )
        .unwrap();
    assert_eq!(status, PlanStatus::Modified);
    let pending = &state.pending_plans[0];
    assert_eq!(pending.sections.len(), 6);
    assert_eq!(pending.status, PlanStatus::Modified);

    // The next run re-presents the conversation and finishes cleanly.
    let run = agent.run(&mut state, None).await;
    assert_eq!(run.outcome, LoopOutcome::Terminal);
    assert_eq!(state.pending_plans[0].status, PlanStatus::Modified);
}

#[tokio::test]
async fn phase_advances_when_requirements_are_met() {
    let write_call = ToolCall::new(
        "write_file",
        serde_json::json!({"file_path": "findings.md", "content": "## Findings"}),
    );
    let provider = MockProvider::new(vec![
        Message::assistant("writing findings").with_tool_calls(vec![write_call]),
        Message::assistant("moving on"),
    ]);
    let agent = AgentLoop::builder(provider)
        .config(RuntimeConfig::for_model("test-model"))
        .orchestrator(Orchestrator::default())
        .tools(registry_with_echo())
        .build();

    let mut state = AgentState::new();
    let run = agent
        .run(&mut state, Some(Message::user("investigate the repo")))
        .await;

    assert_eq!(run.outcome, LoopOutcome::Terminal);
    assert_eq!(state.phase.completed_phases, vec![Phase::Investigation]);
    assert_eq!(state.phase.current_phase, Phase::Discussion);
    assert_eq!(state.files["findings.md"], "## Findings");
}
