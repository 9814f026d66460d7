//! End-to-end scenarios across the whole workspace.
//!
//! These exercise the full stack (loop, hooks, compressor, dispatcher,
//! orchestrator, state) with a mock provider, covering the flows a host
//! application actually runs: an idle turn, a forced compression, an archive
//! marker, a blocked phase, and a full plan-approval round trip.

use std::sync::{Arc, Mutex};

use stratum_compress::Compressor;
use stratum_context::{ContextConfig, ContextMetrics, TokenCounter};
use stratum_loop::{AgentLoop, LoopOutcome, RuntimeConfig};
use stratum_phase::Orchestrator;
use stratum_state::{reduce, AgentState, Session, SessionStore, StateUpdate};
use stratum_state::InMemorySessionStore;
use stratum_tool::{register_builtins, ToolRegistry};
use stratum_types::{
    ApprovalAction, CompletionRequest, CompletionResponse, Message, Phase, PlanApprovalResponse,
    PlanStatus, Provider, ProviderError, StopReason, TokenUsage, ToolCall,
};

struct ScriptedProvider {
    responses: Mutex<Vec<Message>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<Message>) -> Self {
        Self {
            responses: Mutex::new(responses),
        }
    }
}

impl Provider for ScriptedProvider {
    fn complete(
        &self,
        _request: CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, ProviderError>> + Send {
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
                        usage: TokenUsage::default(),
                        stop_reason,
                    })
                }
                None => Err(ProviderError::InvalidRequest("script exhausted".into())),
            }
        }
    }
}

fn agent_with(responses: Vec<Message>) -> AgentLoop<ScriptedProvider> {
    let mut registry = ToolRegistry::new();
    register_builtins(&mut registry);
    AgentLoop::builder(ScriptedProvider::new(responses))
        .config(RuntimeConfig::for_model("test-model"))
        .orchestrator(Orchestrator::default())
        .tools(registry)
        .selective_compression()
        .build()
}

#[tokio::test]
async fn full_planning_workflow_reaches_task_generation() {
    // One scripted turn per phase: write the phase output, then advance.
    let responses = vec![
        Message::assistant("recording findings").with_tool_calls(vec![ToolCall::new(
            "write_file",
            serde_json::json!({"file_path": "findings.md", "content": "## Findings"}),
        )]),
        Message::assistant("recording answers").with_tool_calls(vec![ToolCall::new(
            "write_file",
            serde_json::json!({"file_path": "questions.md", "content": "## Answers"}),
        )]),
        Message::assistant("drafting plan").with_tool_calls(vec![
            ToolCall::new(
                "write_file",
                serde_json::json!({"file_path": "plan.md", "content": "# Plan"}),
            ),
            ToolCall::new(
                "review_plan",
                serde_json::json!({
                    "plan_type": "implementation",
                    "plan_content": {
                        "title": "Implementation Plan",
                        "description": "Do the work",
                        "sections": [
                            {"title": "Overview", "description": "what and why"},
                            {"title": "Changes", "description": "file by file"}
                        ]
                    }
                }),
            ),
        ]),
        Message::assistant("writing tasks").with_tool_calls(vec![ToolCall::new(
            "write_file",
            serde_json::json!({"file_path": "tasks.md", "content": "- [ ] task 1"}),
        )]),
        Message::assistant("all phases complete"),
    ];
    let agent = agent_with(responses);
    let mut state = AgentState::new();

    // One run keeps going until the model stops calling tools, so the whole
    // workflow plays out with one interruption for plan review.
    let run = agent
        .run(&mut state, Some(Message::user("plan the migration")))
        .await;
    assert_eq!(run.outcome, LoopOutcome::AwaitingApproval);
    assert_eq!(state.phase.current_phase, Phase::Planning);
    assert_eq!(
        state.phase.completed_phases,
        vec![Phase::Investigation, Phase::Discussion]
    );

    let interrupt = run.interrupt.unwrap();
    let status = agent
        .resume(
            &mut state,
            &interrupt.plan_id,
            &PlanApprovalResponse {
                action: ApprovalAction::Approve,
                modifications: None,
                feedback: None,
            },
        )
        .unwrap();
    assert_eq!(status, PlanStatus::Approved);

    let run = agent.run(&mut state, None).await;
    assert_eq!(run.outcome, LoopOutcome::Terminal);
    assert_eq!(state.phase.current_phase, Phase::Complete);
    assert!(state.files.contains_key("tasks.md"));
    assert!(state.tool_messages_linked());
}

#[tokio::test]
async fn oversized_tool_output_round_trips_through_the_archive() {
    // A content-producing tool returns 6 000 chars; the dispatcher rewrites
    // it to a marker, and the scripted agent follows the instructions by
    // archiving the content into the virtual filesystem.
    let big = vec!["x".repeat(50); 120].join("\n");
    let responses = vec![
        Message::assistant("reading the doc").with_tool_calls(vec![ToolCall::new(
            "read_file",
            serde_json::json!({"file_path": "doc.txt"}),
        )]),
        Message::assistant("archiving").with_tool_calls(vec![ToolCall::new(
            "write_file",
            serde_json::json!({"file_path": "mcp_content_archived.json", "content": "archived"}),
        )]),
        Message::assistant("done"),
    ];
    let mut registry = ToolRegistry::new();
    register_builtins(&mut registry);
    let agent = AgentLoop::builder(ScriptedProvider::new(responses))
        .config(RuntimeConfig::for_model("test-model"))
        .orchestrator(Orchestrator::default())
        .tools(registry)
        .content_producing("read_file")
        .build();

    let mut state = AgentState::new();
    reduce(&mut state, StateUpdate::write_file("doc.txt", &big));

    let run = agent.run(&mut state, Some(Message::user("get the doc"))).await;
    assert_eq!(run.outcome, LoopOutcome::Terminal);

    let marker = state
        .messages
        .iter()
        .find(|m| m.is_archive_marker())
        .expect("archive marker message");
    assert!(marker.content.starts_with("[CONTENT TO ARCHIVE] IMMEDIATE"));
    assert!(marker.content.contains("Suggested filename: mcp_"));
    assert!(state.files.contains_key("mcp_content_archived.json"));
}

#[tokio::test]
async fn blocked_phase_reports_missing_requirements() {
    let orchestrator = Orchestrator::default();
    let state = AgentState::new();
    let check = orchestrator.validate_transition(&state);
    assert!(!check.ok);
    assert!(check.next.is_none());
    assert!(check.missing.iter().any(|m| m.contains("findings.md")));
}

#[tokio::test]
async fn sessions_round_trip_mid_workflow() {
    let responses = vec![Message::assistant("noted")];
    let agent = agent_with(responses);
    let mut state = AgentState::new();
    agent
        .run(&mut state, Some(Message::user("remember this")))
        .await;

    let store = InMemorySessionStore::new();
    let session = Session::with_state("workflow-1", state.clone());
    store.save(&session).await.unwrap();

    let loaded = store.load("workflow-1").await.unwrap();
    assert_eq!(loaded.state, state);
    // Byte-stable serialisation.
    let a = serde_json::to_string(&loaded.state).unwrap();
    let b = serde_json::to_string(&state).unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn compression_outcome_feeds_the_records_and_respects_floors() {
    let config = ContextConfig {
        max_context_window: 2_000,
        ..Default::default()
    };
    let compressor = Compressor::selective_only(config.clone());
    let messages: Vec<Message> = (0..50)
        .map(|i| Message::user(format!("turn {i}: {}", "filler ".repeat(30))))
        .collect();
    let tokens = TokenCounter::new().estimate_messages(&messages, "test-model");
    let metrics = ContextMetrics::from_tokens(
        tokens,
        config.max_context_window,
        config.trigger_threshold,
        config.post_tool_threshold,
    );

    let outcome = compressor.compress(&messages, &metrics, "test-model").await;
    assert!(outcome.changed);

    let mut state = AgentState::new();
    let mut update = StateUpdate::replace_messages(outcome.messages);
    update.compression_records.push(outcome.record.unwrap());
    reduce(&mut state, update);

    assert_eq!(state.compression_history.len(), 1);
    let record = &state.compression_history[0];
    assert_eq!(record.original_count, 50);
    assert!(record.reduction_pct >= 30.0);
    assert!(state.messages.len() < 50);
}
