//! Serialization round-trip tests for the message model.

use stratum_types::{meta, Message, Phase, PhaseState, Plan, PlanSection, Role, Todo, ToolCall};

#[test]
fn message_roundtrip_is_byte_stable() {
    let msg = Message::assistant("Let me look at that.").with_tool_calls(vec![ToolCall {
        id: "call_1".into(),
        name: "read_file".into(),
        arguments: serde_json::json!({"file_path": "findings.md"}),
    }]);

    let first = serde_json::to_string(&msg).unwrap();
    let back: Message = serde_json::from_str(&first).unwrap();
    let second = serde_json::to_string(&back).unwrap();
    assert_eq!(first, second);
}

#[test]
fn tool_message_links_to_call() {
    let call = ToolCall::new("ls", serde_json::json!({}));
    let result = Message::tool("ls", call.id.clone(), "[]");
    assert_eq!(result.role, Role::Tool);
    assert_eq!(result.tool_call_id.as_deref(), Some(call.id.as_str()));
}

#[test]
fn compression_summary_metadata_survives_roundtrip() {
    let summary = Message::system("[Conversation Summary - 12 messages compressed]")
        .with_metadata(meta::TYPE, meta::COMPRESSION_SUMMARY.into())
        .with_metadata(meta::ORIGINAL_COUNT, 12.into())
        .with_metadata(meta::REDUCTION_PCT, serde_json::json!(64.2));

    let json = serde_json::to_value(&summary).unwrap();
    let back: Message = serde_json::from_value(json).unwrap();
    assert!(back.is_compression_summary());
    assert_eq!(back.metadata[meta::ORIGINAL_COUNT], serde_json::json!(12));
}

#[test]
fn phase_state_roundtrip() {
    let mut state = PhaseState::default();
    state.record_output("findings.md", serde_json::json!("## Findings"));
    state.completed_phases.push(Phase::Investigation);

    let json = serde_json::to_string(&state).unwrap();
    let back: PhaseState = serde_json::from_str(&json).unwrap();
    assert_eq!(back, state);
}

#[test]
fn plan_and_todo_roundtrip() {
    let plan = Plan::new(
        "implementation",
        "Implementation Plan",
        "Build the feature",
        vec![PlanSection {
            title: "Executive Summary".into(),
            description: "High-level overview".into(),
            estimated_length: "1-2 pages".into(),
            content_type: "summary".into(),
        }],
    );
    let back: Plan = serde_json::from_str(&serde_json::to_string(&plan).unwrap()).unwrap();
    assert_eq!(back, plan);

    let todo = Todo::pending("Investigate auth module");
    let back: Todo = serde_json::from_str(&serde_json::to_string(&todo).unwrap()).unwrap();
    assert_eq!(back, todo);
}
