//! Built-in state tools: todos, the virtual file system, and plan review.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use stratum_state::{AgentState, StateUpdate};
use stratum_types::{
    Plan, PlanApprovalRequest, PlanSection, Todo, ToolError,
};

use crate::registry::ToolRegistry;
use crate::tool::{ToolDyn, ToolResponse};

/// Register every built-in tool into a registry.
pub fn register_builtins(registry: &mut ToolRegistry) {
    registry.register(Arc::new(WriteTodos));
    registry.register(Arc::new(Ls));
    registry.register(Arc::new(ReadFile));
    registry.register(Arc::new(WriteFile));
    registry.register(Arc::new(EditFile));
    registry.register(Arc::new(ReviewPlan));
}

fn parse_input<T: for<'de> Deserialize<'de>>(input: serde_json::Value) -> Result<T, ToolError> {
    serde_json::from_value(input).map_err(|e| ToolError::InvalidInput(e.to_string()))
}

// --- write_todos ---

/// Replaces the todo list wholesale.
pub struct WriteTodos;

#[derive(Deserialize)]
struct WriteTodosArgs {
    todos: Vec<Todo>,
}

#[async_trait]
impl ToolDyn for WriteTodos {
    fn name(&self) -> &str {
        "write_todos"
    }

    fn description(&self) -> &str {
        "Replace the session todo list. Use to plan work and track progress; \
         statuses are pending, in_progress, and completed."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "todos": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": {"type": "string"},
                            "content": {"type": "string"},
                            "status": {"enum": ["pending", "in_progress", "completed"]}
                        },
                        "required": ["id", "content", "status"]
                    }
                }
            },
            "required": ["todos"]
        })
    }

    async fn call(
        &self,
        input: serde_json::Value,
        _state: &AgentState,
    ) -> Result<ToolResponse, ToolError> {
        let args: WriteTodosArgs = parse_input(input)?;
        let count = args.todos.len();
        Ok(
            ToolResponse::ok(format!("Updated todo list to {count} items")).with_update(
                StateUpdate {
                    todos: Some(args.todos),
                    ..Default::default()
                },
            ),
        )
    }
}

// --- ls ---

/// Lists all virtual files.
pub struct Ls;

#[async_trait]
impl ToolDyn for Ls {
    fn name(&self) -> &str {
        "ls"
    }

    fn description(&self) -> &str {
        "List all files in the virtual filesystem."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({"type": "object", "properties": {}})
    }

    async fn call(
        &self,
        _input: serde_json::Value,
        state: &AgentState,
    ) -> Result<ToolResponse, ToolError> {
        let paths: Vec<&String> = state.files.keys().collect();
        Ok(ToolResponse::ok(
            serde_json::to_string(&paths).map_err(|e| ToolError::ExecutionFailed(e.to_string()))?,
        ))
    }
}

// --- read_file ---

/// Reads a virtual file with offset/limit and `cat -n` numbering.
pub struct ReadFile;

#[derive(Deserialize)]
struct ReadFileArgs {
    file_path: String,
    #[serde(default)]
    offset: usize,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    2_000
}

#[async_trait]
impl ToolDyn for ReadFile {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a file from the virtual filesystem, with optional line offset \
         and limit. Output is numbered like cat -n."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {"type": "string"},
                "offset": {"type": "integer", "minimum": 0},
                "limit": {"type": "integer", "minimum": 1}
            },
            "required": ["file_path"]
        })
    }

    async fn call(
        &self,
        input: serde_json::Value,
        state: &AgentState,
    ) -> Result<ToolResponse, ToolError> {
        let args: ReadFileArgs = parse_input(input)?;
        let Some(content) = state.files.get(&args.file_path) else {
            return Ok(ToolResponse::error(format!(
                "Error: File '{}' not found",
                args.file_path
            )));
        };
        if content.trim().is_empty() {
            return Ok(ToolResponse::ok(
                "System reminder: File exists but has empty contents",
            ));
        }

        let lines: Vec<&str> = content.lines().collect();
        if args.offset >= lines.len() {
            return Ok(ToolResponse::error(format!(
                "Error: Line offset {} exceeds file length ({} lines)",
                args.offset,
                lines.len()
            )));
        }

        let end = (args.offset + args.limit).min(lines.len());
        let mut out = Vec::with_capacity(end - args.offset);
        for (i, line) in lines[args.offset..end].iter().enumerate() {
            let mut line = *line;
            if line.len() > 2_000 {
                let mut boundary = 2_000;
                while !line.is_char_boundary(boundary) {
                    boundary -= 1;
                }
                line = &line[..boundary];
            }
            out.push(format!("{:6}\t{}", args.offset + i + 1, line));
        }
        Ok(ToolResponse::ok(out.join("\n")))
    }
}

// --- write_file ---

/// Writes a virtual file (create or overwrite).
pub struct WriteFile;

#[derive(Deserialize)]
struct WriteFileArgs {
    file_path: String,
    content: String,
}

#[async_trait]
impl ToolDyn for WriteFile {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write a file to the virtual filesystem, creating or overwriting it."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {"type": "string"},
                "content": {"type": "string"}
            },
            "required": ["file_path", "content"]
        })
    }

    async fn call(
        &self,
        input: serde_json::Value,
        _state: &AgentState,
    ) -> Result<ToolResponse, ToolError> {
        let args: WriteFileArgs = parse_input(input)?;
        Ok(
            ToolResponse::ok(format!("Updated file {}", args.file_path))
                .with_update(StateUpdate::write_file(args.file_path, args.content)),
        )
    }
}

// --- edit_file ---

/// Replaces a string in a virtual file, with a uniqueness check.
pub struct EditFile;

#[derive(Deserialize)]
struct EditFileArgs {
    file_path: String,
    old_string: String,
    new_string: String,
    #[serde(default)]
    replace_all: bool,
}

#[async_trait]
impl ToolDyn for EditFile {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Replace a string in a virtual file. The old string must be unique \
         unless replace_all is set."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {"type": "string"},
                "old_string": {"type": "string"},
                "new_string": {"type": "string"},
                "replace_all": {"type": "boolean"}
            },
            "required": ["file_path", "old_string", "new_string"]
        })
    }

    async fn call(
        &self,
        input: serde_json::Value,
        state: &AgentState,
    ) -> Result<ToolResponse, ToolError> {
        let args: EditFileArgs = parse_input(input)?;
        let Some(content) = state.files.get(&args.file_path) else {
            return Ok(ToolResponse::error(format!(
                "Error: File '{}' not found",
                args.file_path
            )));
        };

        let occurrences = content.matches(&args.old_string).count();
        if occurrences == 0 {
            return Ok(ToolResponse::error(format!(
                "Error: String not found in file: '{}'",
                args.old_string
            )));
        }
        if occurrences > 1 && !args.replace_all {
            return Ok(ToolResponse::error(format!(
                "Error: String '{}' appears {occurrences} times in file. Use \
                 replace_all=true to replace all instances, or provide a more \
                 specific string with surrounding context.",
                args.old_string
            )));
        }

        let (new_content, message) = if args.replace_all {
            (
                content.replace(&args.old_string, &args.new_string),
                format!(
                    "Successfully replaced {occurrences} instance(s) of the string in '{}'",
                    args.file_path
                ),
            )
        } else {
            (
                content.replacen(&args.old_string, &args.new_string, 1),
                format!("Successfully replaced string in '{}'", args.file_path),
            )
        };

        Ok(ToolResponse::ok(message)
            .with_update(StateUpdate::write_file(args.file_path, new_content)))
    }
}

// --- review_plan ---

/// Stores a plan as pending and raises the human-approval interrupt.
pub struct ReviewPlan;

#[derive(Deserialize)]
struct ReviewPlanArgs {
    plan_type: String,
    plan_content: PlanContent,
}

#[derive(Deserialize)]
struct PlanContent {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    sections: Vec<PlanSection>,
}

#[async_trait]
impl ToolDyn for ReviewPlan {
    fn name(&self) -> &str {
        "review_plan"
    }

    fn description(&self) -> &str {
        "Present a plan for human review and approval before execution. The \
         loop suspends until the reviewer responds with approve, edit, or \
         reject."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "plan_type": {"type": "string"},
                "plan_content": {
                    "type": "object",
                    "properties": {
                        "title": {"type": "string"},
                        "description": {"type": "string"},
                        "sections": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "title": {"type": "string"},
                                    "description": {"type": "string"},
                                    "estimated_length": {"type": "string"},
                                    "content_type": {"type": "string"}
                                },
                                "required": ["title", "description"]
                            }
                        }
                    }
                }
            },
            "required": ["plan_type", "plan_content"]
        })
    }

    async fn call(
        &self,
        input: serde_json::Value,
        _state: &AgentState,
    ) -> Result<ToolResponse, ToolError> {
        let args: ReviewPlanArgs = parse_input(input)?;
        let title = args
            .plan_content
            .title
            .unwrap_or_else(|| format!("{} Plan", capitalize(&args.plan_type)));
        let plan = Plan::new(
            args.plan_type.clone(),
            title,
            args.plan_content.description,
            args.plan_content.sections,
        );
        let request = PlanApprovalRequest::for_plan(&plan);

        Ok(ToolResponse::ok(format!(
            "Plan submitted for review. Plan type: {}. Waiting for human approval...",
            args.plan_type
        ))
        .with_update(StateUpdate {
            pending_plans: vec![plan],
            ..Default::default()
        })
        .with_interrupt(request))
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
