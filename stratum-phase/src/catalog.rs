//! Static per-phase configuration.

use std::sync::Arc;

use stratum_state::AgentState;
use stratum_types::{Phase, Todo};

/// A predicate over agent state with a human-readable description.
///
/// The description doubles as the missing-requirement string when the rule
/// fails; the orchestrator never fabricates outputs to satisfy one.
#[derive(Clone)]
pub struct ValidationRule {
    /// What this rule demands, phrased as a requirement.
    pub description: String,
    check: Arc<dyn Fn(&AgentState) -> bool + Send + Sync>,
}

impl ValidationRule {
    /// Create a rule from a description and predicate.
    pub fn new(
        description: impl Into<String>,
        check: impl Fn(&AgentState) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            description: description.into(),
            check: Arc::new(check),
        }
    }

    /// Evaluate the rule.
    #[must_use]
    pub fn passes(&self, state: &AgentState) -> bool {
        (self.check)(state)
    }
}

/// Generates phase-appropriate todos from the current state.
pub type TodoTemplate = Arc<dyn Fn(&AgentState) -> Vec<Todo> + Send + Sync>;

/// Static configuration of one phase.
#[derive(Clone)]
pub struct PhaseSpec {
    /// The phase this spec configures.
    pub phase: Phase,
    /// Display name.
    pub name: String,
    /// What the phase is for.
    pub goal: String,
    /// Rough duration estimate shown in prompts.
    pub duration_estimate: String,
    /// Short role label for the phase agent.
    pub label: String,
    /// Names of the tools visible to the model in this phase.
    pub tool_names: Vec<String>,
    /// Output keys that must exist in `phase_outputs` before transition.
    pub required_outputs: Vec<String>,
    /// Additional predicates, all of which must pass.
    pub validation_rules: Vec<ValidationRule>,
    /// Whether leaving this phase requires an approved plan.
    pub requires_approval: bool,
    /// Generator for the phase's dynamic todos.
    pub todo_template: TodoTemplate,
}

/// The full set of phase specs, loaded once.
pub struct PhaseCatalog {
    specs: Vec<PhaseSpec>,
}

impl PhaseCatalog {
    /// Build a catalog from explicit specs.
    #[must_use]
    pub fn new(specs: Vec<PhaseSpec>) -> Self {
        Self { specs }
    }

    /// The spec for `phase`, if the workflow defines one. The terminal
    /// phase has no spec.
    #[must_use]
    pub fn spec(&self, phase: Phase) -> Option<&PhaseSpec> {
        self.specs.iter().find(|s| s.phase == phase)
    }
}

fn todo(content: &str) -> Todo {
    Todo::pending(content)
}

impl Default for PhaseCatalog {
    /// The stock four-phase planning workflow.
    fn default() -> Self {
        let base_tools = |extra: &[&str]| -> Vec<String> {
            ["write_todos", "ls", "read_file", "write_file", "edit_file"]
                .iter()
                .chain(extra)
                .map(|s| (*s).to_string())
                .collect()
        };

        Self::new(vec![
            PhaseSpec {
                phase: Phase::Investigation,
                name: "investigation".into(),
                goal: "Explore the project and record what exists, how it fits together, \
                       and where the risks are."
                    .into(),
                duration_estimate: "15-20 minutes".into(),
                label: "Investigator".into(),
                tool_names: base_tools(&[]),
                required_outputs: vec!["findings.md".into()],
                validation_rules: vec![ValidationRule::new(
                    "findings.md written to the virtual filesystem",
                    |state| state.files.contains_key("findings.md"),
                )],
                requires_approval: false,
                todo_template: Arc::new(|_| {
                    vec![
                        todo("Survey the project structure"),
                        todo("Identify the components affected by the request"),
                        todo("Record findings in findings.md"),
                    ]
                }),
            },
            PhaseSpec {
                phase: Phase::Discussion,
                name: "discussion".into(),
                goal: "Resolve open questions with the user before committing to a plan.".into(),
                duration_estimate: "5-10 minutes".into(),
                label: "Interviewer".into(),
                tool_names: base_tools(&[]),
                required_outputs: vec!["questions.md".into()],
                validation_rules: vec![ValidationRule::new(
                    "questions.md written with answered clarifications",
                    |state| state.files.contains_key("questions.md"),
                )],
                requires_approval: false,
                todo_template: Arc::new(|_| {
                    vec![
                        todo("List the ambiguities discovered during investigation"),
                        todo("Ask the user targeted clarifying questions"),
                        todo("Record answers in questions.md"),
                    ]
                }),
            },
            PhaseSpec {
                phase: Phase::Planning,
                name: "planning".into(),
                goal: "Produce the implementation plan and get it approved.".into(),
                duration_estimate: "10-15 minutes".into(),
                label: "Planner".into(),
                tool_names: base_tools(&["review_plan"]),
                required_outputs: vec!["plan.md".into()],
                validation_rules: vec![ValidationRule::new(
                    "plan.md written to the virtual filesystem",
                    |state| state.files.contains_key("plan.md"),
                )],
                requires_approval: true,
                todo_template: Arc::new(|state| {
                    let mut todos = vec![
                        todo("Draft the implementation plan in plan.md"),
                        todo("Submit the plan with review_plan"),
                    ];
                    if state.pending_plans.iter().any(|p| p.feedback.is_some()) {
                        todos.push(todo("Address reviewer feedback on the plan"));
                    }
                    todos
                }),
            },
            PhaseSpec {
                phase: Phase::TaskGeneration,
                name: "task_generation".into(),
                goal: "Break the approved plan into ordered, executable tasks.".into(),
                duration_estimate: "5-10 minutes".into(),
                label: "Task Writer".into(),
                tool_names: base_tools(&[]),
                required_outputs: vec!["tasks.md".into()],
                validation_rules: vec![ValidationRule::new(
                    "tasks.md written with one entry per plan section",
                    |state| state.files.contains_key("tasks.md"),
                )],
                requires_approval: false,
                todo_template: Arc::new(|state| {
                    let sections = state
                        .approved_plan
                        .as_ref()
                        .map_or(0, |p| p.sections.len());
                    let mut todos = vec![todo("Write tasks.md from the approved plan")];
                    if sections > 0 {
                        todos.push(todo("Cover every plan section with at least one task"));
                    }
                    todos
                }),
            },
        ])
    }
}
