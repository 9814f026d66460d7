//! The orchestrator: transition validation, advancement, and plan review.

use stratum_state::AgentState;
use stratum_types::{
    ApprovalAction, Phase, PhaseError, Plan, PlanApprovalResponse, PlanSection, PlanStatus,
    Todo, TodoStatus, ValidationResult,
};

use crate::catalog::{PhaseCatalog, PhaseSpec};

/// The active phase configuration with its dynamic parts rendered.
pub struct PhaseAgent<'a> {
    /// The static spec.
    pub spec: &'a PhaseSpec,
    /// Todos generated from the current state.
    pub todos: Vec<Todo>,
    /// Tool names visible to the model.
    pub tool_names: Vec<String>,
    /// Rendered phase prompt.
    pub prompt: String,
}

/// Result of evaluating a transition.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionCheck {
    /// Whether every requirement passed.
    pub ok: bool,
    /// The linear successor when `ok`.
    pub next: Option<Phase>,
    /// Human-readable missing-requirement strings.
    pub missing: Vec<String>,
}

/// Render a todo list for a prompt, one line per item with a status marker.
#[must_use]
pub fn format_todos(todos: &[Todo]) -> String {
    if todos.is_empty() {
        return "No specific tasks generated".to_string();
    }
    todos
        .iter()
        .map(|t| {
            let marker = match t.status {
                TodoStatus::Pending => "[ ]",
                TodoStatus::InProgress => "[>]",
                TodoStatus::Completed => "[x]",
            };
            format!("{marker} {}", t.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drives the linear phase workflow.
pub struct Orchestrator {
    catalog: PhaseCatalog,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(PhaseCatalog::default())
    }
}

impl Orchestrator {
    /// Create an orchestrator over a catalog.
    #[must_use]
    pub fn new(catalog: PhaseCatalog) -> Self {
        Self { catalog }
    }

    /// The catalog in use.
    #[must_use]
    pub fn catalog(&self) -> &PhaseCatalog {
        &self.catalog
    }

    /// The active phase configuration with dynamically injected todos, tool
    /// subset, and rendered prompt.
    ///
    /// # Errors
    ///
    /// [`PhaseError::AlreadyComplete`] when the workflow is finished.
    pub fn current_agent<'a>(&'a self, state: &AgentState) -> Result<PhaseAgent<'a>, PhaseError> {
        let phase = state.phase.current_phase;
        let spec = self
            .catalog
            .spec(phase)
            .ok_or(PhaseError::AlreadyComplete)?;
        let todos = (spec.todo_template)(state);

        let outputs = if spec.required_outputs.is_empty() {
            "No specific output required".to_string()
        } else {
            spec.required_outputs
                .iter()
                .map(|o| format!("- {o}"))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let prompt = format!(
            "You are the {label} for the {name} phase ({duration}).\n\n\
             Goal: {goal}\n\n\
             Current tasks:\n{todos}\n\n\
             Required outputs before this phase can complete:\n{outputs}",
            label = spec.label,
            name = spec.name,
            duration = spec.duration_estimate,
            goal = spec.goal,
            todos = format_todos(&todos),
        );

        Ok(PhaseAgent {
            tool_names: spec.tool_names.clone(),
            spec,
            todos,
            prompt,
        })
    }

    /// Evaluate whether the current phase may transition.
    ///
    /// All-or-nothing: every required output must be present, every rule must
    /// pass, and an approval-gated phase needs an approved plan. A failing
    /// check contributes a missing-requirement string; nothing is fabricated.
    #[must_use]
    pub fn validate_transition(&self, state: &AgentState) -> TransitionCheck {
        let phase = state.phase.current_phase;
        let Some(spec) = self.catalog.spec(phase) else {
            return TransitionCheck {
                ok: false,
                next: None,
                missing: vec!["workflow already complete".to_string()],
            };
        };

        let mut missing = Vec::new();
        let outputs = state.phase.outputs(phase);
        for key in &spec.required_outputs {
            if !outputs.contains_key(key) && !state.files.contains_key(key) {
                missing.push(format!("{key} missing"));
            }
        }
        for rule in &spec.validation_rules {
            if !rule.passes(state) {
                missing.push(rule.description.clone());
            }
        }
        if spec.requires_approval {
            let approved = state
                .approved_plan
                .as_ref()
                .is_some_and(|p| p.status == PlanStatus::Approved);
            if !approved {
                missing.push("approved plan required".to_string());
            }
        }

        missing.sort();
        missing.dedup();
        let ok = missing.is_empty();
        TransitionCheck {
            ok,
            next: if ok { phase.successor() } else { None },
            missing,
        }
    }

    /// Advance to the next phase if validation passes.
    ///
    /// On success, appends the completing phase to `completed_phases` (exactly
    /// once), sets the successor as current, records the validation result,
    /// and writes a context summary. A failed validation leaves the state
    /// untouched and returns the check.
    ///
    /// # Errors
    ///
    /// [`PhaseError::AlreadyComplete`] when called on the terminal phase.
    pub fn advance(&self, state: &mut AgentState) -> Result<TransitionCheck, PhaseError> {
        let phase = state.phase.current_phase;
        if phase == Phase::Complete {
            return Err(PhaseError::AlreadyComplete);
        }

        let check = self.validate_transition(state);
        state.phase.validation_status.insert(
            phase,
            ValidationResult {
                valid: check.ok,
                completed: Vec::new(),
                missing: check.missing.clone(),
            },
        );

        if !check.ok {
            tracing::info!(
                phase = %phase,
                missing = ?check.missing,
                "phase transition blocked"
            );
            return Ok(check);
        }

        let next = check.next.unwrap_or(Phase::Complete);
        if !state.phase.completed_phases.contains(&phase) {
            state.phase.completed_phases.push(phase);
        }
        state.phase.current_phase = next;
        state.context_summary = format!("Advanced from {phase} to {next}");
        tracing::info!(from = %phase, to = %next, "phase advanced");
        Ok(check)
    }

    /// Request a transition to an explicit phase.
    ///
    /// Anything other than the linear successor is malformed and fatal, per
    /// the transition policy; requesting the successor behaves like
    /// [`Orchestrator::advance`].
    pub fn request_transition(
        &self,
        state: &mut AgentState,
        to: Phase,
    ) -> Result<TransitionCheck, PhaseError> {
        let from = state.phase.current_phase;
        if from.successor() != Some(to) {
            return Err(PhaseError::MalformedTransition {
                from: from.name().to_string(),
                to: to.name().to_string(),
            });
        }
        self.advance(state)
    }

    /// Map a human plan-review response onto state.
    ///
    /// - approve: plan stored as approved, removed from pending; the owning
    ///   phase may now advance.
    /// - edit: modifications applied, plan re-stored as pending with status
    ///   `modified` so the next iteration re-presents it.
    /// - reject: plan purged from pending; replanning is required and the
    ///   phase stays active.
    ///
    /// # Errors
    ///
    /// [`PhaseError::Unknown`] when `plan_id` matches no pending plan.
    pub fn apply_approval(
        &self,
        state: &mut AgentState,
        plan_id: &str,
        response: &PlanApprovalResponse,
    ) -> Result<PlanStatus, PhaseError> {
        let index = state
            .pending_plans
            .iter()
            .position(|p| p.id == plan_id)
            .ok_or_else(|| PhaseError::Unknown(format!("no pending plan {plan_id}")))?;

        match response.action {
            ApprovalAction::Approve => {
                let mut plan = state.pending_plans.remove(index);
                plan.status = PlanStatus::Approved;
                plan.feedback = response.feedback.clone();
                tracing::info!(plan_id, "plan approved");
                state.approved_plan = Some(plan);
                Ok(PlanStatus::Approved)
            }
            ApprovalAction::Edit => {
                let plan = &mut state.pending_plans[index];
                apply_modifications(plan, response.modifications.as_deref().unwrap_or(""));
                plan.status = PlanStatus::Modified;
                plan.feedback = response.feedback.clone();
                tracing::info!(plan_id, "plan modified, re-pending");
                Ok(PlanStatus::Modified)
            }
            ApprovalAction::Reject => {
                let mut plan = state.pending_plans.remove(index);
                plan.status = PlanStatus::Rejected;
                plan.feedback = response
                    .feedback
                    .clone()
                    .or_else(|| Some("Plan rejected by user".to_string()));
                tracing::info!(plan_id, feedback = ?plan.feedback, "plan rejected");
                Ok(PlanStatus::Rejected)
            }
        }
    }
}

/// Apply text-based modifications to a plan.
///
/// Keyword-driven: a request naming "security" appends a security section; a
/// request to expand the architecture section grows its estimate. The raw
/// request is always recorded in the description.
fn apply_modifications(plan: &mut Plan, modifications: &str) {
    if modifications.is_empty() {
        return;
    }
    plan.description = format!(
        "{}\n\n**Modifications requested:** {modifications}",
        plan.description
    );
    let lower = modifications.to_lowercase();

    if lower.contains("security") {
        plan.sections.push(PlanSection {
            title: "Security Analysis".into(),
            description: "Security considerations and recommendations".into(),
            estimated_length: "2-3 pages".into(),
            content_type: "security".into(),
        });
    }
    if lower.contains("expand") && lower.contains("architecture") {
        for section in &mut plan.sections {
            if section.title.to_lowercase().contains("architecture") {
                section.description.push_str(" (expanded per user request)");
                if section.estimated_length.contains("2-3") {
                    section.estimated_length = "4-6 pages".into();
                }
            }
        }
    }
}
