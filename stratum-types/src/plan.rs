//! Todos and human-reviewable plans.

use serde::{Deserialize, Serialize};

/// Lifecycle of a todo item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    /// Not started.
    Pending,
    /// Currently being worked on.
    InProgress,
    /// Done.
    Completed,
}

/// A task-tracking item. Owned by the orchestrator; never compressed away.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    /// Stable identifier.
    pub id: String,
    /// What needs doing.
    pub content: String,
    /// Current status.
    pub status: TodoStatus,
}

impl Todo {
    /// Create a pending todo with a fresh id.
    #[must_use]
    pub fn pending(content: impl Into<String>) -> Self {
        Self {
            id: format!("todo_{}", uuid::Uuid::new_v4().simple()),
            content: content.into(),
            status: TodoStatus::Pending,
        }
    }
}

/// Review status of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// Awaiting human review.
    Pending,
    /// Approved as-is; the owning phase may advance.
    Approved,
    /// Rejected; replanning required.
    Rejected,
    /// Edited by the reviewer; re-presented on the next iteration.
    Modified,
}

/// One section of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSection {
    /// Section title.
    pub title: String,
    /// What the section covers.
    pub description: String,
    /// Rough size estimate, e.g. "2-3 pages".
    #[serde(default)]
    pub estimated_length: String,
    /// Content category, e.g. "technical", "summary".
    #[serde(default)]
    pub content_type: String,
}

/// An execution plan produced by a sub-agent and gated on human approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Stable identifier.
    pub id: String,
    /// Plan category, e.g. "documentation", "implementation".
    pub plan_type: String,
    /// Human-readable title.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Ordered sections.
    pub sections: Vec<PlanSection>,
    /// Review status.
    pub status: PlanStatus,
    /// Reviewer feedback, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl Plan {
    /// Create a pending plan with a fresh id.
    #[must_use]
    pub fn new(
        plan_type: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        sections: Vec<PlanSection>,
    ) -> Self {
        Self {
            id: format!("plan_{}", uuid::Uuid::new_v4().simple()),
            plan_type: plan_type.into(),
            title: title.into(),
            description: description.into(),
            sections,
            status: PlanStatus::Pending,
            feedback: None,
        }
    }

    /// Render the plan as markdown for human review.
    #[must_use]
    pub fn format_for_review(&self) -> String {
        let mut out = format!(
            "# {}\n\n## Plan Type\n{}\n\n## Description\n{}\n\n## Planned Sections\n",
            self.title, self.plan_type, self.description
        );
        if self.sections.is_empty() {
            out.push_str("\n*No sections defined*\n");
        } else {
            for (i, section) in self.sections.iter().enumerate() {
                out.push_str(&format!(
                    "\n### {}. {}\n- **Description:** {}\n- **Estimated Length:** {}\n- **Content Type:** {}\n",
                    i + 1,
                    section.title,
                    section.description,
                    if section.estimated_length.is_empty() {
                        "Unknown length"
                    } else {
                        section.estimated_length.as_str()
                    },
                    if section.content_type.is_empty() {
                        "general"
                    } else {
                        section.content_type.as_str()
                    },
                ));
            }
        }
        out.push_str(&format!(
            "\n## Summary\n- **Total Sections:** {}\n- **Plan ID:** {}\n",
            self.sections.len(),
            self.id
        ));
        out
    }
}

/// The interrupt payload emitted when a plan needs human review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanApprovalRequest {
    /// Id of the plan under review.
    pub plan_id: String,
    /// Plan category.
    pub plan_type: String,
    /// Markdown rendering of the plan for the reviewer.
    pub formatted_plan: String,
    /// The actions the reviewer may take, keyed by action name.
    pub options: std::collections::BTreeMap<String, String>,
}

impl PlanApprovalRequest {
    /// Build the standard approval request for a plan.
    #[must_use]
    pub fn for_plan(plan: &Plan) -> Self {
        let mut options = std::collections::BTreeMap::new();
        options.insert(
            "approve".to_string(),
            "Approve plan as-is and proceed with execution".to_string(),
        );
        options.insert(
            "edit".to_string(),
            "Request specific modifications to the plan".to_string(),
        );
        options.insert(
            "reject".to_string(),
            "Reject plan completely and request replanning".to_string(),
        );
        Self {
            plan_id: plan.id.clone(),
            plan_type: plan.plan_type.clone(),
            formatted_plan: plan.format_for_review(),
            options,
        }
    }
}

/// The reviewer's action on a pending plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalAction {
    /// Proceed with the plan as-is.
    Approve,
    /// Apply the requested modifications and re-present.
    Edit,
    /// Discard the plan; replanning required.
    Reject,
}

/// The host's response to a [`PlanApprovalRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanApprovalResponse {
    /// The chosen action.
    pub action: ApprovalAction,
    /// Requested modifications, meaningful for [`ApprovalAction::Edit`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifications: Option<String>,
    /// Free-form reviewer feedback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}
