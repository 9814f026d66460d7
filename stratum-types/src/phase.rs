//! The planning workflow's phase enumeration and per-phase state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A stage of the planning workflow. Transitions are strictly linear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Explore the codebase and gather findings.
    Investigation,
    /// Clarify requirements with the user.
    Discussion,
    /// Produce the implementation plan (approval-gated).
    Planning,
    /// Break the approved plan into executable tasks.
    TaskGeneration,
    /// Terminal state.
    Complete,
}

impl Phase {
    /// The unique linear successor, or `None` for [`Phase::Complete`].
    #[must_use]
    pub fn successor(self) -> Option<Phase> {
        match self {
            Phase::Investigation => Some(Phase::Discussion),
            Phase::Discussion => Some(Phase::Planning),
            Phase::Planning => Some(Phase::TaskGeneration),
            Phase::TaskGeneration => Some(Phase::Complete),
            Phase::Complete => None,
        }
    }

    /// All workflow phases in order, excluding the terminal state.
    #[must_use]
    pub fn all() -> [Phase; 4] {
        [
            Phase::Investigation,
            Phase::Discussion,
            Phase::Planning,
            Phase::TaskGeneration,
        ]
    }

    /// Stable snake_case name, matching the serde representation.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Phase::Investigation => "investigation",
            Phase::Discussion => "discussion",
            Phase::Planning => "planning",
            Phase::TaskGeneration => "task_generation",
            Phase::Complete => "complete",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Phase {
    type Err = crate::PhaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "investigation" => Ok(Phase::Investigation),
            "discussion" => Ok(Phase::Discussion),
            "planning" => Ok(Phase::Planning),
            "task_generation" => Ok(Phase::TaskGeneration),
            "complete" => Ok(Phase::Complete),
            other => Err(crate::PhaseError::Unknown(other.to_string())),
        }
    }
}

/// Result of evaluating a phase's validation rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether every rule passed.
    pub valid: bool,
    /// Descriptions of the rules that passed.
    #[serde(default)]
    pub completed: Vec<String>,
    /// Human-readable missing-requirement strings for the rules that failed.
    #[serde(default)]
    pub missing: Vec<String>,
}

/// Workflow position and per-phase bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseState {
    /// The single active phase.
    pub current_phase: Phase,
    /// Phases whose validation succeeded, in completion order.
    pub completed_phases: Vec<Phase>,
    /// Outputs recorded per phase, keyed by the output name.
    pub phase_outputs: BTreeMap<Phase, BTreeMap<String, serde_json::Value>>,
    /// Most recent validation result per phase.
    pub validation_status: BTreeMap<Phase, ValidationResult>,
}

impl Default for PhaseState {
    fn default() -> Self {
        Self {
            current_phase: Phase::Investigation,
            completed_phases: Vec::new(),
            phase_outputs: BTreeMap::new(),
            validation_status: BTreeMap::new(),
        }
    }
}

impl PhaseState {
    /// Record an output for the current phase.
    pub fn record_output(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.phase_outputs
            .entry(self.current_phase)
            .or_default()
            .insert(key.into(), value);
    }

    /// The outputs recorded for `phase`, empty if none.
    #[must_use]
    pub fn outputs(&self, phase: Phase) -> &BTreeMap<String, serde_json::Value> {
        static EMPTY: std::sync::OnceLock<BTreeMap<String, serde_json::Value>> =
            std::sync::OnceLock::new();
        self.phase_outputs
            .get(&phase)
            .unwrap_or_else(|| EMPTY.get_or_init(BTreeMap::new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successors_are_linear() {
        assert_eq!(Phase::Investigation.successor(), Some(Phase::Discussion));
        assert_eq!(Phase::TaskGeneration.successor(), Some(Phase::Complete));
        assert_eq!(Phase::Complete.successor(), None);
    }

    #[test]
    fn parse_rejects_unknown_phase() {
        assert!("investigation".parse::<Phase>().is_ok());
        assert!("deployment".parse::<Phase>().is_err());
    }

    #[test]
    fn initial_state_starts_in_investigation() {
        let state = PhaseState::default();
        assert_eq!(state.current_phase, Phase::Investigation);
        assert!(state.completed_phases.is_empty());
    }

    #[test]
    fn record_output_targets_current_phase() {
        let mut state = PhaseState::default();
        state.record_output("findings.md", serde_json::json!("done"));
        assert!(state.outputs(Phase::Investigation).contains_key("findings.md"));
        assert!(state.outputs(Phase::Discussion).is_empty());
    }
}
