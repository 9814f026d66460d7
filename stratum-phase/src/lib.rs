#![deny(missing_docs)]
//! Phase orchestration for stratum.
//!
//! The planning workflow moves linearly through investigation, discussion,
//! planning, and task generation. Each phase has a static [`PhaseSpec`]
//! (goal, tool subset, required outputs, validation rules, approval gate)
//! collected in a [`PhaseCatalog`]. The [`Orchestrator`] evaluates
//! transitions (all-or-nothing, never fabricating outputs) and maps human
//! plan-review responses back onto state.

pub mod catalog;
pub mod orchestrator;

pub use catalog::{PhaseCatalog, PhaseSpec, TodoTemplate, ValidationRule};
pub use orchestrator::{format_todos, Orchestrator, PhaseAgent, TransitionCheck};
