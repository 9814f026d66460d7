#![deny(missing_docs)]
//! Agent state for stratum.
//!
//! [`AgentState`] is the typed record every other crate reads; all mutation
//! flows through [`reduce`], which implements the append/replace contract for
//! messages, last-write-wins merging for virtual files, and id-deduplication
//! for pending plans. [`SessionStore`] persists whole sessions; the byte
//! layout is JSON because the only obligation is a semantics-preserving
//! round-trip.

pub mod session;
pub mod state;
pub mod update;

pub use session::{FileSessionStore, InMemorySessionStore, Session, SessionStore, SessionSummary};
pub use state::AgentState;
pub use update::{reduce, StateUpdate};
