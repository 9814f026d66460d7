#![deny(missing_docs)]
//! The hook pipeline: typed, priority-ordered callbacks around the loop.
//!
//! Hooks observe the loop at fixed points and may return a state delta; they
//! never mutate state directly and their errors never abort the chain. The
//! built-in [`CompressionHook`] is the pre-model/post-tool path that keeps
//! the conversation inside the token budget.

pub mod compression_hook;
pub mod hook;
pub mod registry;

pub use compression_hook::CompressionHook;
pub use hook::{Hook, HookContext, HookFlags, HookKind, HookOutcome};
pub use registry::{DispatchSummary, HookRegistry, HookStats};
