#![deny(missing_docs)]
//! Tool registry and dispatch for stratum.
//!
//! [`ToolDyn`] is the object-safe trait every tool implements; the
//! [`ToolRegistry`] holds the flat set and hands out phase-filtered views.
//! The [`Dispatcher`] normalises arguments, executes the tool, and turns
//! every failure into an error tool message rather than an exception.
//!
//! The built-in state tools (`write_todos`, `ls`, `read_file`, `write_file`,
//! `edit_file`, `review_plan`) operate on the virtual file system and todo
//! list inside [`stratum_state::AgentState`].

pub mod builtin;
pub mod dispatch;
pub mod registry;
pub mod tool;

pub use builtin::register_builtins;
pub use dispatch::{DispatchResult, Dispatcher};
pub use registry::ToolRegistry;
pub use tool::{ToolDyn, ToolResponse};
