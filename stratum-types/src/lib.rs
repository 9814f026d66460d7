#![deny(missing_docs)]
//! Core types for the stratum agent runtime.
//!
//! Everything the other stratum crates share lives here: the conversation
//! [`Message`] model, [`Todo`] and [`Plan`] records, the [`Phase`] enum and
//! per-phase state, the [`Provider`] trait for LLM backends, tool definition
//! and output types, and one error enum per failure domain.
//!
//! The crate is deliberately dependency-light so every other crate can depend
//! on it without pulling in a runtime.

pub mod completion;
pub mod compression;
pub mod error;
pub mod message;
pub mod phase;
pub mod plan;

pub use completion::*;
pub use compression::*;
pub use error::*;
pub use message::*;
pub use phase::*;
pub use plan::*;
