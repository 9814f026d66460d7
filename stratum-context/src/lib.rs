#![deny(missing_docs)]
//! Context window accounting for stratum.
//!
//! [`TokenCounter`] estimates how many tokens a message list will cost at the
//! provider, [`ContextMetrics`] turns that into threshold decisions, and
//! [`ContextManager`] caches recent analyses so the hook pipeline can ask on
//! every step without re-counting an unchanged conversation.
//!
//! Configuration for the whole runtime lives here as [`ContextConfig`] since
//! nearly every knob is a fraction of the context window.

pub mod config;
pub mod counter;
pub mod manager;
pub mod metrics;

pub use config::{ArchiveThresholds, ContextConfig};
pub use counter::TokenCounter;
pub use manager::ContextManager;
pub use metrics::{CompactTrigger, ContextMetrics};
