//! Registry of tools available to the loop.

use std::collections::HashMap;
use std::sync::Arc;

use stratum_types::ToolDefinition;

use crate::tool::ToolDyn;

/// Flat registry of tools keyed by name.
///
/// The orchestrator selects the per-phase subset by name; the registry hands
/// out [`ToolDefinition`]s for the model and resolves names at dispatch time.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolDyn>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Overwrites any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn ToolDyn>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Look up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolDyn>> {
        self.tools.get(name)
    }

    /// Definitions of every registered tool, sorted by name for stable
    /// request payloads.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Definitions restricted to the named subset, preserving only names that
    /// are actually registered.
    #[must_use]
    pub fn definitions_for(&self, names: &[String]) -> Vec<ToolDefinition> {
        self.definitions()
            .into_iter()
            .filter(|def| names.iter().any(|n| n == &def.name))
            .collect()
    }

    /// Whether `name` is registered and visible in `subset`.
    #[must_use]
    pub fn is_visible(&self, name: &str, subset: &[String]) -> bool {
        self.tools.contains_key(name) && subset.iter().any(|n| n == name)
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
