//! Tool Registry
//!
//! Information Hiding:
//! - Binding of configuration entries to compiled-in implementations hidden
//! - Tool storage and lookup implementation hidden
//! - Global tool switches travel with the registry

use super::definition::{AiInstructions, IndexMap, ToolCatalog, ToolDefinition, ToolSettings};
use super::validation::compile_pattern;
use super::{document, FunctionDeclaration, Tool, ToolSummary};
use std::path::Path;
use std::sync::Arc;

/// Builds a tool instance from its configuration entry
pub type ToolFactory = Box<dyn Fn(ToolDefinition) -> Arc<dyn Tool> + Send + Sync>;

/// Implementations compiled into the binary, keyed by tool id
pub fn builtin_factories() -> Vec<(&'static str, ToolFactory)> {
    let create_document: ToolFactory = Box::new(|definition: ToolDefinition| -> Arc<dyn Tool> {
        Arc::new(document::CreateDocumentTool::new(definition))
    });
    vec![(document::TOOL_ID, create_document)]
}

/// Tool registry holding every configured tool for the process lifetime
///
/// Read-only once built; share it behind an `Arc`.
pub struct ToolRegistry {
    tools: IndexMap<String, Arc<dyn Tool>>,
    settings: ToolSettings,
    ai_instructions: AiInstructions,
}

impl ToolRegistry {
    /// Registry with no tools and default switches
    pub fn empty() -> Self {
        Self {
            tools: IndexMap::new(),
            settings: ToolSettings::default(),
            ai_instructions: AiInstructions::default(),
        }
    }

    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::new()
    }

    /// Bind a catalog to the built-in implementations
    pub fn load(catalog: ToolCatalog) -> Self {
        Self::builder().with_builtins().build(catalog)
    }

    /// Read the configuration at `path`, degrading to no tools on error
    pub fn from_config_path(path: impl AsRef<Path>) -> Self {
        Self::load(ToolCatalog::load_or_default(path))
    }

    /// Get a tool by id, enabled or not
    pub fn get(&self, id: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(id).cloned()
    }

    pub fn has_tool(&self, id: &str) -> bool {
        self.tools.contains_key(id)
    }

    pub fn tool_ids(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Process-wide `enable_tools` switch
    pub fn tools_enabled(&self) -> bool {
        self.settings.enable_tools
    }

    pub fn log_tool_usage(&self) -> bool {
        self.settings.log_tool_usage
    }

    pub fn system_prompt_addition(&self) -> &str {
        &self.ai_instructions.system_prompt_addition
    }

    /// Enabled tools in configuration order
    pub fn list_enabled(&self) -> Vec<ToolSummary> {
        self.enabled_tools()
            .map(|tool| {
                let d = tool.definition();
                ToolSummary {
                    id: d.id.clone(),
                    name: d.name.clone(),
                    description: d.description.clone(),
                    category: d.category.clone(),
                    enabled: d.enabled,
                }
            })
            .collect()
    }

    /// Function declarations for every enabled tool
    pub fn describe_for_model(&self) -> Vec<FunctionDeclaration> {
        self.enabled_tools()
            .map(|tool| tool.describe_for_model())
            .collect()
    }

    fn enabled_tools(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.values().filter(|tool| tool.definition().enabled)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::empty()
    }
}

/// Collects factories, then binds them to a catalog
#[derive(Default)]
pub struct ToolRegistryBuilder {
    factories: IndexMap<String, ToolFactory>,
}

impl ToolRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins(mut self) -> Self {
        for (id, factory) in builtin_factories() {
            self.factories.insert(id.to_string(), factory);
        }
        self
    }

    /// Register an implementation for `id`
    pub fn factory<F>(mut self, id: impl Into<String>, factory: F) -> Self
    where
        F: Fn(ToolDefinition) -> Arc<dyn Tool> + Send + Sync + 'static,
    {
        self.factories.insert(id.into(), Box::new(factory));
        self
    }

    /// Bind configuration entries to factories by id.
    ///
    /// Entries without an implementation, implementations without an entry,
    /// duplicates and uncompilable validation patterns are skipped with a
    /// warning.
    pub fn build(self, catalog: ToolCatalog) -> ToolRegistry {
        let ToolCatalog {
            tools: definitions,
            settings,
            ai_instructions,
        } = catalog;

        let mut tools: IndexMap<String, Arc<dyn Tool>> = IndexMap::new();

        for definition in definitions {
            if tools.contains_key(&definition.id) {
                tracing::warn!("Skipping duplicate tool configuration '{}'", definition.id);
                continue;
            }

            let Some(factory) = self.factories.get(&definition.id) else {
                tracing::warn!(
                    "Skipping tool '{}': no implementation is registered for it",
                    definition.id
                );
                continue;
            };

            if let Some((param, e)) = first_bad_pattern(&definition) {
                tracing::warn!(
                    "Skipping tool '{}': parameter '{}' has an invalid pattern: {}",
                    definition.id,
                    param,
                    e
                );
                continue;
            }

            let id = definition.id.clone();
            tracing::info!("Registering tool: {} (enabled: {})", id, definition.enabled);
            tools.insert(id, factory(definition));
        }

        for id in self.factories.keys() {
            if !tools.contains_key(id) {
                tracing::warn!("Tool implementation '{}' has no configuration entry", id);
            }
        }

        ToolRegistry {
            tools,
            settings,
            ai_instructions,
        }
    }
}

fn first_bad_pattern(definition: &ToolDefinition) -> Option<(String, regex::Error)> {
    definition.parameters.iter().find_map(|(name, spec)| {
        let pattern = spec.validation.pattern.as_ref()?;
        compile_pattern(pattern).err().map(|e| (name.clone(), e))
    })
}
