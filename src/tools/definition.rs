//! Declarative tool configuration
//!
//! Information Hiding:
//! - JSON document layout and its defaults hidden behind `ToolCatalog`
//! - Parameter order preserved so validation reports are deterministic

use crate::error::ConfigError;
pub use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Structural parameter types a tool may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Boolean,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub validation: ValidationRules,
}

/// Permission block of a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default = "default_true")]
    pub require_confirmation: bool,
    #[serde(default = "default_allowed_paths")]
    pub allowed_paths: Vec<String>,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

impl Default for Permissions {
    fn default() -> Self {
        Self {
            require_confirmation: true,
            allowed_paths: default_allowed_paths(),
            max_file_size: default_max_file_size(),
        }
    }
}

/// A single tool entry, immutable once loaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ai_description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub parameters: IndexMap<String, ParameterSpec>,
    #[serde(default)]
    pub permissions: Permissions,
}

impl ToolDefinition {
    /// Description handed to the model; falls back to the human one
    pub fn model_description(&self) -> &str {
        if self.ai_description.trim().is_empty() {
            &self.description
        } else {
            &self.ai_description
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSettings {
    #[serde(default = "default_true")]
    pub enable_tools: bool,
    #[serde(default = "default_true")]
    pub log_tool_usage: bool,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            enable_tools: true,
            log_tool_usage: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiInstructions {
    #[serde(default)]
    pub system_prompt_addition: String,
}

/// The whole declarative document: tool entries plus global switches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCatalog {
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
    #[serde(default)]
    pub settings: ToolSettings,
    #[serde(default)]
    pub ai_instructions: AiInstructions,
}

impl ToolCatalog {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Load the catalog, degrading to an empty one when the source is
    /// absent or malformed so the assistant still runs without tools.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::from_path(path.as_ref()) {
            Ok(catalog) => {
                tracing::info!(
                    "Loaded tool configuration from {} ({} entries)",
                    path.as_ref().display(),
                    catalog.tools.len()
                );
                catalog
            }
            Err(e) => {
                tracing::warn!("Error loading tool configuration: {}", e);
                Self::default()
            }
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_allowed_paths() -> Vec<String> {
    vec!["~/Desktop".to_string()]
}

fn default_max_file_size() -> u64 {
    1024 * 1024
}
