//! Tool System - Gated, audited side-effecting actions a model may request
//!
//! Information Hiding:
//! - Tool execution details hidden behind trait
//! - Tool parameters and permissions come from declarative configuration
//! - Registry binding of configuration to implementations hidden from consumers
//! - Every failure surfaces as a `ToolResult`, never as a panic

pub mod definition;
pub mod dispatcher;
pub mod document;
pub mod macros;
pub mod registry;
pub mod validation;

use crate::error::{ToolError, ToolErrorKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use definition::ToolDefinition;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

/// Named parameter values as extracted from a model reply
pub type Parameters = Map<String, Value>;

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Provider-assigned call id, present for native function calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    pub tool_id: String,
    #[serde(default)]
    pub parameters: Parameters,
}

impl ToolCallRequest {
    pub fn new(tool_id: impl Into<String>, parameters: Parameters) -> Self {
        Self {
            call_id: None,
            tool_id: tool_id.into(),
            parameters,
        }
    }
}

/// Result of a dispatch attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ToolErrorKind>,
    pub timestamp: DateTime<Utc>,
}

impl ToolResult {
    pub fn success(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_kind: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(error: &ToolError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
            timestamp: Utc::now(),
        }
    }

    /// Not an error: the caller should ask the user and resubmit confirmed.
    pub fn confirmation_required() -> Self {
        Self {
            success: false,
            data: Some(json!({ "requires_confirmation": true })),
            error: None,
            error_kind: Some(ToolErrorKind::RequiresConfirmation),
            timestamp: Utc::now(),
        }
    }

    pub fn requires_confirmation(&self) -> bool {
        !self.success
            && self
                .data
                .as_ref()
                .and_then(|d| d.get("requires_confirmation"))
                .and_then(Value::as_bool)
                .unwrap_or(false)
    }

    /// Human-readable message a tool put in its success payload
    pub fn message(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|d| d.get("message"))
            .and_then(Value::as_str)
    }

    /// The `success`/`data`/`error`/`timestamp` document handed to callers
    pub fn to_document(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| {
            json!({
                "success": self.success,
                "data": self.data,
                "error": self.error,
                "timestamp": self.timestamp.to_rfc3339(),
            })
        })
    }
}

impl From<ToolError> for ToolResult {
    fn from(error: ToolError) -> Self {
        Self::failure(&error)
    }
}

/// Operator-facing view of a registered tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub enabled: bool,
}

impl fmt::Display for ToolSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.id, self.category, self.description)
    }
}

/// Function declaration in the shape model providers consume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl FunctionDeclaration {
    pub fn from_definition(definition: &ToolDefinition) -> Self {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for (name, spec) in &definition.parameters {
            properties.insert(
                name.clone(),
                json!({
                    "type": spec.param_type.as_str(),
                    "description": spec.description,
                }),
            );
            if spec.required {
                required.push(Value::String(name.clone()));
            }
        }

        Self {
            name: definition.id.clone(),
            description: definition.model_description().to_string(),
            parameters: json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }
}

/// Tool trait - All tools must implement this
///
/// Implementations hold no mutable per-call state, so one instance may
/// serve concurrent dispatches.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Configuration this instance was built from
    fn definition(&self) -> &ToolDefinition;

    fn id(&self) -> &str {
        &self.definition().id
    }

    /// Validate arguments against the declared schema
    fn validate(&self, params: &Parameters) -> Result<(), ToolError> {
        validation::validate_parameters(&self.definition().parameters, params)
    }

    fn describe_for_model(&self) -> FunctionDeclaration {
        FunctionDeclaration::from_definition(self.definition())
    }

    /// Perform the action with already-validated parameters
    async fn execute(&self, params: &Parameters) -> Result<Value, ToolError>;
}
