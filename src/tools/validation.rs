//! Parameter validation against a tool's declared schema
//!
//! Information Hiding:
//! - Rule evaluation order hidden; callers only see the first violation
//! - Pattern anchoring and value stringification kept internal

use super::definition::{IndexMap, ParameterSpec};
use super::Parameters;
use crate::error::ToolError;
use regex::Regex;
use serde_json::Value;

/// Validate `params` against `schema`, stopping at the first violation.
///
/// Parameters are checked in declared order, so the same invalid input
/// always reports the same error. Undeclared parameters are ignored.
pub fn validate_parameters(
    schema: &IndexMap<String, ParameterSpec>,
    params: &Parameters,
) -> Result<(), ToolError> {
    for (name, spec) in schema {
        let Some(value) = params.get(name) else {
            if spec.required {
                return Err(invalid(format!("Missing required parameter: {}", name)));
            }
            continue;
        };

        if !spec.param_type.matches(value) {
            return Err(invalid(format!(
                "Parameter {} must be a {}",
                name,
                spec.param_type.as_str()
            )));
        }

        let text = stringify(value);

        if let Some(pattern) = &spec.validation.pattern {
            let re = compile_pattern(pattern).map_err(|e| {
                invalid(format!("Parameter {} has an invalid pattern: {}", name, e))
            })?;
            if !re.is_match(&text) {
                return Err(invalid(format!(
                    "Parameter {} does not match required pattern",
                    name
                )));
            }
        }

        if let Some(max) = spec.validation.max_length {
            if text.chars().count() > max {
                return Err(invalid(format!(
                    "Parameter {} exceeds maximum length",
                    name
                )));
            }
        }
    }

    Ok(())
}

/// Compile a declared pattern so it must match from the start of the value
pub fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{})", pattern))
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn invalid(message: String) -> ToolError {
    ToolError::InvalidParameters(message)
}
