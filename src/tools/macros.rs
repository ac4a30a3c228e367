//! Tool Definition Macros
//!
//! Simplifies tool creation by reducing boilerplate

/// Build a `ToolDefinition` with default permissions using a declarative syntax
///
/// # Example
/// ```
/// let definition = vocalis::tool_definition! {
///     id: "create_document",
///     name: "Create Document",
///     description: "Create a text document",
///     parameters: [
///         { name: "filename", type: String, description: "File name", required: true },
///         { name: "content", type: String, description: "File body", required: true }
///     ]
/// };
/// assert_eq!(definition.parameters.len(), 2);
/// ```
#[macro_export]
macro_rules! tool_definition {
    (
        id: $id:expr,
        name: $name:expr,
        description: $description:expr,
        parameters: [
            $(
                {
                    name: $param_name:expr,
                    type: $param_type:ident,
                    description: $param_desc:expr,
                    required: $param_required:expr
                }
            ),* $(,)?
        ]
    ) => {{
        #[allow(unused_mut)]
        let mut parameters = $crate::tools::definition::IndexMap::new();
        $(
            parameters.insert(
                $param_name.to_string(),
                $crate::tools::definition::ParameterSpec {
                    param_type: $crate::tools::definition::ParamType::$param_type,
                    description: $param_desc.to_string(),
                    required: $param_required,
                    validation: ::std::default::Default::default(),
                },
            );
        )*
        $crate::tools::definition::ToolDefinition {
            id: $id.to_string(),
            name: $name.to_string(),
            description: $description.to_string(),
            ai_description: String::new(),
            category: String::new(),
            enabled: true,
            parameters,
            permissions: ::std::default::Default::default(),
        }
    }};
}

/// Fetch a required string parameter or fail with `InvalidParameters`
#[macro_export]
macro_rules! required_str {
    ($params:expr, $param:expr) => {
        $params
            .get($param)
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                $crate::error::ToolError::InvalidParameters(format!(
                    "Missing required parameter: {}",
                    $param
                ))
            })?
    };
}

/// Fetch an optional string parameter, treating blank values as absent
#[macro_export]
macro_rules! optional_str {
    ($params:expr, $param:expr) => {
        $params
            .get($param)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };
}

#[cfg(test)]
mod tests {
    use crate::error::ToolError;
    use crate::tools::definition::ParamType;
    use crate::tools::Parameters;
    use serde_json::json;

    #[test]
    fn test_tool_definition_macro() {
        let definition = tool_definition! {
            id: "test_tool",
            name: "Test Tool",
            description: "A test tool",
            parameters: [
                {
                    name: "param1",
                    type: String,
                    description: "First parameter",
                    required: true
                },
                {
                    name: "param2",
                    type: Number,
                    description: "Second parameter",
                    required: false
                }
            ]
        };

        assert_eq!(definition.id, "test_tool");
        assert_eq!(definition.description, "A test tool");
        assert_eq!(definition.parameters.len(), 2);
        assert_eq!(definition.parameters[0].param_type, ParamType::String);
        assert!(definition.parameters["param1"].required);
        assert!(!definition.parameters["param2"].required);
        assert!(definition.permissions.require_confirmation);
    }

    fn read(params: &Parameters) -> Result<(String, Option<String>), ToolError> {
        let name = required_str!(params, "name");
        let folder = optional_str!(params, "folder");
        Ok((name.to_string(), folder.map(str::to_string)))
    }

    #[test]
    fn test_param_macros() {
        let params = json!({"name": "a", "folder": "  "}).as_object().cloned().unwrap();
        assert_eq!(read(&params).unwrap(), ("a".to_string(), None));

        let params = json!({"folder": "x"}).as_object().cloned().unwrap();
        assert_eq!(
            read(&params).unwrap_err().to_string(),
            "Missing required parameter: name"
        );
    }
}
