//! Error taxonomy
//!
//! Information Hiding:
//! - Tool failures are values, never panics, once they leave a tool body
//! - Provider transport details collapse into a single error type

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Failure to read or parse the declarative tool configuration.
///
/// Callers at startup degrade to an empty registry on this error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read tool configuration {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed tool configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Machine-readable outcome kind attached to failed tool results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    ToolsDisabled,
    UnknownTool,
    ToolDisabled,
    InvalidParameters,
    PathNotAllowed,
    ContentTooLarge,
    ExecutionError,
    RequiresConfirmation,
}

/// Every way a dispatch can fail
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("Tools are disabled in configuration")]
    ToolsDisabled,

    #[error("Tool '{0}' not found")]
    UnknownTool(String),

    #[error("Tool '{0}' is disabled")]
    ToolDisabled(String),

    #[error("{0}")]
    InvalidParameters(String),

    #[error("Cannot write to {}: path is outside the allowed directories", .0.display())]
    PathNotAllowed(PathBuf),

    #[error("Content exceeds maximum file size of {max} bytes ({size} bytes given)")]
    ContentTooLarge { size: u64, max: u64 },

    #[error("{0}")]
    ExecutionError(String),
}

impl ToolError {
    pub fn kind(&self) -> ToolErrorKind {
        match self {
            Self::ToolsDisabled => ToolErrorKind::ToolsDisabled,
            Self::UnknownTool(_) => ToolErrorKind::UnknownTool,
            Self::ToolDisabled(_) => ToolErrorKind::ToolDisabled,
            Self::InvalidParameters(_) => ToolErrorKind::InvalidParameters,
            Self::PathNotAllowed(_) => ToolErrorKind::PathNotAllowed,
            Self::ContentTooLarge { .. } => ToolErrorKind::ContentTooLarge,
            Self::ExecutionError(_) => ToolErrorKind::ExecutionError,
        }
    }
}

/// Failure talking to a hosted model or voice provider
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Response decode error: {0}")]
    Decode(String),

    #[error("{0}")]
    InvalidRequest(String),
}
