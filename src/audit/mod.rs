//! Execution Log - append-only audit trail of dispatch attempts
//!
//! Information Hiding:
//! - Storage backend hidden behind trait
//! - Allows swapping between memory and SQLite without dispatcher changes
//! - Each backend owns its own concurrency strategy for appenders

use crate::config::{AuditBackend, AuditConfig};
use crate::tools::{Parameters, ToolResult};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryLog;
pub use sqlite::SqliteLog;

/// Immutable snapshot of one dispatch attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub timestamp: DateTime<Utc>,
    pub tool_id: String,
    pub parameters: Parameters,
    pub result: ToolResult,
}

impl ExecutionLogEntry {
    pub fn new(tool_id: impl Into<String>, parameters: Parameters, result: ToolResult) -> Self {
        Self {
            timestamp: Utc::now(),
            tool_id: tool_id.into(),
            parameters,
            result,
        }
    }
}

/// Append-only sink; entries are never edited or removed
#[async_trait]
pub trait ExecutionLog: Send + Sync {
    async fn append(&self, entry: ExecutionLogEntry) -> Result<()>;

    /// All entries, oldest first
    async fn entries(&self) -> Result<Vec<ExecutionLogEntry>>;

    async fn len(&self) -> Result<usize> {
        Ok(self.entries().await?.len())
    }

    /// The newest `limit` entries, oldest first
    async fn recent(&self, limit: usize) -> Result<Vec<ExecutionLogEntry>> {
        let mut entries = self.entries().await?;
        let skip = entries.len().saturating_sub(limit);
        Ok(entries.split_off(skip))
    }
}

/// Open the backend selected in configuration
pub fn open(config: &AuditConfig) -> Result<Arc<dyn ExecutionLog>> {
    match config.backend {
        AuditBackend::Memory => Ok(Arc::new(InMemoryLog::new())),
        AuditBackend::Sqlite => Ok(Arc::new(SqliteLog::open(&config.path)?)),
    }
}
