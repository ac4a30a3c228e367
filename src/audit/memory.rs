//! In-Memory Execution Log
//!
//! Information Hiding:
//! - Vector storage hidden from users
//! - Thread-safe appends via RwLock hidden behind async interface
//! - Suitable for testing and single-process deployments

use super::{ExecutionLog, ExecutionLogEntry};
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Entries are lost when the process terminates
pub struct InMemoryLog {
    entries: RwLock<Vec<ExecutionLogEntry>>,
}

impl InMemoryLog {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionLog for InMemoryLog {
    async fn append(&self, entry: ExecutionLogEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        tracing::debug!(
            "[InMemoryLog] Appending entry #{} for tool '{}'",
            entries.len() + 1,
            entry.tool_id
        );
        entries.push(entry);
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<ExecutionLogEntry>> {
        Ok(self.entries.read().await.clone())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().await.len())
    }
}
