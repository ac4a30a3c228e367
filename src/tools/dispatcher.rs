//! Tool Dispatcher with confirmation gate and audit
//!
//! Information Hiding:
//! - Gate ordering (switches, lookup, validation, confirmation) hidden
//! - Deadline and panic containment hidden
//! - Audit sink access hidden; callers only see `ToolResult`

use super::registry::ToolRegistry;
use super::{Parameters, Tool, ToolResult};
use crate::audit::{ExecutionLog, ExecutionLogEntry};
use crate::error::ToolError;
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::time::{timeout, Duration};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Validates, gates, executes, and records tool calls
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    log: Arc<dyn ExecutionLog>,
    timeout: Duration,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>, log: Arc<dyn ExecutionLog>) -> Self {
        Self {
            registry,
            log,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Deadline applied to each tool's execution routine
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn log(&self) -> &Arc<dyn ExecutionLog> {
        &self.log
    }

    /// Dispatch a tool call. Never fails: every outcome is a `ToolResult`.
    pub async fn dispatch(
        &self,
        tool_id: &str,
        parameters: Parameters,
        user_confirmed: bool,
    ) -> ToolResult {
        let result = self.run(tool_id, &parameters, user_confirmed).await;

        if result.success {
            tracing::info!("Tool '{}' succeeded", tool_id);
        } else if result.requires_confirmation() {
            tracing::info!("Tool '{}' awaiting user confirmation", tool_id);
        } else {
            tracing::warn!(
                "Tool '{}' failed: {}",
                tool_id,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }

        self.record(tool_id, parameters, &result).await;
        result
    }

    /// `dispatch` serialized to the `success`/`data`/`error`/`timestamp` document
    pub async fn execute_tool(
        &self,
        tool_id: &str,
        parameters: Parameters,
        confirmed: bool,
    ) -> Value {
        self.dispatch(tool_id, parameters, confirmed)
            .await
            .to_document()
    }

    async fn run(&self, tool_id: &str, parameters: &Parameters, user_confirmed: bool) -> ToolResult {
        if !self.registry.tools_enabled() {
            return ToolError::ToolsDisabled.into();
        }

        let Some(tool) = self.registry.get(tool_id) else {
            return ToolError::UnknownTool(tool_id.to_string()).into();
        };

        if !tool.definition().enabled {
            return ToolError::ToolDisabled(tool_id.to_string()).into();
        }

        if let Err(e) = tool.validate(parameters) {
            return e.into();
        }

        if tool.definition().permissions.require_confirmation && !user_confirmed {
            return ToolResult::confirmation_required();
        }

        match self.execute(tool, parameters).await {
            Ok(data) => ToolResult::success(data),
            Err(e) => e.into(),
        }
    }

    /// Run the tool body under the deadline, containing panics
    async fn execute(&self, tool: Arc<dyn Tool>, parameters: &Parameters) -> Result<Value, ToolError> {
        tracing::debug!("Executing tool '{}' with {:?}", tool.id(), parameters);

        let body = AssertUnwindSafe(tool.execute(parameters)).catch_unwind();
        match timeout(self.timeout, body).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(panic)) => Err(ToolError::ExecutionError(format!(
                "Tool '{}' panicked: {}",
                tool.id(),
                panic_message(panic.as_ref())
            ))),
            Err(_) => Err(ToolError::ExecutionError(format!(
                "Tool '{}' timed out after {:?}",
                tool.id(),
                self.timeout
            ))),
        }
    }

    async fn record(&self, tool_id: &str, parameters: Parameters, result: &ToolResult) {
        if !self.registry.log_tool_usage() {
            return;
        }

        let entry = ExecutionLogEntry::new(tool_id, parameters, result.clone());
        if let Err(e) = self.log.append(entry).await {
            tracing::warn!("Failed to record execution of '{}': {}", tool_id, e);
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
