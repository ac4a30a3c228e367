//! Model Tool-Call Bridge
//!
//! Information Hiding:
//! - Tool schema presentation (native declarations vs. fenced JSON) hidden
//! - Call detection across reply shapes hidden
//! - Follow-up model turn and fallback phrasing hidden
//! - Provider faults degrade to a failed turn, never an error

pub mod extract;

use crate::config::{AssistantConfig, ToolMode};
use crate::core::llm::{ModelProvider, ModelReply, Turn};
use crate::error::ProviderError;
use crate::tools::dispatcher::ToolDispatcher;
use crate::tools::{FunctionDeclaration, ToolCallRequest, ToolResult};
use extract::{extract_tool_call, strip_fenced_json};
use serde::Serialize;
use std::sync::Arc;

const PROVIDER_FAILURE: &str = "I encountered an error processing your request.";

const NATIVE_NOTE: &str =
    "Use the provided functions when the user asks for an action one of them covers.";

const FENCED_FORMAT: &str = "When you need to use a tool, respond with a JSON block in this format:
```json
{
  \"tool_call\": {
    \"tool_id\": \"tool_name\",
    \"parameters\": {
      \"param1\": \"value1\"
    }
  }
}
```";

/// A dispatched call and what came of it
#[derive(Debug, Clone, Serialize)]
pub struct ToolExecution {
    pub call: ToolCallRequest,
    pub result: ToolResult,
}

/// Outcome of one conversational turn
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub response: String,
    /// False only when the model provider could not be reached
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_execution: Option<ToolExecution>,
}

impl TurnOutcome {
    fn reply(response: String) -> Self {
        Self {
            response,
            success: true,
            error: None,
            tool_execution: None,
        }
    }

    fn provider_failure(error: &ProviderError) -> Self {
        Self {
            response: PROVIDER_FAILURE.to_string(),
            success: false,
            error: Some(error.to_string()),
            tool_execution: None,
        }
    }

    /// Call awaiting user approval; resubmit it through `ToolCallBridge::confirm`
    pub fn pending_call(&self) -> Option<&ToolCallRequest> {
        self.tool_execution
            .as_ref()
            .filter(|execution| execution.result.requires_confirmation())
            .map(|execution| &execution.call)
    }
}

/// Connects a model provider to the tool dispatcher
pub struct ToolCallBridge {
    provider: Arc<dyn ModelProvider>,
    dispatcher: Arc<ToolDispatcher>,
    mode: ToolMode,
    base_instruction: String,
}

impl ToolCallBridge {
    pub fn new(provider: Arc<dyn ModelProvider>, dispatcher: Arc<ToolDispatcher>, mode: ToolMode) -> Self {
        Self {
            provider,
            dispatcher,
            mode,
            base_instruction: AssistantConfig::default().base_instruction,
        }
    }

    pub fn with_base_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.base_instruction = instruction.into();
        self
    }

    pub fn dispatcher(&self) -> &Arc<ToolDispatcher> {
        &self.dispatcher
    }

    /// System instruction for a turn, including tool guidance when tools are on
    pub fn system_instruction(&self) -> String {
        let mut instruction = self.base_instruction.clone();
        let registry = self.dispatcher.registry();
        if !registry.tools_enabled() {
            return instruction;
        }

        let declarations = registry.describe_for_model();
        if declarations.is_empty() {
            return instruction;
        }

        let addition = registry.system_prompt_addition();
        if !addition.is_empty() {
            instruction.push_str("\n\n");
            instruction.push_str(addition);
        }

        match self.mode {
            ToolMode::Native => {
                instruction.push_str("\n\n");
                instruction.push_str(NATIVE_NOTE);
            }
            ToolMode::Fenced => {
                let tool_list = serde_json::to_string_pretty(&declarations).unwrap_or_default();
                instruction.push_str(&format!(
                    "\n\nAvailable tools:\n{}\n\n{}",
                    tool_list, FENCED_FORMAT
                ));
            }
        }

        instruction
    }

    /// Native declarations; `None` in fenced mode or when nothing is enabled
    pub fn function_declarations(&self) -> Option<Vec<FunctionDeclaration>> {
        let registry = self.dispatcher.registry();
        if self.mode != ToolMode::Native || !registry.tools_enabled() {
            return None;
        }
        let declarations = registry.describe_for_model();
        (!declarations.is_empty()).then_some(declarations)
    }

    /// Handle one user message. Detected calls are dispatched unconfirmed.
    pub async fn respond(&self, message: &str, history: &[Turn]) -> TurnOutcome {
        let mut conversation = history.to_vec();
        conversation.push(Turn::user(message));

        let reply = match self.generate(&conversation).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("Model provider error: {}", e);
                return TurnOutcome::provider_failure(&e);
            }
        };

        let ModelReply { text, tool_call } = reply;
        match tool_call.or_else(|| extract_tool_call(&text)) {
            Some(call) => self.run_call(conversation, text, call, false).await,
            None => TurnOutcome::reply(strip_fenced_json(&text)),
        }
    }

    /// Execute a call the user approved; `history` ends with the turn that proposed it
    pub async fn confirm(&self, call: ToolCallRequest, history: &[Turn]) -> TurnOutcome {
        self.run_call(history.to_vec(), String::new(), call, true).await
    }

    async fn generate(&self, conversation: &[Turn]) -> Result<ModelReply, ProviderError> {
        let instruction = self.system_instruction();
        let declarations = self.function_declarations();
        self.provider
            .generate(conversation, &instruction, declarations.as_deref())
            .await
    }

    async fn run_call(
        &self,
        mut conversation: Vec<Turn>,
        text: String,
        call: ToolCallRequest,
        confirmed: bool,
    ) -> TurnOutcome {
        tracing::info!("Model requested tool '{}'", call.tool_id);

        let result = self
            .dispatcher
            .dispatch(&call.tool_id, call.parameters.clone(), confirmed)
            .await;

        let response = if result.requires_confirmation() {
            if text.trim().is_empty() {
                format!("Should I go ahead and run {}? Please confirm.", call.tool_id)
            } else {
                text
            }
        } else if !result.success {
            format!(
                "I couldn't complete that action: {}",
                result.error.as_deref().unwrap_or("unknown error")
            )
        } else {
            conversation.push(Turn::Assistant {
                content: text,
                tool_call: Some(call.clone()),
            });
            conversation.push(Turn::Tool {
                call: call.clone(),
                result: result.to_document(),
            });
            self.follow_up(&conversation, &result).await
        };

        TurnOutcome {
            response,
            success: true,
            error: None,
            tool_execution: Some(ToolExecution { call, result }),
        }
    }

    /// Let the model phrase a successful result, falling back to the tool's message
    async fn follow_up(&self, conversation: &[Turn], result: &ToolResult) -> String {
        let fallback = || format!("I've {}", result.message().unwrap_or("completed the action"));

        match self.generate(conversation).await {
            Ok(reply) => {
                if reply.tool_call.is_some() {
                    tracing::debug!("Ignoring tool call requested in follow-up turn");
                }
                let text = strip_fenced_json(&reply.text);
                if text.trim().is_empty() || extract_tool_call(&text).is_some() {
                    fallback()
                } else {
                    text
                }
            }
            Err(e) => {
                tracing::warn!("Follow-up model call failed: {}", e);
                fallback()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::InMemoryLog;
    use crate::tools::definition::ToolCatalog;
    use crate::tools::registry::ToolRegistry;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct Recorded {
        conversation: Vec<Turn>,
        instruction: String,
        tools: Option<Vec<FunctionDeclaration>>,
    }

    #[derive(Default)]
    struct ScriptedProvider {
        replies: Mutex<VecDeque<Result<ModelReply, ProviderError>>>,
        calls: Mutex<Vec<Recorded>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<Result<ModelReply, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ModelProvider for ScriptedProvider {
        async fn generate(
            &self,
            conversation: &[Turn],
            system_instruction: &str,
            tools: Option<&[FunctionDeclaration]>,
        ) -> Result<ModelReply, ProviderError> {
            self.calls.lock().unwrap().push(Recorded {
                conversation: conversation.to_vec(),
                instruction: system_instruction.to_string(),
                tools: tools.map(|t| t.to_vec()),
            });
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ModelReply::default()))
        }
    }

    fn text(reply: &str) -> Result<ModelReply, ProviderError> {
        Ok(ModelReply {
            text: reply.to_string(),
            tool_call: None,
        })
    }

    fn registry_for(root: &Path, enabled: bool, require_confirmation: bool) -> Arc<ToolRegistry> {
        let catalog = json!({
            "tools": [{
                "id": "create_document",
                "name": "Create Document",
                "description": "Create a text document",
                "ai_description": "Create a document on the user's machine",
                "category": "files",
                "enabled": enabled,
                "parameters": {
                    "filename": {"type": "string", "description": "File name", "required": true},
                    "content": {"type": "string", "description": "Body", "required": true}
                },
                "permissions": {
                    "require_confirmation": require_confirmation,
                    "allowed_paths": [root.to_string_lossy()],
                    "max_file_size": 1024
                }
            }],
            "settings": {"enable_tools": true, "log_tool_usage": true},
            "ai_instructions": {"system_prompt_addition": "You can create documents."}
        });
        let catalog = ToolCatalog::from_json(&catalog.to_string()).unwrap();
        Arc::new(ToolRegistry::load(catalog))
    }

    fn bridge(provider: Arc<ScriptedProvider>, registry: Arc<ToolRegistry>, mode: ToolMode) -> ToolCallBridge {
        let dispatcher = Arc::new(ToolDispatcher::new(registry, Arc::new(InMemoryLog::new())));
        ToolCallBridge::new(provider, dispatcher, mode).with_base_instruction("Be brief.")
    }

    const FENCED_CALL: &str = "I'll save that for you. Shall I go ahead?\n```json\n{\"tool_call\": {\"tool_id\": \"create_document\", \"parameters\": {\"filename\": \"notes\", \"content\": \"hi\"}}}\n```";

    #[tokio::test]
    async fn test_plain_reply_is_cleaned() {
        let dir = tempdir().unwrap();
        let provider = ScriptedProvider::new(vec![text("Hello!\n```json\n{\"x\": 1}\n```")]);
        let bridge = bridge(provider.clone(), registry_for(dir.path(), true, true), ToolMode::Fenced);

        let outcome = bridge.respond("hi", &[]).await;

        assert!(outcome.success);
        assert_eq!(outcome.response, "Hello!");
        assert!(outcome.tool_execution.is_none());
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_confirmation_returns_original_text_and_pending_call() {
        let dir = tempdir().unwrap();
        let provider = ScriptedProvider::new(vec![text(FENCED_CALL)]);
        let bridge = bridge(provider.clone(), registry_for(dir.path(), true, true), ToolMode::Fenced);

        let outcome = bridge.respond("save hi as notes", &[]).await;

        assert_eq!(outcome.response, FENCED_CALL);
        let pending = outcome.pending_call().unwrap();
        assert_eq!(pending.tool_id, "create_document");
        assert_eq!(pending.parameters["filename"], "notes");
        assert!(!dir.path().join("notes.md").exists());
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_confirm_executes_and_asks_model_to_phrase_result() {
        let dir = tempdir().unwrap();
        let provider = ScriptedProvider::new(vec![text(FENCED_CALL), text("Done, your notes are saved.")]);
        let bridge = bridge(provider.clone(), registry_for(dir.path(), true, true), ToolMode::Fenced);

        let first = bridge.respond("save hi as notes", &[]).await;
        let call = first.pending_call().cloned().unwrap();
        let history = vec![Turn::user("save hi as notes"), Turn::assistant(first.response.clone())];

        let outcome = bridge.confirm(call, &history).await;

        assert_eq!(outcome.response, "Done, your notes are saved.");
        assert!(outcome.tool_execution.as_ref().unwrap().result.success);
        assert_eq!(std::fs::read_to_string(dir.path().join("notes.md")).unwrap(), "hi");

        let calls = provider.calls.lock().unwrap();
        let follow_up = &calls[1].conversation;
        assert!(matches!(follow_up.last(), Some(Turn::Tool { .. })));
        assert_eq!(follow_up.len(), 4);
    }

    #[tokio::test]
    async fn test_failed_follow_up_uses_tool_message() {
        let dir = tempdir().unwrap();
        let call = ToolCallRequest {
            call_id: Some("call_1".to_string()),
            tool_id: "create_document".to_string(),
            parameters: json!({"filename": "notes", "content": "hi"}).as_object().cloned().unwrap(),
        };
        let provider = ScriptedProvider::new(vec![
            Ok(ModelReply {
                text: String::new(),
                tool_call: Some(call),
            }),
            Err(ProviderError::Decode("bad".to_string())),
        ]);
        let bridge = bridge(provider.clone(), registry_for(dir.path(), true, false), ToolMode::Native);

        let outcome = bridge.respond("save hi as notes", &[]).await;

        assert!(outcome.success);
        assert!(outcome.response.starts_with("I've created notes.md at "));
        assert!(dir.path().join("notes.md").exists());
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_disabled_tool_in_fenced_block_fails_without_writing() {
        let dir = tempdir().unwrap();
        let provider = ScriptedProvider::new(vec![text(FENCED_CALL)]);
        let bridge = bridge(provider.clone(), registry_for(dir.path(), false, false), ToolMode::Fenced);

        let outcome = bridge.respond("save hi as notes", &[]).await;

        assert_eq!(
            outcome.response,
            "I couldn't complete that action: Tool 'create_document' is disabled"
        );
        assert!(outcome.pending_call().is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_provider_error_degrades_to_failed_turn() {
        let dir = tempdir().unwrap();
        let provider = ScriptedProvider::new(vec![Err(ProviderError::Status {
            status: 503,
            body: "unavailable".to_string(),
        })]);
        let bridge = bridge(provider, registry_for(dir.path(), true, true), ToolMode::Native);

        let outcome = bridge.respond("hi", &[]).await;

        assert!(!outcome.success);
        assert_eq!(outcome.response, "I encountered an error processing your request.");
        assert!(outcome.error.unwrap().contains("503"));
    }

    #[tokio::test]
    async fn test_tool_presentation_per_mode() {
        let dir = tempdir().unwrap();

        let provider = ScriptedProvider::new(vec![text("ok")]);
        let fenced = bridge(provider.clone(), registry_for(dir.path(), true, true), ToolMode::Fenced);
        fenced.respond("hi", &[]).await;
        {
            let calls = provider.calls.lock().unwrap();
            assert!(calls[0].instruction.starts_with("Be brief.\n\nYou can create documents."));
            assert!(calls[0].instruction.contains("Available tools:"));
            assert!(calls[0].instruction.contains("\"create_document\""));
            assert!(calls[0].tools.is_none());
        }

        let provider = ScriptedProvider::new(vec![text("ok")]);
        let native = bridge(provider.clone(), registry_for(dir.path(), true, true), ToolMode::Native);
        native.respond("hi", &[]).await;
        let calls = provider.calls.lock().unwrap();
        assert!(!calls[0].instruction.contains("Available tools:"));
        assert_eq!(calls[0].tools.as_ref().unwrap()[0].name, "create_document");
    }

    #[tokio::test]
    async fn test_no_tool_guidance_when_nothing_enabled() {
        let dir = tempdir().unwrap();
        let provider = ScriptedProvider::new(vec![]);
        let bridge = bridge(provider, registry_for(dir.path(), false, true), ToolMode::Native);

        assert_eq!(bridge.system_instruction(), "Be brief.");
        assert!(bridge.function_declarations().is_none());
    }
}
