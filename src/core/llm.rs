use crate::config::LLMConfig;
use crate::error::ProviderError;
use crate::tools::{FunctionDeclaration, Parameters, ToolCallRequest};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// One entry of a provider-agnostic conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Turn {
    User {
        content: String,
    },
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_call: Option<ToolCallRequest>,
    },
    /// Outcome of a tool call, fed back so the model can phrase a reply
    Tool {
        call: ToolCallRequest,
        result: Value,
    },
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_call: None,
        }
    }
}

/// Normalized model output: text plus at most one requested call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub text: String,
    pub tool_call: Option<ToolCallRequest>,
}

/// A hosted language model
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Generate the next assistant turn.
    ///
    /// `tools` carries native function declarations; `None` means the
    /// provider should not advertise any.
    async fn generate(
        &self,
        conversation: &[Turn],
        system_instruction: &str,
        tools: Option<&[FunctionDeclaration]>,
    ) -> Result<ModelReply, ProviderError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<WireToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub kind: String,
    pub function: WireFunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireFunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a FunctionDeclaration,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool<'a>>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Delta,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    function: Option<FunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct FunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

/// Client for OpenAI-compatible `/chat/completions` endpoints
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    config: LLMConfig,
}

impl OpenAiClient {
    pub fn new(api_key: String, config: LLMConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    async fn complete(&self, request: &ChatRequest<'_>) -> Result<ChatMessage, ProviderError> {
        let max_retries = self.config.max_retries.max(1);
        const BASE_DELAY_MS: u64 = 1000;

        let mut last_error = None;

        for attempt in 0..max_retries {
            if attempt > 0 {
                let delay = BASE_DELAY_MS * 2_u64.pow(attempt - 1);
                tracing::warn!(
                    "[OpenAiClient] Retrying API call (attempt {}/{}) after {}ms delay",
                    attempt + 1,
                    max_retries,
                    delay
                );
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            let response = match self.send(request).await {
                Ok(resp) => resp,
                Err(e) => {
                    tracing::warn!("[OpenAiClient] {}", e);
                    last_error = Some(e);
                    continue;
                }
            };

            match response.json::<ChatResponse>().await {
                Ok(cr) => {
                    return cr
                        .choices
                        .into_iter()
                        .next()
                        .map(|c| c.message)
                        .ok_or_else(|| ProviderError::Decode("response has no choices".to_string()));
                }
                Err(e) => {
                    tracing::warn!("[OpenAiClient] Failed to decode response body: {}", e);
                    last_error = Some(ProviderError::Decode(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ProviderError::Decode("all retry attempts failed".to_string())))
    }

    async fn send(&self, request: &ChatRequest<'_>) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Consume an SSE stream, accumulating text and tool-call fragments
    async fn complete_streaming(&self, request: &ChatRequest<'_>) -> Result<ChatMessage, ProviderError> {
        let response = self.send(request).await?;
        let mut stream = response.bytes_stream();
        let mut accumulator = StreamAccumulator::default();

        while let Some(chunk) = stream.next().await {
            if accumulator.feed(&chunk?) {
                break;
            }
        }

        Ok(accumulator.finish())
    }
}

/// Reassembles SSE `data:` lines into one assistant message.
///
/// Bytes are buffered until a full line arrives, so a UTF-8 sequence split
/// across network chunks is decoded intact.
#[derive(Debug, Default)]
struct StreamAccumulator {
    buffer: Vec<u8>,
    content: String,
    calls: BTreeMap<usize, PartialCall>,
}

impl StreamAccumulator {
    /// Returns true once the `[DONE]` sentinel is seen
    fn feed(&mut self, bytes: &[u8]) -> bool {
        self.buffer.extend_from_slice(bytes);

        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            let Some(json_str) = line.trim().strip_prefix("data: ") else {
                continue;
            };
            if json_str == "[DONE]" {
                return true;
            }

            match serde_json::from_str::<StreamChunk>(json_str) {
                Ok(chunk) => self.apply(chunk),
                Err(e) => tracing::debug!("[OpenAiClient] Skipping undecodable chunk: {}", e),
            }
        }

        false
    }

    fn apply(&mut self, chunk: StreamChunk) {
        for choice in chunk.choices {
            if let Some(text) = choice.delta.content {
                self.content.push_str(&text);
            }
            for delta in choice.delta.tool_calls.unwrap_or_default() {
                let call = self.calls.entry(delta.index).or_default();
                if let Some(id) = delta.id {
                    call.id = id;
                }
                if let Some(function) = delta.function {
                    if let Some(name) = function.name {
                        call.name.push_str(&name);
                    }
                    if let Some(arguments) = function.arguments {
                        call.arguments.push_str(&arguments);
                    }
                }
            }
        }
    }

    fn finish(self) -> ChatMessage {
        let tool_calls: Vec<WireToolCall> = self
            .calls
            .into_values()
            .map(|call| WireToolCall {
                id: call.id,
                kind: function_type(),
                function: WireFunctionCall {
                    name: call.name,
                    arguments: call.arguments,
                },
            })
            .collect();

        ChatMessage {
            role: "assistant".to_string(),
            content: Some(self.content),
            tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            tool_call_id: None,
        }
    }
}

#[async_trait]
impl ModelProvider for OpenAiClient {
    async fn generate(
        &self,
        conversation: &[Turn],
        system_instruction: &str,
        tools: Option<&[FunctionDeclaration]>,
    ) -> Result<ModelReply, ProviderError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: to_messages(conversation, system_instruction),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            stream: self.config.stream,
            tools: tools.filter(|t| !t.is_empty()).map(|declarations| {
                declarations
                    .iter()
                    .map(|function| WireTool {
                        kind: "function",
                        function,
                    })
                    .collect()
            }),
        };

        let message = if self.config.stream {
            self.complete_streaming(&request).await?
        } else {
            self.complete(&request).await?
        };

        Ok(to_reply(message))
    }
}

/// Map a conversation onto chat-completions messages.
///
/// Calls carrying a provider id are replayed natively; fenced calls have no
/// id, so their results go back as plain user text.
fn to_messages(conversation: &[Turn], system_instruction: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(conversation.len() + 1);
    if !system_instruction.is_empty() {
        messages.push(ChatMessage::text("system", system_instruction));
    }

    for turn in conversation {
        match turn {
            Turn::User { content } => messages.push(ChatMessage::text("user", content.as_str())),
            Turn::Assistant {
                content,
                tool_call: Some(call),
            } if call.call_id.is_some() => messages.push(ChatMessage {
                role: "assistant".to_string(),
                content: (!content.is_empty()).then(|| content.clone()),
                tool_calls: Some(vec![WireToolCall {
                    id: call.call_id.clone().unwrap_or_default(),
                    kind: function_type(),
                    function: WireFunctionCall {
                        name: call.tool_id.clone(),
                        arguments: Value::Object(call.parameters.clone()).to_string(),
                    },
                }]),
                tool_call_id: None,
            }),
            Turn::Assistant { content, .. } => {
                messages.push(ChatMessage::text("assistant", content.as_str()))
            }
            Turn::Tool { call, result } => match &call.call_id {
                Some(id) => messages.push(ChatMessage {
                    role: "tool".to_string(),
                    content: Some(result.to_string()),
                    tool_calls: None,
                    tool_call_id: Some(id.clone()),
                }),
                None => messages.push(ChatMessage::text(
                    "user",
                    format!("Result of tool '{}': {}", call.tool_id, result),
                )),
            },
        }
    }

    messages
}

fn to_reply(message: ChatMessage) -> ModelReply {
    let tool_call = message
        .tool_calls
        .and_then(|calls| calls.into_iter().next())
        .and_then(|call| {
            let parameters = if call.function.arguments.trim().is_empty() {
                Parameters::new()
            } else {
                match serde_json::from_str::<Parameters>(&call.function.arguments) {
                    Ok(parameters) => parameters,
                    Err(e) => {
                        tracing::warn!(
                            "[OpenAiClient] Ignoring tool call '{}' with undecodable arguments: {}",
                            call.function.name,
                            e
                        );
                        return None;
                    }
                }
            };
            (!call.function.name.is_empty()).then(|| ToolCallRequest {
                call_id: Some(call.id),
                tool_id: call.function.name,
                parameters,
            })
        });

    ModelReply {
        text: message.content.unwrap_or_default(),
        tool_call,
    }
}
