//! Assistant facade: one conversational turn, optionally voiced

use crate::audit;
use crate::bridge::{ToolCallBridge, TurnOutcome};
use crate::config::Settings;
use crate::core::llm::{OpenAiClient, Turn};
use crate::core::voice::{ElevenLabsClient, SpeechSynthesizer};
use crate::error::ProviderError;
use crate::tools::dispatcher::ToolDispatcher;
use crate::tools::registry::ToolRegistry;
use crate::tools::ToolCallRequest;
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Turn outcome plus synthesized audio when requested
#[derive(Debug, Clone, Serialize)]
pub struct AssistantReply {
    #[serde(flatten)]
    pub turn: TurnOutcome,
    #[serde(skip)]
    pub audio: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_error: Option<String>,
}

impl AssistantReply {
    /// History entries for one exchange: the user's words, then this reply
    pub fn exchange(&self, user_input: impl Into<String>) -> [Turn; 2] {
        [
            Turn::user(user_input),
            Turn::assistant(self.turn.response.clone()),
        ]
    }
}

/// What the user is recorded as saying when approving a pending call
pub fn approval_message(call: &ToolCallRequest) -> String {
    format!("Yes, go ahead with {}", call.tool_id)
}

/// Registry, audit log and dispatcher as configured. Needs no API key.
pub fn build_dispatcher(settings: &Settings) -> Result<Arc<ToolDispatcher>> {
    let registry = Arc::new(ToolRegistry::from_config_path(&settings.tools.config_path));
    tracing::info!(
        "Loaded {} tool(s) from {:?}",
        registry.len(),
        settings.tools.config_path
    );

    let log = audit::open(&settings.audit)?;
    let dispatcher = ToolDispatcher::new(registry, log)
        .with_timeout(Duration::from_secs(settings.tools.execution_timeout_secs));
    Ok(Arc::new(dispatcher))
}

pub struct Assistant {
    bridge: ToolCallBridge,
    voice: Option<Arc<dyn SpeechSynthesizer>>,
}

impl Assistant {
    pub fn new(bridge: ToolCallBridge) -> Self {
        Self { bridge, voice: None }
    }

    pub fn with_voice(mut self, voice: Arc<dyn SpeechSynthesizer>) -> Self {
        self.voice = Some(voice);
        self
    }

    /// Wire every collaborator from settings and the environment
    pub fn from_settings(settings: &Settings, api_key: String) -> Result<Self> {
        let dispatcher = build_dispatcher(settings)?;
        let provider = Arc::new(OpenAiClient::new(api_key, settings.llm.clone())?);
        let bridge = ToolCallBridge::new(provider, dispatcher, settings.llm.tool_mode)
            .with_base_instruction(settings.assistant.base_instruction.clone());

        let assistant = Self::new(bridge);
        match Settings::voice_api_key() {
            Some(key) => {
                let voice = ElevenLabsClient::new(key, settings.voice.clone())?;
                Ok(assistant.with_voice(Arc::new(voice)))
            }
            None => {
                tracing::info!("Voice synthesis not configured; replies will be text only");
                Ok(assistant)
            }
        }
    }

    pub fn dispatcher(&self) -> &Arc<ToolDispatcher> {
        self.bridge.dispatcher()
    }

    pub fn has_voice(&self) -> bool {
        self.voice.is_some()
    }

    pub async fn respond(&self, message: &str, history: &[Turn], speak: bool) -> AssistantReply {
        let turn = self.bridge.respond(message, history).await;
        self.voiced(turn, speak).await
    }

    /// Run a call the user approved
    pub async fn confirm(&self, call: ToolCallRequest, history: &[Turn], speak: bool) -> AssistantReply {
        let turn = self.bridge.confirm(call, history).await;
        self.voiced(turn, speak).await
    }

    pub async fn speak(&self, text: &str) -> Result<Vec<u8>, ProviderError> {
        match &self.voice {
            Some(voice) => voice.synthesize(text).await,
            None => Err(ProviderError::NotConfigured("Voice synthesis")),
        }
    }

    /// Synthesis failures are reported on the reply, never fail the turn
    async fn voiced(&self, turn: TurnOutcome, speak: bool) -> AssistantReply {
        let mut reply = AssistantReply {
            turn,
            audio: None,
            audio_error: None,
        };
        if !speak {
            return reply;
        }

        match self.speak(&reply.turn.response).await {
            Ok(audio) => reply.audio = Some(audio),
            Err(e) => {
                tracing::warn!("Speech synthesis failed: {}", e);
                reply.audio_error = Some(e.to_string());
            }
        }
        reply
    }
}
