//! Vocalis - Voice assistant front end with a gated tool-calling subsystem
//!
//! A hosted language model may request local side-effecting actions
//! ("tools"). Requests are validated against declarative schemas, held
//! behind a confirmation gate, executed with panics and deadlines contained,
//! and recorded in an append-only execution log.
//!
//! Collaborators are constructed once at startup and passed down explicitly:
//!
//! ```no_run
//! use vocalis::{Assistant, Settings};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let settings = Settings::new()?;
//! let assistant = Assistant::from_settings(&settings, Settings::api_key()?)?;
//! let reply = assistant.respond("Save a note saying hi", &[], false).await;
//! println!("{}", reply.turn.response);
//! # Ok(())
//! # }
//! ```

pub mod assistant;
pub mod audit;
pub mod bridge;
mod config;
pub mod core;
pub mod error;
pub mod tools;
pub mod utils;

pub mod cli;

pub use assistant::{approval_message, build_dispatcher, Assistant, AssistantReply};
pub use bridge::{ToolCallBridge, ToolExecution, TurnOutcome};
pub use crate::config::{
    AssistantConfig, AuditBackend, AuditConfig, LLMConfig, LoggingConfig, Settings, ToolMode,
    ToolsConfig, VoiceConfig,
};
pub use crate::core::llm::{ModelProvider, ModelReply, OpenAiClient, Turn};
pub use crate::core::voice::{ElevenLabsClient, SpeechSynthesizer};
pub use error::{ConfigError, ProviderError, ToolError, ToolErrorKind};
pub use tools::dispatcher::ToolDispatcher;
pub use tools::registry::ToolRegistry;
pub use tools::{Parameters, Tool, ToolCallRequest, ToolResult};
