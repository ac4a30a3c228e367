use anyhow::Result;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub llm: LLMConfig,
    pub tools: ToolsConfig,
    pub audit: AuditConfig,
    pub voice: VoiceConfig,
    pub assistant: AssistantConfig,
    pub logging: LoggingConfig,
}

/// How tool declarations reach the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolMode {
    /// Provider-native function declarations and tool_calls
    Native,
    /// Declarations embedded in the system instruction; calls come back as fenced JSON
    Fenced,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LLMConfig {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub tool_mode: ToolMode,
    pub stream: bool,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 200,
            temperature: 0.7,
            tool_mode: ToolMode::Native,
            stream: false,
            request_timeout_secs: 60,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub config_path: PathBuf,
    pub execution_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("config/tools.json"),
            execution_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub backend: AuditBackend,
    pub path: PathBuf,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            backend: AuditBackend::Memory,
            path: PathBuf::from("data/audit.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub base_url: String,
    pub voice_id: String,
    pub model_id: String,
    pub output_format: String,
    pub request_timeout_secs: u64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.elevenlabs.io".to_string(),
            voice_id: "G17SuINrv2H9FC6nvetn".to_string(),
            model_id: "eleven_flash_v2_5".to_string(),
            output_format: "pcm_16000".to_string(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub base_instruction: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_instruction: "You are a helpful, concise voice assistant. Respond in 1-2 short \
                               sentences. Be conversational and natural."
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config_env = env::var("CONFIG_ENV").unwrap_or_else(|_| "default".to_string());

        let config = Config::builder()
            .add_source(File::with_name(&format!("config/{}", config_env)).required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    pub fn api_key() -> Result<String> {
        env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))
    }

    /// Voice synthesis is optional; `None` disables it
    pub fn voice_api_key() -> Option<String> {
        env::var("ELEVENLABS_API_KEY")
            .or_else(|_| env::var("ELEVEN_API_KEY"))
            .ok()
            .filter(|k| !k.is_empty())
    }
}
