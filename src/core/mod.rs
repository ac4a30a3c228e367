//! Hosted provider clients: language model and speech synthesis

pub mod llm;
pub mod voice;

pub use llm::{ModelProvider, ModelReply, OpenAiClient, Turn};
pub use voice::{ElevenLabsClient, SpeechSynthesizer};
