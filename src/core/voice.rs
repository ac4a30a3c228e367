use crate::config::VoiceConfig;
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Turns assistant text into audio bytes
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ProviderError>;
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

/// ElevenLabs text-to-speech client
pub struct ElevenLabsClient {
    client: Client,
    api_key: String,
    config: VoiceConfig,
}

impl ElevenLabsClient {
    pub fn new(api_key: String, config: VoiceConfig) -> Result<Self, ProviderError> {
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
        format!(
            "{}/v1/text-to-speech/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.voice_id
        )
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsClient {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ProviderError> {
        if text.trim().is_empty() {
            return Err(ProviderError::InvalidRequest("No text provided".to_string()));
        }

        tracing::debug!(
            "[ElevenLabsClient] Synthesizing {} chars with voice {}",
            text.len(),
            self.config.voice_id
        );

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("output_format", self.config.output_format.as_str())])
            .header("xi-api-key", &self.api_key)
            .json(&SpeechRequest {
                text,
                model_id: &self.config.model_id,
            })
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

        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ElevenLabsClient {
        let config = VoiceConfig {
            base_url: server.uri(),
            voice_id: "voice-1".to_string(),
            ..VoiceConfig::default()
        };
        ElevenLabsClient::new("xi-key".to_string(), config).unwrap()
    }

    #[tokio::test]
    async fn test_synthesize_returns_audio_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/text-to-speech/voice-1"))
            .and(query_param("output_format", "pcm_16000"))
            .and(header("xi-api-key", "xi-key"))
            .and(body_json(json!({"text": "Hello", "model_id": "eleven_flash_v2_5"})))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3, 4]))
            .mount(&server)
            .await;

        let audio = client_for(&server).synthesize("Hello").await.unwrap();
        assert_eq!(audio, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_empty_text_is_rejected_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = client_for(&server).synthesize("  ").await.unwrap_err();
        assert_eq!(err.to_string(), "No text provided");
    }

    #[tokio::test]
    async fn test_provider_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = client_for(&server).synthesize("Hello").await.unwrap_err();
        assert!(matches!(err, ProviderError::Status { status: 401, .. }));
    }
}
