//! OpenAI client
//!
//! Two calls are used:
//!
//! - `POST {base}/realtime/sessions` mints an ephemeral credential for one
//!   voice-tutor session
//! - `POST {base}/chat/completions` with `response_format = json_object`
//!   returns a JSON document (assessment questions)

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::{check_status, ProviderError};
use crate::realtime::protocol::{EphemeralCredential, SessionConfig};

const PROVIDER: &str = "openai";

#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,

    /// e.g. `https://api.openai.com/v1`
    pub base_url: String,

    pub realtime_model: String,
    pub realtime_voice: String,
    pub chat_model: String,
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("realtime_model", &self.realtime_model)
            .field("realtime_voice", &self.realtime_voice)
            .field("chat_model", &self.chat_model)
            .finish()
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            realtime_model: "gpt-4o-realtime-preview-2024-12-17".to_string(),
            realtime_voice: "alloy".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: Client,
    config: OpenAiConfig,
}

#[derive(Debug, Deserialize)]
struct ClientSecret {
    value: String,
    expires_at: i64,
}

#[derive(Debug, Deserialize)]
struct RealtimeSessionResponse {
    id: String,
    model: String,
    client_secret: ClientSecret,
}

impl From<RealtimeSessionResponse> for EphemeralCredential {
    fn from(response: RealtimeSessionResponse) -> Self {
        Self {
            session_id: response.id,
            client_secret: response.client_secret.value,
            expires_at: response.client_secret.expires_at,
            model: response.model,
        }
    }
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

impl OpenAiClient {
    pub fn new(http: Client, config: OpenAiConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Body for the realtime session request
    pub fn realtime_session_body(&self, session: &SessionConfig) -> Value {
        json!({
            "model": self.config.realtime_model,
            "voice": session.voice,
            "instructions": session.instructions,
            "modalities": session.modalities,
            "input_audio_format": session.input_audio_format,
            "output_audio_format": session.output_audio_format,
            "input_audio_transcription": session.input_audio_transcription,
            "turn_detection": session.turn_detection,
        })
    }

    /// Mints an ephemeral realtime credential
    pub async fn create_realtime_session(&self, session: &SessionConfig) -> Result<EphemeralCredential, ProviderError> {
        let response = self
            .http
            .post(self.url("realtime/sessions"))
            .bearer_auth(&self.config.api_key)
            .json(&self.realtime_session_body(session))
            .send()
            .await
            .map_err(|source| ProviderError::Request {
                provider: PROVIDER,
                source,
            })?;

        let response = check_status(PROVIDER, response).await?;
        let body: RealtimeSessionResponse = response.json().await.map_err(|e| ProviderError::InvalidResponse {
            provider: PROVIDER,
            message: e.to_string(),
        })?;

        debug!(session_id = %body.id, model = %body.model, "Created realtime session");
        Ok(body.into())
    }

    /// Body for a JSON-mode chat completion
    pub fn chat_json_body(&self, messages: &[ChatMessage]) -> Value {
        json!({
            "model": self.config.chat_model,
            "messages": messages,
            "response_format": { "type": "json_object" },
            "temperature": 0.7,
        })
    }

    /// Runs a chat completion in JSON mode and parses the reply
    pub async fn chat_json(&self, messages: &[ChatMessage]) -> Result<Value, ProviderError> {
        let response = self
            .http
            .post(self.url("chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(&self.chat_json_body(messages))
            .send()
            .await
            .map_err(|source| ProviderError::Request {
                provider: PROVIDER,
                source,
            })?;

        let response = check_status(PROVIDER, response).await?;
        let body: Value = response.json().await.map_err(|e| ProviderError::InvalidResponse {
            provider: PROVIDER,
            message: e.to_string(),
        })?;

        parse_chat_content(&body)
    }
}

/// Extracts and parses `choices[0].message.content` as JSON
pub fn parse_chat_content(body: &Value) -> Result<Value, ProviderError> {
    let content = body["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| ProviderError::InvalidResponse {
            provider: PROVIDER,
            message: "missing choices[0].message.content".to_string(),
        })?;

    serde_json::from_str(content).map_err(|e| ProviderError::InvalidResponse {
        provider: PROVIDER,
        message: format!("content is not JSON: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OpenAiClient {
        OpenAiClient::new(
            Client::new(),
            OpenAiConfig {
                api_key: "sk-test".to_string(),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_realtime_session_body() {
        let body = client().realtime_session_body(&SessionConfig::tutor("Be kind", "verse"));
        assert_eq!(body["model"], "gpt-4o-realtime-preview-2024-12-17");
        assert_eq!(body["voice"], "verse");
        assert_eq!(body["instructions"], "Be kind");
        assert_eq!(body["turn_detection"]["type"], "server_vad");
    }

    #[test]
    fn test_realtime_response_to_credential() {
        let raw = r#"{
            "id": "sess_001",
            "object": "realtime.session",
            "model": "gpt-4o-realtime-preview-2024-12-17",
            "client_secret": { "value": "ek_123", "expires_at": 1734626400 }
        }"#;
        let response: RealtimeSessionResponse = serde_json::from_str(raw).unwrap();
        let credential: EphemeralCredential = response.into();
        assert_eq!(credential.session_id, "sess_001");
        assert_eq!(credential.client_secret, "ek_123");
        assert_eq!(credential.expires_at, 1734626400);
    }

    #[test]
    fn test_chat_json_body() {
        let body = client().chat_json_body(&[ChatMessage::system("sys"), ChatMessage::user("hi")]);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "hi");
    }

    #[test]
    fn test_parse_chat_content() {
        let body = json!({
            "choices": [{ "message": { "role": "assistant", "content": "{\"questions\": []}" } }]
        });
        assert_eq!(parse_chat_content(&body).unwrap(), json!({ "questions": [] }));

        let not_json = json!({ "choices": [{ "message": { "content": "sorry" } }] });
        assert!(matches!(
            parse_chat_content(&not_json),
            Err(ProviderError::InvalidResponse { .. })
        ));

        assert!(parse_chat_content(&json!({})).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_request_error() {
        let client = OpenAiClient::new(
            Client::new(),
            OpenAiConfig {
                base_url: "http://127.0.0.1:1/v1".to_string(),
                ..Default::default()
            },
        );
        let result = client.chat_json(&[ChatMessage::user("hi")]).await;
        assert!(matches!(result, Err(ProviderError::Request { .. })));
    }
}
