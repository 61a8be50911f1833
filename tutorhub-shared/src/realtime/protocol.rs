//! Realtime data-channel messages
//!
//! JSON events exchanged with the realtime voice provider over the data
//! channel. Only the events the tutor session sends or reacts to are typed;
//! everything else is surfaced as [`ServerEvent::Other`].

use serde::{Deserialize, Serialize};

/// Short-lived credential for one realtime session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EphemeralCredential {
    pub session_id: String,

    /// Ephemeral key used as bearer for the SDP exchange
    pub client_secret: String,

    /// Unix timestamp after which the key is rejected
    pub expires_at: i64,

    pub model: String,
}

/// Fixed session configuration sent once the data channel opens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub modalities: Vec<String>,
    pub instructions: String,
    pub voice: String,
    pub input_audio_format: String,
    pub output_audio_format: String,
    pub input_audio_transcription: TranscriptionConfig,
    pub turn_detection: TurnDetection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    pub model: String,
}

/// Server-side voice activity detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub kind: String,
    pub threshold: f32,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
}

/// Default instructions for the voice tutor
pub const TUTOR_INSTRUCTIONS: &str = "You are a patient, encouraging tutor. \
Guide the student toward the answer with questions and hints instead of giving it away. \
Keep replies short and check understanding often.";

impl SessionConfig {
    pub fn tutor(instructions: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            modalities: vec!["text".to_string(), "audio".to_string()],
            instructions: instructions.into(),
            voice: voice.into(),
            input_audio_format: "pcm16".to_string(),
            output_audio_format: "pcm16".to_string(),
            input_audio_transcription: TranscriptionConfig {
                model: "whisper-1".to_string(),
            },
            turn_detection: TurnDetection {
                kind: "server_vad".to_string(),
                threshold: 0.5,
                prefix_padding_ms: 300,
                silence_duration_ms: 500,
            },
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::tutor(TUTOR_INSTRUCTIONS, "alloy")
    }
}

/// Text content part of a user message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

/// Conversation item added by the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub role: String,
    pub content: Vec<ContentPart>,
}

impl ConversationItem {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            kind: "message".to_string(),
            role: "user".to_string(),
            content: vec![ContentPart {
                kind: "input_text".to_string(),
                text: text.into(),
            }],
        }
    }
}

/// Events sent by the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },

    #[serde(rename = "response.create")]
    ResponseCreate,

    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },

    #[serde(rename = "response.cancel")]
    ResponseCancel,
}

impl ClientEvent {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Provider error payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderErrorDetail {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// Events received from the provider
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "session.created")]
    SessionCreated,

    #[serde(rename = "session.updated")]
    SessionUpdated,

    #[serde(rename = "response.audio_transcript.done")]
    TranscriptDone {
        #[serde(default)]
        transcript: String,
    },

    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputTranscriptionCompleted {
        #[serde(default)]
        transcript: String,
    },

    #[serde(rename = "response.done")]
    ResponseDone,

    #[serde(rename = "error")]
    Error { error: ProviderErrorDetail },

    #[serde(other)]
    Other,
}

impl ServerEvent {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Whether this event confirms the session configuration
    pub fn is_confirmation(&self) -> bool {
        matches!(self, ServerEvent::SessionCreated | ServerEvent::SessionUpdated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_session_update_shape() {
        let event = ClientEvent::SessionUpdate {
            session: SessionConfig::default(),
        };
        let value: Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();

        assert_eq!(value["type"], "session.update");
        assert_eq!(value["session"]["modalities"], json!(["text", "audio"]));
        assert_eq!(value["session"]["voice"], "alloy");
        assert_eq!(value["session"]["input_audio_format"], "pcm16");
        assert_eq!(value["session"]["input_audio_transcription"]["model"], "whisper-1");
        assert_eq!(value["session"]["turn_detection"]["type"], "server_vad");
    }

    #[test]
    fn test_simple_client_events() {
        assert_eq!(ClientEvent::ResponseCreate.to_json().unwrap(), r#"{"type":"response.create"}"#);
        assert_eq!(ClientEvent::ResponseCancel.to_json().unwrap(), r#"{"type":"response.cancel"}"#);
    }

    #[test]
    fn test_conversation_item_shape() {
        let event = ClientEvent::ConversationItemCreate {
            item: ConversationItem::user_text("What is 7 x 8?"),
        };
        let value: Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "conversation.item.create");
        assert_eq!(value["item"]["type"], "message");
        assert_eq!(value["item"]["role"], "user");
        assert_eq!(value["item"]["content"][0]["type"], "input_text");
        assert_eq!(value["item"]["content"][0]["text"], "What is 7 x 8?");
    }

    #[test]
    fn test_parse_server_events() {
        let created = ServerEvent::parse(r#"{"type":"session.created","session":{"id":"sess_1"}}"#).unwrap();
        assert!(created.is_confirmation());

        let updated = ServerEvent::parse(r#"{"type":"session.updated","event_id":"e1"}"#).unwrap();
        assert!(updated.is_confirmation());

        let other = ServerEvent::parse(r#"{"type":"response.audio.delta","delta":"AAAA"}"#).unwrap();
        assert_eq!(other, ServerEvent::Other);
        assert!(!other.is_confirmation());

        let error = ServerEvent::parse(
            r#"{"type":"error","error":{"type":"invalid_request_error","message":"bad"}}"#,
        )
        .unwrap();
        assert!(matches!(error, ServerEvent::Error { error } if error.message == "bad"));
    }

    #[test]
    fn test_parse_rejects_non_json() {
        assert!(ServerEvent::parse("not json").is_err());
    }
}
