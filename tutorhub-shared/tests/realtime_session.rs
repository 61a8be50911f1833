//! Realtime session protocol against an in-memory peer connection

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tutorhub_shared::realtime::{
    CredentialSource, EphemeralCredential, PeerConnection, PeerEvent, RealtimeSession, SessionConfig,
    SessionError, SessionState, SessionUsage, UsageReporter,
};

#[derive(Default)]
struct PeerLog {
    sent: Vec<String>,
    microphone_enabled: Option<bool>,
    opened_with: Option<String>,
    closed: bool,
}

struct FakePeer {
    events: VecDeque<PeerEvent>,
    log: Arc<Mutex<PeerLog>>,
}

impl FakePeer {
    fn new(events: Vec<PeerEvent>) -> (Self, Arc<Mutex<PeerLog>>) {
        let log = Arc::new(Mutex::new(PeerLog::default()));
        (
            Self {
                events: events.into(),
                log: log.clone(),
            },
            log,
        )
    }

    fn confirming() -> (Self, Arc<Mutex<PeerLog>>) {
        Self::new(vec![
            PeerEvent::DataChannelOpen,
            PeerEvent::Message(r#"{"type":"session.created","session":{}}"#.to_string()),
            PeerEvent::Message(r#"{"type":"session.updated"}"#.to_string()),
            PeerEvent::Message(r#"{"type":"response.done"}"#.to_string()),
        ])
    }
}

#[async_trait]
impl PeerConnection for FakePeer {
    async fn open(&mut self, credential: &EphemeralCredential) -> Result<(), SessionError> {
        self.log.lock().unwrap().opened_with = Some(credential.client_secret.clone());
        Ok(())
    }

    async fn next_event(&mut self) -> Option<PeerEvent> {
        self.events.pop_front()
    }

    async fn send(&mut self, message: String) -> Result<(), SessionError> {
        self.log.lock().unwrap().sent.push(message);
        Ok(())
    }

    fn set_microphone_enabled(&mut self, enabled: bool) {
        self.log.lock().unwrap().microphone_enabled = Some(enabled);
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.log.lock().unwrap().closed = true;
        Ok(())
    }
}

struct FakeCredentials {
    fail: bool,
}

#[async_trait]
impl CredentialSource for FakeCredentials {
    async fn fetch(&self) -> Result<EphemeralCredential, SessionError> {
        if self.fail {
            return Err(SessionError::Credential("denied".to_string()));
        }
        Ok(EphemeralCredential {
            session_id: "sess_123".to_string(),
            client_secret: "ek_abc".to_string(),
            expires_at: 1_900_000_000,
            model: "gpt-4o-realtime-preview-2024-12-17".to_string(),
        })
    }
}

#[derive(Clone, Default)]
struct FakeReporter {
    fail: bool,
    reports: Arc<Mutex<Vec<SessionUsage>>>,
}

#[async_trait]
impl UsageReporter for FakeReporter {
    async fn report(&self, usage: &SessionUsage) -> Result<(), SessionError> {
        if self.fail {
            return Err(SessionError::Usage("offline".to_string()));
        }
        self.reports.lock().unwrap().push(usage.clone());
        Ok(())
    }
}

fn message_types(log: &Arc<Mutex<PeerLog>>) -> Vec<String> {
    log.lock()
        .unwrap()
        .sent
        .iter()
        .map(|m| {
            let value: Value = serde_json::from_str(m).unwrap();
            value["type"].as_str().unwrap().to_string()
        })
        .collect()
}

fn session(
    peer: FakePeer,
    reporter: FakeReporter,
) -> RealtimeSession<FakePeer, FakeCredentials, FakeReporter> {
    RealtimeSession::new(peer, FakeCredentials { fail: false }, reporter, SessionConfig::default())
}

#[tokio::test]
async fn test_connect_sends_update_then_single_response_create() {
    let (peer, log) = FakePeer::confirming();
    let mut session = session(peer, FakeReporter::default());
    assert_eq!(session.state(), SessionState::Idle);

    session.connect().await.unwrap();

    assert_eq!(session.state(), SessionState::Active);
    assert_eq!(log.lock().unwrap().opened_with.as_deref(), Some("ek_abc"));
    assert_eq!(message_types(&log), vec!["session.update", "response.create"]);

    // A second confirmation after activation does not trigger another response.
    let event = session.next_event().await.unwrap();
    assert!(event.is_some());
    assert_eq!(message_types(&log), vec!["session.update", "response.create"]);
}

#[tokio::test]
async fn test_session_update_carries_configuration() {
    let (peer, log) = FakePeer::confirming();
    let mut session = session(peer, FakeReporter::default());
    session.connect().await.unwrap();

    let first: Value = serde_json::from_str(&log.lock().unwrap().sent[0]).unwrap();
    assert_eq!(first["session"]["voice"], "alloy");
    assert_eq!(first["session"]["turn_detection"]["type"], "server_vad");
}

#[tokio::test]
async fn test_operations_require_connection() {
    let (peer, _log) = FakePeer::confirming();
    let mut session = session(peer, FakeReporter::default());

    assert!(matches!(session.mute(), Err(SessionError::NotConnected)));
    assert!(matches!(session.unmute(), Err(SessionError::NotConnected)));
    assert!(matches!(session.send_text("hi").await, Err(SessionError::NotConnected)));
    assert!(matches!(session.cancel().await, Err(SessionError::NotConnected)));
    assert!(matches!(session.disconnect().await, Err(SessionError::NotConnected)));
}

#[tokio::test]
async fn test_send_text_cancel_and_mute() {
    let (peer, log) = FakePeer::confirming();
    let mut session = session(peer, FakeReporter::default());
    session.connect().await.unwrap();

    session.send_text("Explain photosynthesis").await.unwrap();
    session.cancel().await.unwrap();

    assert_eq!(
        message_types(&log),
        vec![
            "session.update",
            "response.create",
            "conversation.item.create",
            "response.create",
            "response.cancel",
        ]
    );

    let item: Value = serde_json::from_str(&log.lock().unwrap().sent[2]).unwrap();
    assert_eq!(item["item"]["content"][0]["text"], "Explain photosynthesis");

    session.mute().unwrap();
    assert!(session.is_muted());
    assert_eq!(log.lock().unwrap().microphone_enabled, Some(false));

    session.unmute().unwrap();
    assert!(!session.is_muted());
    assert_eq!(log.lock().unwrap().microphone_enabled, Some(true));
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_reports_duration() {
    let (peer, log) = FakePeer::confirming();
    let reporter = FakeReporter::default();
    let mut session = session(peer, reporter.clone());
    session.connect().await.unwrap();

    tokio::time::advance(Duration::from_secs(95)).await;
    let usage = session.disconnect().await.unwrap();

    assert_eq!(usage.duration_seconds, 95);
    assert_eq!(usage.session_id, "sess_123");
    assert_eq!(session.state(), SessionState::Closed);
    assert!(log.lock().unwrap().closed);

    let reports = reporter.reports.lock().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0], usage);
}

#[tokio::test]
async fn test_failed_usage_report_still_closes() {
    let (peer, log) = FakePeer::confirming();
    let reporter = FakeReporter {
        fail: true,
        ..Default::default()
    };
    let mut session = session(peer, reporter);
    session.connect().await.unwrap();

    session.disconnect().await.unwrap();
    assert_eq!(session.state(), SessionState::Closed);
    assert!(log.lock().unwrap().closed);
}

#[tokio::test]
async fn test_credential_failure_propagates() {
    let (peer, log) = FakePeer::confirming();
    let mut session = RealtimeSession::new(
        peer,
        FakeCredentials { fail: true },
        FakeReporter::default(),
        SessionConfig::default(),
    );

    assert!(matches!(session.connect().await, Err(SessionError::Credential(_))));
    assert_eq!(session.state(), SessionState::Closed);
    assert!(log.lock().unwrap().sent.is_empty());
}

#[tokio::test]
async fn test_peer_closing_before_confirmation() {
    let (peer, log) = FakePeer::new(vec![PeerEvent::DataChannelOpen, PeerEvent::Closed]);
    let mut session = session(peer, FakeReporter::default());

    assert!(matches!(session.connect().await, Err(SessionError::ChannelClosed)));
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(message_types(&log), vec!["session.update"]);
}

#[tokio::test]
async fn test_connect_twice_is_rejected() {
    let (peer, _log) = FakePeer::confirming();
    let mut session = session(peer, FakeReporter::default());
    session.connect().await.unwrap();
    assert!(matches!(session.connect().await, Err(SessionError::AlreadyConnected)));
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_after_provider_closed() {
    let (peer, log) = FakePeer::new(vec![
        PeerEvent::DataChannelOpen,
        PeerEvent::Message(r#"{"type":"session.created","session":{}}"#.to_string()),
        PeerEvent::Closed,
    ]);
    let reporter = FakeReporter::default();
    let mut session = session(peer, reporter.clone());
    session.connect().await.unwrap();

    tokio::time::advance(Duration::from_secs(30)).await;
    assert!(session.next_event().await.unwrap().is_none());
    assert_eq!(session.state(), SessionState::Closed);
    assert!(matches!(session.send_text("hi").await, Err(SessionError::NotConnected)));

    let usage = session.disconnect().await.unwrap();
    assert_eq!(usage.duration_seconds, 30);
    assert!(log.lock().unwrap().closed);
    assert_eq!(reporter.reports.lock().unwrap().len(), 1);

    // torn down once
    assert!(matches!(session.disconnect().await, Err(SessionError::NotConnected)));
    assert_eq!(reporter.reports.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_disconnect_after_failed_connect_reports_nothing() {
    let (peer, _log) = FakePeer::new(vec![PeerEvent::DataChannelOpen, PeerEvent::Closed]);
    let reporter = FakeReporter::default();
    let mut session = session(peer, reporter.clone());

    assert!(session.connect().await.is_err());
    assert!(matches!(session.disconnect().await, Err(SessionError::NotConnected)));
    assert!(reporter.reports.lock().unwrap().is_empty());
}
