//! Realtime voice-tutor session
//!
//! Drives one peer connection to the realtime provider through its
//! lifecycle:
//!
//! ```text
//! Idle → Connecting → AwaitingConfirmation → Active → Closed
//! ```
//!
//! `connect` fetches an ephemeral credential, opens the peer connection and
//! pumps peer events until the provider confirms the session. On the data
//! channel opening exactly one `session.update` is sent; on the first
//! `session.created`/`session.updated` exactly one `response.create` follows.
//! `disconnect` reports the session duration before closing, also after the
//! provider closed first; a failed report is logged and does not stop the
//! close.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::protocol::{ClientEvent, ConversationItem, EphemeralCredential, ServerEvent, SessionConfig};

/// Error type for realtime sessions
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Operation needs an active session
    #[error("Session is not connected")]
    NotConnected,

    /// `connect` called on a live session
    #[error("Session is already connected")]
    AlreadyConnected,

    /// Could not obtain an ephemeral credential
    #[error("Failed to obtain realtime credential: {0}")]
    Credential(String),

    /// Peer connection failure
    #[error("Peer connection error: {0}")]
    Peer(String),

    /// Peer closed before the session became active
    #[error("Peer connection closed")]
    ChannelClosed,

    /// Usage report failed
    #[error("Failed to report usage: {0}")]
    Usage(String),

    /// Malformed data-channel message
    #[error("Invalid realtime message: {0}")]
    Protocol(#[from] serde_json::Error),
}

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    AwaitingConfirmation,
    Active,
    Closed,
}

/// Event produced by a peer connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// The JSON data channel is open
    DataChannelOpen,

    /// Text message received on the data channel
    Message(String),

    /// The connection or data channel closed
    Closed,
}

/// Source of ephemeral credentials
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn fetch(&self) -> Result<EphemeralCredential, SessionError>;
}

/// Media and data transport to the provider
///
/// `open` adds the microphone track, creates the data channel and performs
/// the SDP offer/answer exchange authorized by the ephemeral credential.
#[async_trait]
pub trait PeerConnection: Send {
    async fn open(&mut self, credential: &EphemeralCredential) -> Result<(), SessionError>;

    /// Next event, `None` once the connection is gone
    async fn next_event(&mut self) -> Option<PeerEvent>;

    async fn send(&mut self, message: String) -> Result<(), SessionError>;

    fn set_microphone_enabled(&mut self, enabled: bool);

    /// Closes the data channel, stops local media and closes the connection
    async fn close(&mut self) -> Result<(), SessionError>;
}

/// Usage of one finished session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUsage {
    pub session_id: String,
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: i64,
}

/// Destination for usage reports
#[async_trait]
pub trait UsageReporter: Send + Sync {
    async fn report(&self, usage: &SessionUsage) -> Result<(), SessionError>;
}

/// One voice-tutor session over a peer connection
pub struct RealtimeSession<P, C, R> {
    peer: P,
    credentials: C,
    reporter: R,
    config: SessionConfig,
    state: SessionState,
    credential: Option<EphemeralCredential>,
    started: Option<(Instant, DateTime<Utc>)>,
    muted: bool,
}

impl<P, C, R> RealtimeSession<P, C, R>
where
    P: PeerConnection,
    C: CredentialSource,
    R: UsageReporter,
{
    pub fn new(peer: P, credentials: C, reporter: R, config: SessionConfig) -> Self {
        Self {
            peer,
            credentials,
            reporter,
            config,
            state: SessionState::Idle,
            credential: None,
            started: None,
            muted: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn credential(&self) -> Option<&EphemeralCredential> {
        self.credential.as_ref()
    }

    pub fn peer(&self) -> &P {
        &self.peer
    }

    /// Opens the session and waits for the provider to confirm it
    ///
    /// # Errors
    ///
    /// Returns `AlreadyConnected` on a live session. Credential, peer and
    /// protocol errors propagate and leave the session `Closed`.
    pub async fn connect(&mut self) -> Result<(), SessionError> {
        if !matches!(self.state, SessionState::Idle | SessionState::Closed) {
            return Err(SessionError::AlreadyConnected);
        }

        self.state = SessionState::Connecting;
        self.muted = false;
        self.started = Some((Instant::now(), Utc::now()));

        let result = self.establish().await;
        if result.is_err() {
            self.state = SessionState::Closed;
            self.credential = None;
            self.started = None;
            if let Err(e) = self.peer.close().await {
                debug!(error = %e, "Closing failed peer connection");
            }
        }
        result
    }

    async fn establish(&mut self) -> Result<(), SessionError> {
        let credential = self.credentials.fetch().await?;
        debug!(session_id = %credential.session_id, "Obtained realtime credential");

        self.peer.open(&credential).await?;
        self.credential = Some(credential);

        while self.state != SessionState::Active {
            match self.peer.next_event().await {
                Some(event) => {
                    self.handle_peer_event(event).await?;
                }
                None => return Err(SessionError::ChannelClosed),
            }
            if self.state == SessionState::Closed {
                return Err(SessionError::ChannelClosed);
            }
        }

        info!(
            session_id = self.credential.as_ref().map(|c| c.session_id.as_str()).unwrap_or_default(),
            "Realtime session active"
        );
        Ok(())
    }

    /// Applies one peer event to the session
    ///
    /// Returns the decoded provider event for data-channel messages.
    pub async fn handle_peer_event(&mut self, event: PeerEvent) -> Result<Option<ServerEvent>, SessionError> {
        match event {
            PeerEvent::DataChannelOpen => {
                if self.state == SessionState::Connecting {
                    let update = ClientEvent::SessionUpdate {
                        session: self.config.clone(),
                    };
                    self.send_event(&update).await?;
                    self.state = SessionState::AwaitingConfirmation;
                }
                Ok(None)
            }
            PeerEvent::Message(raw) => {
                let event = ServerEvent::parse(&raw)?;

                if let ServerEvent::Error { error } = &event {
                    warn!(code = ?error.code, message = %error.message, "Realtime provider error");
                }

                if self.state == SessionState::AwaitingConfirmation && event.is_confirmation() {
                    self.send_event(&ClientEvent::ResponseCreate).await?;
                    self.state = SessionState::Active;
                }

                Ok(Some(event))
            }
            PeerEvent::Closed => {
                self.state = SessionState::Closed;
                Ok(None)
            }
        }
    }

    /// Waits for the next provider event on an active session
    pub async fn next_event(&mut self) -> Result<Option<ServerEvent>, SessionError> {
        self.require_active()?;

        loop {
            match self.peer.next_event().await {
                Some(event) => {
                    if let Some(server_event) = self.handle_peer_event(event).await? {
                        return Ok(Some(server_event));
                    }
                    if self.state == SessionState::Closed {
                        return Ok(None);
                    }
                }
                None => {
                    self.state = SessionState::Closed;
                    return Ok(None);
                }
            }
        }
    }

    pub fn mute(&mut self) -> Result<(), SessionError> {
        self.require_active()?;
        self.peer.set_microphone_enabled(false);
        self.muted = true;
        Ok(())
    }

    pub fn unmute(&mut self) -> Result<(), SessionError> {
        self.require_active()?;
        self.peer.set_microphone_enabled(true);
        self.muted = false;
        Ok(())
    }

    /// Sends a typed user message and asks for a response
    pub async fn send_text(&mut self, text: &str) -> Result<(), SessionError> {
        self.require_active()?;

        let item = ClientEvent::ConversationItemCreate {
            item: ConversationItem::user_text(text),
        };
        self.send_event(&item).await?;
        self.send_event(&ClientEvent::ResponseCreate).await
    }

    /// Interrupts the response in progress
    pub async fn cancel(&mut self) -> Result<(), SessionError> {
        self.require_active()?;
        self.send_event(&ClientEvent::ResponseCancel).await
    }

    /// Reports usage and closes the session
    ///
    /// Also tears down a session the provider already closed. Returns the
    /// reported usage; `NotConnected` when no session was established or it
    /// was already torn down.
    pub async fn disconnect(&mut self) -> Result<SessionUsage, SessionError> {
        if !matches!(self.state, SessionState::Active | SessionState::Closed) {
            return Err(SessionError::NotConnected);
        }

        let (started_instant, started_at) = self.started.take().ok_or(SessionError::NotConnected)?;
        let elapsed = started_instant.elapsed();
        let credential = self.credential.take().ok_or(SessionError::NotConnected)?;

        let usage = SessionUsage {
            session_id: credential.session_id,
            model: credential.model,
            started_at,
            ended_at: Utc::now(),
            duration_seconds: elapsed.as_secs() as i64,
        };

        if let Err(e) = self.reporter.report(&usage).await {
            warn!(error = %e, session_id = %usage.session_id, "Failed to report realtime usage");
        }

        self.state = SessionState::Closed;
        self.peer.close().await?;

        info!(
            session_id = %usage.session_id,
            duration_seconds = usage.duration_seconds,
            "Realtime session closed"
        );
        Ok(usage)
    }

    fn require_active(&self) -> Result<(), SessionError> {
        if self.state == SessionState::Active {
            Ok(())
        } else {
            Err(SessionError::NotConnected)
        }
    }

    async fn send_event(&mut self, event: &ClientEvent) -> Result<(), SessionError> {
        let message = event.to_json()?;
        self.peer.send(message).await
    }
}
