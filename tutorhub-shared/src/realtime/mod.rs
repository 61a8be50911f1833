//! Realtime voice tutor
//!
//! - [`protocol`]: data-channel events and the fixed session configuration
//! - [`session`]: session state machine over an abstract peer connection
//! - [`http`]: API-backed credential source and usage reporter

pub mod http;
pub mod protocol;
pub mod session;

pub use protocol::{ClientEvent, EphemeralCredential, ServerEvent, SessionConfig};
pub use session::{
    CredentialSource, PeerConnection, PeerEvent, RealtimeSession, SessionError, SessionState, SessionUsage,
    UsageReporter,
};
