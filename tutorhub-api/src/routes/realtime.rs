/// Realtime voice tutor endpoints
///
/// The client never sees the OpenAI API key: it asks this server for an
/// ephemeral credential, connects to the provider directly with it, and
/// reports the session duration back when it disconnects.
///
/// # Endpoints
///
/// - `POST /v1/realtime/sessions`: mint an ephemeral credential
/// - `POST /v1/realtime/sessions/usage`: record a finished session
use crate::app::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tutorhub_shared::auth::{Capability, SessionContext};
use tutorhub_shared::models::session_log::{CreateSessionLog, RealtimeSessionLog};
use tutorhub_shared::realtime::protocol::TUTOR_INSTRUCTIONS;
use tutorhub_shared::realtime::{EphemeralCredential, SessionConfig};
use validator::Validate;

/// Longest session accepted in a usage report (4 hours)
const MAX_SESSION_SECONDS: i64 = 4 * 3600;

/// Mints an ephemeral realtime credential
///
/// # Response
///
/// ```json
/// {
///   "session_id": "sess_001",
///   "client_secret": "ek_...",
///   "expires_at": 1734626400,
///   "model": "gpt-4o-realtime-preview-2024-12-17"
/// }
/// ```
///
/// # Errors
///
/// - 403 Forbidden: missing UseVoiceTutor
/// - 429 Too Many Requests: rate limit exceeded
/// - 502 Bad Gateway: OpenAI request failed
pub async fn create_session(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> ApiResult<Json<EphemeralCredential>> {
    session.require(Capability::UseVoiceTutor)?;

    let config = SessionConfig::tutor(TUTOR_INSTRUCTIONS, state.config.openai.realtime_voice.clone());
    let credential = state.openai.create_realtime_session(&config).await?;

    tracing::info!(
        user_id = %session.user_id,
        organization_id = %session.organization_id,
        session_id = %credential.session_id,
        model = %credential.model,
        "Minted realtime credential"
    );

    Ok(Json(credential))
}

/// Usage report sent on disconnect
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UsageRequest {
    #[validate(length(min = 1, max = 255))]
    pub session_id: String,

    #[validate(length(min = 1, max = 255))]
    pub model: String,

    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,

    #[validate(range(min = 0, max = 14400))]
    pub duration_seconds: i64,
}

impl UsageRequest {
    fn check_interval(&self) -> Result<(), ApiError> {
        if self.ended_at < self.started_at {
            return Err(ApiError::BadRequest("ended_at is before started_at".to_string()));
        }
        if (self.ended_at - self.started_at).num_seconds() > MAX_SESSION_SECONDS {
            return Err(ApiError::BadRequest("Session is longer than allowed".to_string()));
        }
        Ok(())
    }
}

/// Records a finished voice session
///
/// # Errors
///
/// - 400 Bad Request: inconsistent interval
/// - 403 Forbidden: missing UseVoiceTutor
/// - 422 Unprocessable Entity: validation errors
pub async fn record_usage(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Json(request): Json<UsageRequest>,
) -> ApiResult<(StatusCode, Json<RealtimeSessionLog>)> {
    session.require(Capability::UseVoiceTutor)?;
    request.validate()?;
    request.check_interval()?;

    let log = RealtimeSessionLog::create(
        &state.db,
        CreateSessionLog {
            organization_id: session.organization_id,
            user_id: session.user_id,
            session_id: request.session_id,
            model: request.model,
            started_at: request.started_at,
            ended_at: request.ended_at,
            duration_seconds: request.duration_seconds,
        },
    )
    .await?;

    tracing::info!(
        user_id = %session.user_id,
        session_id = %log.session_id,
        duration_seconds = log.duration_seconds,
        "Recorded realtime session usage"
    );

    Ok((StatusCode::CREATED, Json(log)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn usage(duration: i64) -> UsageRequest {
        let started_at = Utc::now();
        UsageRequest {
            session_id: "sess_001".to_string(),
            model: "gpt-4o-realtime-preview-2024-12-17".to_string(),
            started_at,
            ended_at: started_at + Duration::seconds(duration),
            duration_seconds: duration,
        }
    }

    #[test]
    fn test_valid_usage() {
        let request = usage(95);
        assert!(request.validate().is_ok());
        assert!(request.check_interval().is_ok());
    }

    #[test]
    fn test_reversed_interval_rejected() {
        let mut request = usage(95);
        std::mem::swap(&mut request.started_at, &mut request.ended_at);
        assert!(matches!(request.check_interval(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_overlong_session_rejected() {
        assert!(usage(MAX_SESSION_SECONDS + 1).validate().is_err());
        assert!(usage(MAX_SESSION_SECONDS + 1).check_interval().is_err());
    }

    #[test]
    fn test_empty_session_id_rejected() {
        let mut request = usage(10);
        request.session_id.clear();
        assert!(request.validate().is_err());
    }
}
