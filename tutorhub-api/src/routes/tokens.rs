/// Agora access token endpoints
///
/// Lesson rooms, lesson messaging, chat and classrooms authorize clients
/// with AccessToken2 strings minted here from the project credentials.
///
/// # Endpoints
///
/// - `POST /v1/tokens/rtc`: lesson video room
/// - `POST /v1/tokens/rtm`: lesson messaging for the caller
/// - `POST /v1/tokens/chat`: chat user token, or app token for admins
/// - `POST /v1/tokens/education`: classroom token
///
/// # Example Response
///
/// ```json
/// {
///   "token": "007eJxTYBBbsMMnPH...",
///   "app_id": "970CA35de60c44645bbae8a215061b33",
///   "expires_in": 3600
/// }
/// ```
use crate::app::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use tutorhub_shared::auth::{AuthzError, Capability, SessionContext};
use tutorhub_shared::token::{ChatTokenBuilder, EducationTokenBuilder, RtcRole, RtcTokenBuilder, RtmTokenBuilder};
use validator::Validate;

/// Token response shared by all token endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    pub app_id: String,

    /// Lifetime in seconds
    pub expires_in: u32,
}

fn token_response(state: &AppState, token: String) -> Json<TokenResponse> {
    Json(TokenResponse {
        token,
        app_id: state.config.agora.app_id.clone(),
        expires_in: state.config.agora.token_ttl_seconds,
    })
}

fn default_rtc_role() -> RtcRole {
    RtcRole::Publisher
}

/// Account an RTC token is issued for
///
/// Defaults to the caller's user id. Any other account needs IssueAppToken.
pub fn rtc_account(session: &SessionContext, requested: Option<&str>) -> Result<String, AuthzError> {
    let own = session.user_id.to_string();
    match requested {
        Some(account) if account != own => {
            session.require(Capability::IssueAppToken)?;
            Ok(account.to_string())
        }
        _ => Ok(own),
    }
}

/// RTC token request
///
/// `uid` and `account` are mutually exclusive; with neither, the caller's
/// user id is used as the account. Only owners and admins may name another
/// account.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RtcTokenRequest {
    #[validate(length(min = 1, max = 64))]
    pub channel_name: String,

    /// Numeric uid; 0 lets any user join with the token
    pub uid: Option<u32>,

    #[validate(length(min = 1, max = 255))]
    pub account: Option<String>,

    #[serde(default = "default_rtc_role")]
    pub role: RtcRole,

    /// Also grant RTM login for the same account
    #[serde(default)]
    pub include_rtm: bool,
}

/// Issues a lesson room token
///
/// # Errors
///
/// - 400 Bad Request: both `uid` and `account`, or `include_rtm` with a uid
/// - 403 Forbidden: missing JoinLesson, or an `account` other than the
///   caller's without IssueAppToken
/// - 422 Unprocessable Entity: validation errors
pub async fn rtc_token(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Json(request): Json<RtcTokenRequest>,
) -> ApiResult<Json<TokenResponse>> {
    session.require(Capability::JoinLesson)?;
    request.validate()?;

    let agora = &state.config.agora;
    let ttl = agora.token_ttl_seconds;

    let token = match (request.uid, request.account.as_deref()) {
        (Some(_), Some(_)) => {
            return Err(ApiError::BadRequest("Specify either uid or account, not both".to_string()));
        }
        (Some(_), None) if request.include_rtm => {
            return Err(ApiError::BadRequest("include_rtm requires an account".to_string()));
        }
        (Some(uid), None) => RtcTokenBuilder::build_token_with_uid(
            &agora.app_id,
            &agora.app_certificate,
            &request.channel_name,
            uid,
            request.role,
            ttl,
            ttl,
        )?,
        (None, account) => {
            let account = rtc_account(&session, account)?;
            if request.include_rtm {
                RtcTokenBuilder::build_token_with_rtm(
                    &agora.app_id,
                    &agora.app_certificate,
                    &request.channel_name,
                    &account,
                    request.role,
                    ttl,
                    ttl,
                )?
            } else {
                RtcTokenBuilder::build_token_with_user_account(
                    &agora.app_id,
                    &agora.app_certificate,
                    &request.channel_name,
                    &account,
                    request.role,
                    ttl,
                    ttl,
                )?
            }
        }
    };

    tracing::info!(
        user_id = %session.user_id,
        channel = %request.channel_name,
        role = ?request.role,
        "Issued RTC token"
    );

    Ok(token_response(&state, token))
}

/// Issues an RTM login token for the caller
pub async fn rtm_token(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> ApiResult<Json<TokenResponse>> {
    session.require(Capability::JoinLesson)?;

    let agora = &state.config.agora;
    let token = RtmTokenBuilder::build_token(
        &agora.app_id,
        &agora.app_certificate,
        &session.user_id.to_string(),
        agora.token_ttl_seconds,
    )?;

    tracing::info!(user_id = %session.user_id, "Issued RTM token");
    Ok(token_response(&state, token))
}

/// Chat token scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatTokenKind {
    User,
    App,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatTokenRequest {
    pub kind: ChatTokenKind,
}

/// Issues a chat token
///
/// A user token is always for the caller. App tokens require IssueAppToken.
pub async fn chat_token(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Json(request): Json<ChatTokenRequest>,
) -> ApiResult<Json<TokenResponse>> {
    session.require(Capability::JoinLesson)?;

    let agora = &state.config.agora;
    let ttl = agora.token_ttl_seconds;

    let token = match request.kind {
        ChatTokenKind::User => ChatTokenBuilder::build_user_token(
            &agora.app_id,
            &agora.app_certificate,
            &session.user_id.to_string(),
            ttl,
        )?,
        ChatTokenKind::App => {
            session.require(Capability::IssueAppToken)?;
            ChatTokenBuilder::build_app_token(&agora.app_id, &agora.app_certificate, ttl)?
        }
    };

    tracing::info!(user_id = %session.user_id, kind = ?request.kind, "Issued chat token");
    Ok(token_response(&state, token))
}

/// Classroom token scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EducationTokenKind {
    /// Participant of one room
    RoomUser,

    /// User outside any room
    User,

    /// Server-side classroom management
    App,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EducationTokenRequest {
    pub kind: EducationTokenKind,

    /// Required for `room_user`
    #[validate(length(min = 1, max = 64))]
    pub room_uuid: Option<String>,

    /// Classroom role code, required for `room_user`
    pub role: Option<i16>,
}

/// Issues a classroom token for the caller
///
/// # Errors
///
/// - 400 Bad Request: `room_user` without `room_uuid` or `role`
/// - 403 Forbidden: missing JoinLesson, or IssueAppToken for `app`
pub async fn education_token(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Json(request): Json<EducationTokenRequest>,
) -> ApiResult<Json<TokenResponse>> {
    session.require(Capability::JoinLesson)?;
    request.validate()?;

    let agora = &state.config.agora;
    let ttl = agora.token_ttl_seconds;
    let user_uuid = session.user_id.to_string();

    let token = match request.kind {
        EducationTokenKind::RoomUser => {
            let (Some(room_uuid), Some(role)) = (request.room_uuid.as_deref(), request.role) else {
                return Err(ApiError::BadRequest(
                    "room_user tokens require room_uuid and role".to_string(),
                ));
            };
            EducationTokenBuilder::build_room_user_token(
                &agora.app_id,
                &agora.app_certificate,
                room_uuid,
                &user_uuid,
                role,
                ttl,
            )?
        }
        EducationTokenKind::User => {
            EducationTokenBuilder::build_user_token(&agora.app_id, &agora.app_certificate, &user_uuid, ttl)?
        }
        EducationTokenKind::App => {
            session.require(Capability::IssueAppToken)?;
            EducationTokenBuilder::build_app_token(&agora.app_id, &agora.app_certificate, ttl)?
        }
    };

    tracing::info!(
        user_id = %session.user_id,
        kind = ?request.kind,
        room_uuid = ?request.room_uuid,
        "Issued classroom token"
    );

    Ok(token_response(&state, token))
}
