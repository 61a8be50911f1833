//! Token builders for lesson media, messaging and chat
//!
//! Each builder assembles the service grants for one use case and returns
//! the encoded AccessToken2 string.

use serde::{Deserialize, Serialize};

use super::access_token::{AccessToken, TokenError};
use super::service::{
    ChatPrivilege, ChatService, FpaPrivilege, FpaService, RtcPrivilege, RtcService, RtmPrivilege,
    RtmService,
};

/// Participant role in an RTC channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RtcRole {
    /// May join and publish audio, video and data streams
    Publisher,

    /// May join only
    Subscriber,
}

/// Per-privilege lifetimes for fine-grained RTC tokens (seconds)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RtcPrivilegeExpiry {
    pub join_channel: u32,
    pub publish_audio: u32,
    pub publish_video: u32,
    pub publish_data: u32,
}

/// Builder for RTC (lesson video room) tokens
pub struct RtcTokenBuilder;

impl RtcTokenBuilder {
    /// Builds a token for a numeric uid; uid 0 lets any user join
    pub fn build_token_with_uid(
        app_id: &str,
        app_certificate: &str,
        channel_name: &str,
        uid: u32,
        role: RtcRole,
        token_expire: u32,
        privilege_expire: u32,
    ) -> Result<String, TokenError> {
        let rtc = RtcService::with_uid(channel_name, uid);
        Self::build_with_role(app_id, app_certificate, rtc, role, token_expire, privilege_expire)
    }

    /// Builds a token for a string user account
    pub fn build_token_with_user_account(
        app_id: &str,
        app_certificate: &str,
        channel_name: &str,
        account: &str,
        role: RtcRole,
        token_expire: u32,
        privilege_expire: u32,
    ) -> Result<String, TokenError> {
        let rtc = RtcService::new(channel_name, account);
        Self::build_with_role(app_id, app_certificate, rtc, role, token_expire, privilege_expire)
    }

    /// Builds a token with an individual lifetime for each privilege
    pub fn build_token_with_uid_and_privilege(
        app_id: &str,
        app_certificate: &str,
        channel_name: &str,
        uid: u32,
        token_expire: u32,
        expiry: RtcPrivilegeExpiry,
    ) -> Result<String, TokenError> {
        let rtc = RtcService::with_uid(channel_name, uid);
        Self::build_with_expiry(app_id, app_certificate, rtc, token_expire, expiry)
    }

    pub fn build_token_with_user_account_and_privilege(
        app_id: &str,
        app_certificate: &str,
        channel_name: &str,
        account: &str,
        token_expire: u32,
        expiry: RtcPrivilegeExpiry,
    ) -> Result<String, TokenError> {
        let rtc = RtcService::new(channel_name, account);
        Self::build_with_expiry(app_id, app_certificate, rtc, token_expire, expiry)
    }

    /// Builds a combined RTC + RTM token so one credential covers the lesson
    /// room and its messaging channel
    pub fn build_token_with_rtm(
        app_id: &str,
        app_certificate: &str,
        channel_name: &str,
        account: &str,
        role: RtcRole,
        token_expire: u32,
        privilege_expire: u32,
    ) -> Result<String, TokenError> {
        let mut token = AccessToken::new(app_id, app_certificate, token_expire);
        token.add_service(rtc_with_role(RtcService::new(channel_name, account), role, privilege_expire));

        let mut rtm = RtmService::new(account);
        rtm.add_privilege(RtmPrivilege::Login, token_expire);
        token.add_service(rtm);

        token.build()
    }

    fn build_with_role(
        app_id: &str,
        app_certificate: &str,
        rtc: RtcService,
        role: RtcRole,
        token_expire: u32,
        privilege_expire: u32,
    ) -> Result<String, TokenError> {
        let mut token = AccessToken::new(app_id, app_certificate, token_expire);
        token.add_service(rtc_with_role(rtc, role, privilege_expire));
        token.build()
    }

    fn build_with_expiry(
        app_id: &str,
        app_certificate: &str,
        mut rtc: RtcService,
        token_expire: u32,
        expiry: RtcPrivilegeExpiry,
    ) -> Result<String, TokenError> {
        rtc.add_privilege(RtcPrivilege::JoinChannel, expiry.join_channel);
        rtc.add_privilege(RtcPrivilege::PublishAudioStream, expiry.publish_audio);
        rtc.add_privilege(RtcPrivilege::PublishVideoStream, expiry.publish_video);
        rtc.add_privilege(RtcPrivilege::PublishDataStream, expiry.publish_data);

        let mut token = AccessToken::new(app_id, app_certificate, token_expire);
        token.add_service(rtc);
        token.build()
    }
}

fn rtc_with_role(mut rtc: RtcService, role: RtcRole, privilege_expire: u32) -> RtcService {
    rtc.add_privilege(RtcPrivilege::JoinChannel, privilege_expire);
    if role == RtcRole::Publisher {
        rtc.add_privilege(RtcPrivilege::PublishAudioStream, privilege_expire);
        rtc.add_privilege(RtcPrivilege::PublishVideoStream, privilege_expire);
        rtc.add_privilege(RtcPrivilege::PublishDataStream, privilege_expire);
    }
    rtc
}

/// Builder for RTM (lesson messaging) tokens
pub struct RtmTokenBuilder;

impl RtmTokenBuilder {
    pub fn build_token(
        app_id: &str,
        app_certificate: &str,
        user_id: &str,
        expire: u32,
    ) -> Result<String, TokenError> {
        let mut rtm = RtmService::new(user_id);
        rtm.add_privilege(RtmPrivilege::Login, expire);

        let mut token = AccessToken::new(app_id, app_certificate, expire);
        token.add_service(rtm);
        token.build()
    }
}

/// Builder for chat tokens
pub struct ChatTokenBuilder;

impl ChatTokenBuilder {
    /// Token for a single chat user
    pub fn build_user_token(
        app_id: &str,
        app_certificate: &str,
        user_id: &str,
        expire: u32,
    ) -> Result<String, TokenError> {
        let mut chat = ChatService::new(user_id);
        chat.add_privilege(ChatPrivilege::User, expire);

        let mut token = AccessToken::new(app_id, app_certificate, expire);
        token.add_service(chat);
        token.build()
    }

    /// Token for server-side chat administration
    pub fn build_app_token(app_id: &str, app_certificate: &str, expire: u32) -> Result<String, TokenError> {
        let mut chat = ChatService::new("");
        chat.add_privilege(ChatPrivilege::App, expire);

        let mut token = AccessToken::new(app_id, app_certificate, expire);
        token.add_service(chat);
        token.build()
    }
}

/// Builder for FPA tokens; lifetime is fixed at 24 hours
pub struct FpaTokenBuilder;

impl FpaTokenBuilder {
    pub const TOKEN_EXPIRE: u32 = 24 * 3600;

    pub fn build_token(app_id: &str, app_certificate: &str) -> Result<String, TokenError> {
        let mut fpa = FpaService::new();
        fpa.add_privilege(FpaPrivilege::Login, 0);

        let mut token = AccessToken::new(app_id, app_certificate, Self::TOKEN_EXPIRE);
        token.add_service(fpa);
        token.build()
    }
}
