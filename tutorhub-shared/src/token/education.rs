//! Classroom token builder
//!
//! A classroom participant needs three grants in one token: the education
//! room grant, RTM login for signalling and a chat user. The chat user id is
//! the lowercase hex MD5 of the user uuid, because chat ids are restricted to
//! a shorter alphabet than classroom uuids.

use md5::{Digest, Md5};

use super::access_token::{AccessToken, TokenError};
use super::service::{
    ChatPrivilege, ChatService, EducationPrivilege, EducationService, RtmPrivilege, RtmService,
};

/// Chat user id derived from a classroom user uuid
pub fn chat_user_id(user_uuid: &str) -> String {
    hex::encode(Md5::digest(user_uuid.as_bytes()))
}

/// Builder for classroom tokens
pub struct EducationTokenBuilder;

impl EducationTokenBuilder {
    /// Token for a user inside a specific room
    ///
    /// # Arguments
    ///
    /// * `room_uuid` - Classroom id
    /// * `user_uuid` - Participant id
    /// * `role` - Classroom role code (teacher, student, assistant, ...)
    /// * `expire` - Lifetime in seconds
    pub fn build_room_user_token(
        app_id: &str,
        app_certificate: &str,
        room_uuid: &str,
        user_uuid: &str,
        role: i16,
        expire: u32,
    ) -> Result<String, TokenError> {
        let mut token = AccessToken::new(app_id, app_certificate, expire);

        let mut education = EducationService::new(room_uuid, user_uuid, role);
        education.add_privilege(EducationPrivilege::RoomUser, expire);
        token.add_service(education);

        let mut rtm = RtmService::new(user_uuid);
        rtm.add_privilege(RtmPrivilege::Login, expire);
        token.add_service(rtm);

        let mut chat = ChatService::new(chat_user_id(user_uuid));
        chat.add_privilege(ChatPrivilege::User, expire);
        token.add_service(chat);

        token.build()
    }

    /// Token for a user outside any room
    pub fn build_user_token(
        app_id: &str,
        app_certificate: &str,
        user_uuid: &str,
        expire: u32,
    ) -> Result<String, TokenError> {
        let mut education = EducationService::new("", user_uuid, -1);
        education.add_privilege(EducationPrivilege::User, expire);

        let mut token = AccessToken::new(app_id, app_certificate, expire);
        token.add_service(education);
        token.build()
    }

    /// App-level token for server-side classroom management
    pub fn build_app_token(app_id: &str, app_certificate: &str, expire: u32) -> Result<String, TokenError> {
        let mut education = EducationService::new("", "", -1);
        education.add_privilege(EducationPrivilege::App, expire);

        let mut token = AccessToken::new(app_id, app_certificate, expire);
        token.add_service(education);
        token.build()
    }
}
