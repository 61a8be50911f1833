//! Service grants carried inside an access token
//!
//! Every service packs as `{u16 type}{privilege map}{service fields}`. The
//! privilege map associates a privilege id with its lifetime in seconds,
//! counted from the token's issue time.
//!
//! | Service   | Type | Fields                                   |
//! |-----------|------|------------------------------------------|
//! | RTC       | 1    | channel name, uid string                 |
//! | RTM       | 2    | user id                                  |
//! | FPA       | 4    | none                                     |
//! | Chat      | 5    | user id                                  |
//! | Education | 7    | room uuid, user uuid, role (`i16`)        |

use std::collections::BTreeMap;

use serde::Serialize;

use super::packer::{ByteReader, ByteWriter, PackError};

pub const SERVICE_TYPE_RTC: u16 = 1;
pub const SERVICE_TYPE_RTM: u16 = 2;
pub const SERVICE_TYPE_FPA: u16 = 4;
pub const SERVICE_TYPE_CHAT: u16 = 5;
pub const SERVICE_TYPE_EDUCATION: u16 = 7;

/// RTC privileges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum RtcPrivilege {
    JoinChannel = 1,
    PublishAudioStream = 2,
    PublishVideoStream = 3,
    PublishDataStream = 4,
}

/// RTM privileges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum RtmPrivilege {
    Login = 1,
}

/// FPA privileges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum FpaPrivilege {
    Login = 1,
}

/// Chat privileges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ChatPrivilege {
    User = 1,
    App = 2,
}

/// Education (classroom) privileges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum EducationPrivilege {
    RoomUser = 1,
    User = 2,
    App = 3,
}

/// Real-time audio/video channel grant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RtcService {
    pub privileges: BTreeMap<u16, u32>,
    pub channel_name: String,
    /// Numeric uid rendered as a string; uid 0 is the empty string
    pub uid: String,
}

impl RtcService {
    pub fn new(channel_name: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            privileges: BTreeMap::new(),
            channel_name: channel_name.into(),
            uid: uid.into(),
        }
    }

    /// Creates an RTC grant for a numeric uid
    pub fn with_uid(channel_name: impl Into<String>, uid: u32) -> Self {
        let uid = if uid == 0 { String::new() } else { uid.to_string() };
        Self::new(channel_name, uid)
    }

    pub fn add_privilege(&mut self, privilege: RtcPrivilege, expire: u32) {
        self.privileges.insert(privilege as u16, expire);
    }
}

/// Real-time messaging grant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RtmService {
    pub privileges: BTreeMap<u16, u32>,
    pub user_id: String,
}

impl RtmService {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            privileges: BTreeMap::new(),
            user_id: user_id.into(),
        }
    }

    pub fn add_privilege(&mut self, privilege: RtmPrivilege, expire: u32) {
        self.privileges.insert(privilege as u16, expire);
    }
}

/// Flexible packet acceleration grant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FpaService {
    pub privileges: BTreeMap<u16, u32>,
}

impl FpaService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_privilege(&mut self, privilege: FpaPrivilege, expire: u32) {
        self.privileges.insert(privilege as u16, expire);
    }
}

/// Chat grant; an empty user id means an app-level grant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChatService {
    pub privileges: BTreeMap<u16, u32>,
    pub user_id: String,
}

impl ChatService {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            privileges: BTreeMap::new(),
            user_id: user_id.into(),
        }
    }

    pub fn add_privilege(&mut self, privilege: ChatPrivilege, expire: u32) {
        self.privileges.insert(privilege as u16, expire);
    }
}

/// Classroom grant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EducationService {
    pub privileges: BTreeMap<u16, u32>,
    pub room_uuid: String,
    pub user_uuid: String,
    pub role: i16,
}

impl EducationService {
    pub fn new(room_uuid: impl Into<String>, user_uuid: impl Into<String>, role: i16) -> Self {
        Self {
            privileges: BTreeMap::new(),
            room_uuid: room_uuid.into(),
            user_uuid: user_uuid.into(),
            role,
        }
    }

    pub fn add_privilege(&mut self, privilege: EducationPrivilege, expire: u32) {
        self.privileges.insert(privilege as u16, expire);
    }
}

/// A typed grant record bundled into an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "service", rename_all = "snake_case")]
pub enum Service {
    Rtc(RtcService),
    Rtm(RtmService),
    Fpa(FpaService),
    Chat(ChatService),
    Education(EducationService),
}

/// Error type for decoding services
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("Unknown service type: {0}")]
    UnknownType(u16),

    #[error(transparent)]
    Pack(#[from] PackError),
}

impl Service {
    /// Wire type id of this service
    pub fn service_type(&self) -> u16 {
        match self {
            Service::Rtc(_) => SERVICE_TYPE_RTC,
            Service::Rtm(_) => SERVICE_TYPE_RTM,
            Service::Fpa(_) => SERVICE_TYPE_FPA,
            Service::Chat(_) => SERVICE_TYPE_CHAT,
            Service::Education(_) => SERVICE_TYPE_EDUCATION,
        }
    }

    pub fn privileges(&self) -> &BTreeMap<u16, u32> {
        match self {
            Service::Rtc(s) => &s.privileges,
            Service::Rtm(s) => &s.privileges,
            Service::Fpa(s) => &s.privileges,
            Service::Chat(s) => &s.privileges,
            Service::Education(s) => &s.privileges,
        }
    }

    /// Packs the service including its leading type id
    pub fn pack(&self) -> Result<Vec<u8>, PackError> {
        let mut writer = ByteWriter::new();
        writer.put_u16(self.service_type());
        writer.put_privileges(self.privileges())?;

        match self {
            Service::Rtc(s) => {
                writer.put_string(&s.channel_name)?;
                writer.put_string(&s.uid)?;
            }
            Service::Rtm(s) => {
                writer.put_string(&s.user_id)?;
            }
            Service::Fpa(_) => {}
            Service::Chat(s) => {
                writer.put_string(&s.user_id)?;
            }
            Service::Education(s) => {
                writer.put_string(&s.room_uuid)?;
                writer.put_string(&s.user_uuid)?;
                writer.put_i16(s.role);
            }
        }

        Ok(writer.into_bytes())
    }

    /// Reads one service, type id included, advancing `reader` past it
    pub fn unpack(reader: &mut ByteReader<'_>) -> Result<Self, ServiceError> {
        let service_type = reader.get_u16()?;
        Self::unpack_body(service_type, reader)
    }

    /// Reads the privilege map and fields of a service whose type id has
    /// already been consumed
    pub fn unpack_body(service_type: u16, reader: &mut ByteReader<'_>) -> Result<Self, ServiceError> {
        // Reject unknown types before touching the body.
        if !matches!(
            service_type,
            SERVICE_TYPE_RTC | SERVICE_TYPE_RTM | SERVICE_TYPE_FPA | SERVICE_TYPE_CHAT | SERVICE_TYPE_EDUCATION
        ) {
            return Err(ServiceError::UnknownType(service_type));
        }

        let privileges = reader.get_privileges()?;

        let service = match service_type {
            SERVICE_TYPE_RTC => Service::Rtc(RtcService {
                privileges,
                channel_name: reader.get_string()?,
                uid: reader.get_string()?,
            }),
            SERVICE_TYPE_RTM => Service::Rtm(RtmService {
                privileges,
                user_id: reader.get_string()?,
            }),
            SERVICE_TYPE_FPA => Service::Fpa(FpaService { privileges }),
            SERVICE_TYPE_CHAT => Service::Chat(ChatService {
                privileges,
                user_id: reader.get_string()?,
            }),
            _ => Service::Education(EducationService {
                privileges,
                room_uuid: reader.get_string()?,
                user_uuid: reader.get_string()?,
                role: reader.get_i16()?,
            }),
        };

        Ok(service)
    }
}

impl From<RtcService> for Service {
    fn from(s: RtcService) -> Self {
        Service::Rtc(s)
    }
}

impl From<RtmService> for Service {
    fn from(s: RtmService) -> Self {
        Service::Rtm(s)
    }
}

impl From<FpaService> for Service {
    fn from(s: FpaService) -> Self {
        Service::Fpa(s)
    }
}

impl From<ChatService> for Service {
    fn from(s: ChatService) -> Self {
        Service::Chat(s)
    }
}

impl From<EducationService> for Service {
    fn from(s: EducationService) -> Self {
        Service::Education(s)
    }
}
