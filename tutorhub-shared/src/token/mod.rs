//! Agora AccessToken2 support
//!
//! Lesson rooms, lesson chat and classrooms are authorized with Agora
//! "007" access tokens minted server side.
//!
//! # Modules
//!
//! - [`packer`]: little-endian byte packing
//! - [`service`]: typed service grants (RTC, RTM, FPA, chat, education)
//! - [`access_token`]: token build, parse and verify
//! - [`builders`]: RTC / RTM / chat / FPA token builders
//! - [`education`]: classroom token builder

pub mod access_token;
pub mod builders;
pub mod education;
pub mod packer;
pub mod service;

pub use access_token::{parse, AccessToken, ParsedToken, TokenError, VERSION};
pub use builders::{ChatTokenBuilder, FpaTokenBuilder, RtcPrivilegeExpiry, RtcRole, RtcTokenBuilder, RtmTokenBuilder};
pub use education::EducationTokenBuilder;
pub use service::Service;
