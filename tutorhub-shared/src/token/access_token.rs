//! AccessToken2 encoder and parser
//!
//! A token is built in four independent stages:
//!
//! 1. **Serialize**: header `{app_id}{issue_ts}{expire}{salt}{service_count}`
//!    followed by every service in ascending type order (`signing_info`)
//! 2. **Sign**: `signing = HMAC(uint32(issue_ts), certificate)`, then
//!    `signing = HMAC(uint32(salt), signing)` and finally
//!    `signature = HMAC(signing, signing_info)`, all HMAC-SHA256 keyed by the
//!    first argument
//! 3. **Compress**: zlib-deflate `string(signature) ++ signing_info`
//! 4. **Encode**: standard base64, prefixed with the version `"007"`
//!
//! # Example
//!
//! ```
//! use tutorhub_shared::token::access_token::{parse, AccessToken};
//! use tutorhub_shared::token::service::{RtmPrivilege, RtmService};
//!
//! let app_id = "970CA35de60c44645bbae8a215061b33";
//! let certificate = "5CFd2fd1755d40ecb72977518be15d3b";
//!
//! let mut rtm = RtmService::new("tutor-7");
//! rtm.add_privilege(RtmPrivilege::Login, 3600);
//!
//! let mut token = AccessToken::new(app_id, certificate, 3600);
//! token.add_service(rtm);
//!
//! let encoded = token.build().unwrap();
//! assert!(encoded.starts_with("007"));
//!
//! let parsed = parse(&encoded).unwrap();
//! assert!(parsed.verify(certificate));
//! ```

use std::collections::BTreeMap;
use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;

use super::packer::{ByteReader, ByteWriter, PackError};
use super::service::{Service, ServiceError};

/// Token format version prefix
pub const VERSION: &str = "007";

/// Length of app ids and app certificates (hex characters)
pub const APP_KEY_LENGTH: usize = 32;

const SALT_RANGE: std::ops::RangeInclusive<u32> = 1..=99_999_999;

/// Upper bound on inflated token content
pub const MAX_CONTENT_LENGTH: u64 = 64 * 1024;

type HmacSha256 = Hmac<Sha256>;

/// Error type for building and parsing tokens
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// App id is not a 32-character hex string
    #[error("Invalid app id: expected 32 hex characters")]
    InvalidAppId,

    /// App certificate is not a 32-character hex string
    #[error("Invalid app certificate: expected 32 hex characters")]
    InvalidAppCertificate,

    /// Token has no services
    #[error("Token has no services")]
    NoServices,

    /// Token does not start with the supported version
    #[error("Unsupported token version: {0:?}")]
    UnsupportedVersion(String),

    /// Token body is not valid base64
    #[error("Invalid base64 in token body: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    /// Compression or decompression failed
    #[error("Compression error: {0}")]
    Compression(#[from] std::io::Error),

    /// Inflated content exceeds [`MAX_CONTENT_LENGTH`]
    #[error("Token content exceeds 64 KiB")]
    ContentTooLarge,

    /// Packed content is malformed
    #[error("Malformed token content: {0}")]
    Pack(#[from] PackError),

    /// A service could not be decoded
    #[error("Malformed service: {0}")]
    Service(#[from] ServiceError),

    /// Bytes left over after the last service
    #[error("Unexpected trailing data: {0} bytes")]
    TrailingData(usize),
}

/// Checks the fixed-length hex shape required of app ids and certificates
pub fn is_app_key(value: &str) -> bool {
    value.len() == APP_KEY_LENGTH && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Builder for a signed access token
#[derive(Debug, Clone)]
pub struct AccessToken {
    app_id: String,
    app_certificate: String,
    issue_ts: u32,
    expire: u32,
    salt: u32,
    services: BTreeMap<u16, Service>,
}

impl AccessToken {
    /// Creates a token issued now with a random salt
    ///
    /// # Arguments
    ///
    /// * `app_id` - Agora app id (32 hex characters)
    /// * `app_certificate` - Agora app certificate (32 hex characters)
    /// * `expire` - Token lifetime in seconds from issue time
    pub fn new(app_id: impl Into<String>, app_certificate: impl Into<String>, expire: u32) -> Self {
        let issue_ts = u32::try_from(chrono::Utc::now().timestamp()).unwrap_or(u32::MAX);
        let salt = rand::thread_rng().gen_range(SALT_RANGE);
        Self::with_issue_ts_and_salt(app_id, app_certificate, expire, issue_ts, salt)
    }

    /// Creates a token with an explicit issue time and salt
    pub fn with_issue_ts_and_salt(
        app_id: impl Into<String>,
        app_certificate: impl Into<String>,
        expire: u32,
        issue_ts: u32,
        salt: u32,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            app_certificate: app_certificate.into(),
            issue_ts,
            expire,
            salt,
            services: BTreeMap::new(),
        }
    }

    /// Adds a service grant, replacing any grant of the same type
    pub fn add_service(&mut self, service: impl Into<Service>) -> &mut Self {
        let service = service.into();
        self.services.insert(service.service_type(), service);
        self
    }

    pub fn services(&self) -> impl Iterator<Item = &Service> {
        self.services.values()
    }

    pub fn issue_ts(&self) -> u32 {
        self.issue_ts
    }

    pub fn expire(&self) -> u32 {
        self.expire
    }

    pub fn salt(&self) -> u32 {
        self.salt
    }

    fn check(&self) -> Result<(), TokenError> {
        if !is_app_key(&self.app_id) {
            return Err(TokenError::InvalidAppId);
        }
        if !is_app_key(&self.app_certificate) {
            return Err(TokenError::InvalidAppCertificate);
        }
        if self.services.is_empty() {
            return Err(TokenError::NoServices);
        }
        Ok(())
    }

    /// Builds the encoded token
    ///
    /// # Errors
    ///
    /// - `InvalidAppId` / `InvalidAppCertificate` when either key is not 32 hex characters
    /// - `NoServices` when no service was added
    pub fn build(&self) -> Result<String, TokenError> {
        self.check()?;

        let info = signing_info(&self.app_id, self.issue_ts, self.expire, self.salt, self.services.values())?;
        let key = signing_key(&self.app_certificate, self.issue_ts, self.salt);
        let signature = sign(&key, &info);
        let content = assemble(&signature, &info)?;
        let compressed = compress(&content)?;

        Ok(encode(&compressed))
    }

    /// Builds the token, returning an empty string on any failure
    ///
    /// Matches the Agora SDK token builders, which signal
    /// invalid input with `""`.
    pub fn build_or_empty(&self) -> String {
        match self.build() {
            Ok(token) => token,
            Err(e) => {
                tracing::debug!(error = %e, "Access token build rejected");
                String::new()
            }
        }
    }
}

/// Serializes the header and services into the signed byte string
pub fn signing_info<'a>(
    app_id: &str,
    issue_ts: u32,
    expire: u32,
    salt: u32,
    services: impl ExactSizeIterator<Item = &'a Service>,
) -> Result<Vec<u8>, TokenError> {
    let count = u16::try_from(services.len()).map_err(|_| PackError::TooLong(services.len()))?;

    let mut writer = ByteWriter::new();
    writer.put_string(app_id)?;
    writer.put_u32(issue_ts).put_u32(expire).put_u32(salt).put_u16(count);

    for service in services {
        writer.put_raw(&service.pack()?);
    }

    Ok(writer.into_bytes())
}

fn hmac_sha256(key: &[u8], message: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(message);
    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// Derives the per-token signing key from the certificate, issue time and salt
pub fn signing_key(app_certificate: &str, issue_ts: u32, salt: u32) -> [u8; 32] {
    let signing = hmac_sha256(&issue_ts.to_le_bytes(), app_certificate.as_bytes());
    hmac_sha256(&salt.to_le_bytes(), &signing)
}

/// Signs the serialized token content
pub fn sign(key: &[u8; 32], signing_info: &[u8]) -> [u8; 32] {
    hmac_sha256(key, signing_info)
}

/// Prepends the length-prefixed signature to the signing info
pub fn assemble(signature: &[u8], signing_info: &[u8]) -> Result<Vec<u8>, TokenError> {
    let mut writer = ByteWriter::new();
    writer.put_bytes(signature)?;
    writer.put_raw(signing_info);
    Ok(writer.into_bytes())
}

/// zlib-deflates token content
pub fn compress(content: &[u8]) -> Result<Vec<u8>, TokenError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content)?;
    Ok(encoder.finish()?)
}

/// Inflates zlib-deflated token content, up to [`MAX_CONTENT_LENGTH`] bytes
pub fn decompress(compressed: &[u8]) -> Result<Vec<u8>, TokenError> {
    let mut decoder = ZlibDecoder::new(compressed).take(MAX_CONTENT_LENGTH + 1);
    let mut content = Vec::new();
    decoder.read_to_end(&mut content)?;
    if content.len() as u64 > MAX_CONTENT_LENGTH {
        return Err(TokenError::ContentTooLarge);
    }
    Ok(content)
}

/// Base64-encodes compressed content behind the version prefix
pub fn encode(compressed: &[u8]) -> String {
    let mut token = String::from(VERSION);
    token.push_str(&BASE64.encode(compressed));
    token
}

/// A decoded access token
#[derive(Debug, Clone)]
pub struct ParsedToken {
    pub signature: Vec<u8>,
    pub app_id: String,
    pub issue_ts: u32,
    pub expire: u32,
    pub salt: u32,
    pub services: Vec<Service>,
    signing_info: Vec<u8>,
}

impl ParsedToken {
    /// Recomputes the signature with `app_certificate` and compares it in
    /// constant time
    pub fn verify(&self, app_certificate: &str) -> bool {
        let key = signing_key(app_certificate, self.issue_ts, self.salt);
        let mut mac = HmacSha256::new_from_slice(&key).expect("HMAC can take key of any size");
        mac.update(&self.signing_info);
        mac.verify_slice(&self.signature).is_ok()
    }

    /// Whether the token lifetime has elapsed at `now` (Unix seconds)
    pub fn is_expired(&self, now: u32) -> bool {
        u64::from(self.issue_ts) + u64::from(self.expire) < u64::from(now)
    }

    pub fn service(&self, service_type: u16) -> Option<&Service> {
        self.services.iter().find(|s| s.service_type() == service_type)
    }
}

/// Decodes a token produced by [`AccessToken::build`]
///
/// # Errors
///
/// Returns an error when the version prefix, base64 body, zlib stream or
/// packed content is invalid.
pub fn parse(token: &str) -> Result<ParsedToken, TokenError> {
    let version = token.get(..VERSION.len()).unwrap_or(token);
    if version != VERSION {
        return Err(TokenError::UnsupportedVersion(version.to_string()));
    }

    let compressed = BASE64.decode(&token[VERSION.len()..])?;
    let content = decompress(&compressed)?;

    let mut reader = ByteReader::new(&content);
    let signature = reader.get_bytes()?.to_vec();
    let signing_info = reader.remaining().to_vec();

    let app_id = reader.get_string()?;
    let issue_ts = reader.get_u32()?;
    let expire = reader.get_u32()?;
    let salt = reader.get_u32()?;
    let count = reader.get_u16()?;

    let mut services = Vec::with_capacity(count as usize);
    for _ in 0..count {
        services.push(Service::unpack(&mut reader)?);
    }

    if !reader.is_exhausted() {
        return Err(TokenError::TrailingData(reader.remaining().len()));
    }

    Ok(ParsedToken {
        signature,
        app_id,
        issue_ts,
        expire,
        salt,
        services,
        signing_info,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::service::{
        ChatPrivilege, ChatService, RtcPrivilege, RtcService, RtmPrivilege, RtmService,
        SERVICE_TYPE_RTC, SERVICE_TYPE_RTM,
    };

    const APP_ID: &str = "970CA35de60c44645bbae8a215061b33";
    const CERT: &str = "5CFd2fd1755d40ecb72977518be15d3b";

    fn rtm() -> RtmService {
        let mut rtm = RtmService::new("student-1");
        rtm.add_privilege(RtmPrivilege::Login, 600);
        rtm
    }

    #[test]
    fn test_is_app_key() {
        assert!(is_app_key(APP_ID));
        assert!(!is_app_key("970CA35de60c44645bbae8a215061b3"));
        assert!(!is_app_key("970CA35de60c44645bbae8a215061b3z"));
        assert!(!is_app_key(""));
    }

    #[test]
    fn test_build_rejects_invalid_app_id() {
        let mut token = AccessToken::new("short", CERT, 600);
        token.add_service(rtm());
        assert!(matches!(token.build(), Err(TokenError::InvalidAppId)));
        assert_eq!(token.build_or_empty(), "");
    }

    #[test]
    fn test_build_rejects_invalid_certificate() {
        let mut token = AccessToken::new(APP_ID, "not-a-certificate", 600);
        token.add_service(rtm());
        assert!(matches!(token.build(), Err(TokenError::InvalidAppCertificate)));
    }

    #[test]
    fn test_build_rejects_empty_services() {
        let token = AccessToken::new(APP_ID, CERT, 600);
        assert!(matches!(token.build(), Err(TokenError::NoServices)));
        assert_eq!(token.build_or_empty(), "");
    }

    #[test]
    fn test_same_type_replaces_service() {
        let mut token = AccessToken::new(APP_ID, CERT, 600);
        token.add_service(RtmService::new("a"));
        token.add_service(RtmService::new("b"));
        let services: Vec<_> = token.services().collect();
        assert_eq!(services.len(), 1);
        assert!(matches!(services[0], Service::Rtm(s) if s.user_id == "b"));
    }

    #[test]
    fn test_deterministic_with_fixed_salt() {
        let build = || {
            let mut token = AccessToken::with_issue_ts_and_salt(APP_ID, CERT, 600, 1_700_000_000, 42);
            token.add_service(rtm());
            token.build().unwrap()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn test_services_serialized_in_type_order() {
        let mut token = AccessToken::with_issue_ts_and_salt(APP_ID, CERT, 600, 1_700_000_000, 7);
        let mut chat = ChatService::new("u");
        chat.add_privilege(ChatPrivilege::User, 600);
        token.add_service(chat);
        let mut rtc = RtcService::with_uid("room", 9);
        rtc.add_privilege(RtcPrivilege::JoinChannel, 600);
        token.add_service(rtc);
        token.add_service(rtm());

        let parsed = parse(&token.build().unwrap()).unwrap();
        let types: Vec<u16> = parsed.services.iter().map(Service::service_type).collect();
        assert_eq!(types, vec![SERVICE_TYPE_RTC, SERVICE_TYPE_RTM, 5]);
    }

    #[test]
    fn test_parse_round_trip_and_verify() {
        let mut token = AccessToken::with_issue_ts_and_salt(APP_ID, CERT, 900, 1_700_000_000, 12345);
        token.add_service(rtm());
        let encoded = token.build().unwrap();

        let parsed = parse(&encoded).unwrap();
        assert_eq!(parsed.app_id, APP_ID);
        assert_eq!(parsed.issue_ts, 1_700_000_000);
        assert_eq!(parsed.expire, 900);
        assert_eq!(parsed.salt, 12345);
        assert_eq!(parsed.signature.len(), 32);
        assert!(parsed.service(SERVICE_TYPE_RTM).is_some());
        assert!(parsed.verify(CERT));
        assert!(!parsed.verify("00000000000000000000000000000000"));
    }

    #[test]
    fn test_signature_matches_stages() {
        let mut token = AccessToken::with_issue_ts_and_salt(APP_ID, CERT, 900, 1_700_000_000, 1);
        token.add_service(rtm());
        let parsed = parse(&token.build().unwrap()).unwrap();

        let info = signing_info(APP_ID, 1_700_000_000, 900, 1, token.services().collect::<Vec<_>>().into_iter()).unwrap();
        let expected = sign(&signing_key(CERT, 1_700_000_000, 1), &info);
        assert_eq!(parsed.signature, expected.to_vec());
    }

    #[test]
    fn test_compress_round_trip() {
        let content = b"signing info bytes".repeat(10);
        let compressed = compress(&content).unwrap();
        assert_eq!(decompress(&compressed).unwrap(), content);
    }

    #[test]
    fn test_decompress_caps_inflated_size() {
        let at_limit = vec![0u8; MAX_CONTENT_LENGTH as usize];
        assert_eq!(decompress(&compress(&at_limit).unwrap()).unwrap().len(), at_limit.len());

        let oversized = compress(&vec![0u8; MAX_CONTENT_LENGTH as usize + 1]).unwrap();
        assert!(oversized.len() < 1024);
        assert!(matches!(decompress(&oversized), Err(TokenError::ContentTooLarge)));
        assert!(matches!(parse(&encode(&oversized)), Err(TokenError::ContentTooLarge)));
    }

    #[test]
    fn test_parse_rejects_wrong_version() {
        assert!(matches!(parse("006abc"), Err(TokenError::UnsupportedVersion(v)) if v == "006"));
        assert!(matches!(parse("00"), Err(TokenError::UnsupportedVersion(_))));
    }

    #[test]
    fn test_parse_rejects_bad_base64() {
        assert!(matches!(parse("007!!!"), Err(TokenError::InvalidBase64(_))));
    }

    #[test]
    fn test_parse_rejects_bad_zlib() {
        let token = encode(b"definitely not zlib");
        assert!(matches!(parse(&token), Err(TokenError::Compression(_))));
    }

    #[test]
    fn test_parse_rejects_truncated_content() {
        let token = encode(&compress(&[32, 0, 1, 2]).unwrap());
        assert!(matches!(parse(&token), Err(TokenError::Pack(_))));
    }

    #[test]
    fn test_is_expired() {
        let mut token = AccessToken::with_issue_ts_and_salt(APP_ID, CERT, 100, 1_000, 1);
        token.add_service(rtm());
        let parsed = parse(&token.build().unwrap()).unwrap();
        assert!(!parsed.is_expired(1_100));
        assert!(parsed.is_expired(1_101));
    }
}
