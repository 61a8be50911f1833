//! # TutorHub Shared Library
//!
//! Types, encoders and business logic shared by the TutorHub API server and
//! the assessment worker.
//!
//! ## Module Organization
//!
//! - `token`: Agora AccessToken2 encoder, parser and token builders
//! - `auth`: JWT session context and the role permission predicate
//! - `realtime`: realtime voice-session protocol driver
//! - `earnings`: tutor payroll aggregation over lesson records
//! - `providers`: OpenAI and Resend HTTP clients
//! - `db`: connection pool
//! - `models`: database row types

pub mod auth;
pub mod db;
pub mod earnings;
pub mod models;
pub mod providers;
pub mod realtime;
pub mod token;

/// Current version of the TutorHub shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
