//! # TutorHub API Server Library
//!
//! HTTP edge functions of the tutoring platform: Agora access tokens,
//! voice tutor credentials, assessment jobs, earnings and email.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Security headers and rate limiting
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
