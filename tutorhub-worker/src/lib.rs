//! # TutorHub Worker Library
//!
//! Background runner for assessment generation jobs.
//!
//! ## Modules
//!
//! - `config`: Worker configuration
//! - `generator`: Chunked question generation over a job
//! - `source`: OpenAI-backed question source
//! - `store`: PostgreSQL progress store
//! - `queue`: Job queue reader
//! - `runner`: Polling loop and concurrency control

pub mod config;
pub mod generator;
pub mod queue;
pub mod runner;
pub mod source;
pub mod store;
