/// Middleware modules for the API server
///
/// - Security headers
/// - Per-user rate limiting of provider-backed routes
pub mod rate_limit;
pub mod security;
