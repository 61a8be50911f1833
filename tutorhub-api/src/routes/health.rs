/// Health check endpoint
///
/// ```text
/// GET /health
/// ```
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "database": "connected",
///   "rate_limiting": false,
///   "email": true
/// }
/// ```
///
/// Always 200; a lost database reports `"degraded"`.
use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tutorhub_shared::db::pool::health_check as database_health_check;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,

    /// Whether the Redis rate limiter is active
    pub rate_limiting: bool,

    /// Whether email sending is configured
    pub email: bool,
}

pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let connected = database_health_check(&state.db).await.is_ok();

    Ok(Json(HealthResponse {
        status: if connected { "healthy" } else { "degraded" }.to_string(),
        version: tutorhub_shared::VERSION.to_string(),
        database: if connected { "connected" } else { "disconnected" }.to_string(),
        rate_limiting: state.rate_limiter.is_some(),
        email: state.resend.is_some(),
    }))
}
