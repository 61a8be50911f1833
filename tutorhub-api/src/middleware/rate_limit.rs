/// Rate limiting middleware for provider-backed endpoints
///
/// Minting realtime sessions and generating assessments both spend OpenAI
/// credit, so those routes are limited per user with a Redis token bucket.
/// Limiting is disabled when no Redis URL is configured.
///
/// # Algorithm
///
/// - The bucket holds `requests_per_minute` tokens and refills continuously
/// - Each request consumes 1 token
/// - A request arriving at an empty bucket gets 429 with `Retry-After`
///
/// # Storage
///
/// Keys: `ratelimit:org:{organization_id}:user:{user_id}`, expiring after
/// 2 minutes of inactivity. The refill and consume step runs as one Lua
/// script so concurrent API instances share the bucket safely.
///
/// # Headers
///
/// - `X-RateLimit-Limit`: requests allowed per minute
/// - `X-RateLimit-Remaining`: tokens left after this request
/// - `X-RateLimit-Reset`: Unix timestamp when the bucket is full again
/// - `Retry-After`: seconds to wait (429 responses only)
use crate::app::AppState;
use crate::error::ApiError;
use axum::{
    extract::{Extension, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use redis::aio::ConnectionManager;
use tutorhub_shared::auth::SessionContext;

const TOKEN_BUCKET_SCRIPT: &str = r#"
local key = KEYS[1]
local capacity = tonumber(ARGV[1])
local refill_rate = tonumber(ARGV[2])
local now = tonumber(ARGV[3])

local bucket = redis.call('HMGET', key, 'tokens', 'last_refill')
local tokens = tonumber(bucket[1])
local last_refill = tonumber(bucket[2])

if not tokens then
    tokens = capacity
    last_refill = now
end

local elapsed = math.max(0, now - last_refill)
tokens = math.min(capacity, tokens + (elapsed * refill_rate))

if tokens >= 1 then
    tokens = tokens - 1
    redis.call('HSET', key, 'tokens', tokens, 'last_refill', now)
    redis.call('EXPIRE', key, 120)
    return {1, math.floor(tokens), math.ceil((capacity - tokens) / refill_rate)}
else
    return {0, 0, math.ceil((1 - tokens) / refill_rate)}
end
"#;

/// Rate limit configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimit {
    /// Maximum requests per minute
    pub requests_per_minute: u32,

    /// Token refill rate (tokens per second)
    pub refill_rate: f64,

    /// Maximum tokens in bucket (burst capacity)
    pub bucket_capacity: u32,
}

impl RateLimit {
    pub fn per_minute(requests_per_minute: u32) -> Self {
        RateLimit {
            requests_per_minute,
            refill_rate: requests_per_minute as f64 / 60.0,
            bucket_capacity: requests_per_minute,
        }
    }
}

/// Result of rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResult {
    /// Whether request is allowed
    pub ok: bool,

    /// Tokens remaining
    pub remaining: u32,

    /// Allowed: seconds until the bucket is full. Denied: seconds until one
    /// token is available.
    pub reset_after: u64,
}

impl RateLimitResult {
    fn from_script(values: &[i64]) -> Option<Self> {
        match values {
            [ok, remaining, reset_after] => Some(RateLimitResult {
                ok: *ok == 1,
                remaining: (*remaining).max(0) as u32,
                reset_after: (*reset_after).max(0) as u64,
            }),
            _ => None,
        }
    }

    /// Error returned for a denied request
    pub fn into_error(self) -> ApiError {
        ApiError::RateLimitExceeded {
            retry_after: self.reset_after,
            message: format!("Rate limit exceeded. Try again in {} seconds", self.reset_after),
        }
    }
}

/// Redis key of a user's bucket
pub fn bucket_key(session: &SessionContext) -> String {
    format!(
        "ratelimit:org:{}:user:{}",
        session.organization_id, session.user_id
    )
}

/// Redis-backed limiter shared by all handlers
#[derive(Clone)]
pub struct RateLimiter {
    conn: ConnectionManager,
    limit: RateLimit,
}

impl RateLimiter {
    /// Connects to Redis
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or Redis is unreachable.
    pub async fn connect(redis_url: &str, requests_per_minute: u32) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            limit: RateLimit::per_minute(requests_per_minute),
        })
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    /// Consumes one token from the bucket at `key`
    pub async fn check(&self, key: &str) -> Result<RateLimitResult, redis::RedisError> {
        let mut conn = self.conn.clone();
        let now = chrono::Utc::now().timestamp();

        let script = redis::Script::new(TOKEN_BUCKET_SCRIPT);
        let values: Vec<i64> = script
            .key(key)
            .arg(self.limit.bucket_capacity)
            .arg(self.limit.refill_rate)
            .arg(now)
            .invoke_async(&mut conn)
            .await?;

        RateLimitResult::from_script(&values).ok_or_else(|| {
            redis::RedisError::from((
                redis::ErrorKind::TypeError,
                "unexpected token bucket script result",
            ))
        })
    }
}

/// Sets the `X-RateLimit-*` headers on a response
pub fn apply_headers(response: &mut Response, limit: RateLimit, result: RateLimitResult, now: i64) {
    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", HeaderValue::from(limit.requests_per_minute));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(result.remaining));
    headers.insert(
        "X-RateLimit-Reset",
        HeaderValue::from(now.max(0) as u64 + result.reset_after),
    );
}

/// Rate limiting middleware
///
/// Must run inside the JWT layer: it reads the [`SessionContext`] the JWT
/// layer inserts.
///
/// # Errors
///
/// - 429 Too Many Requests: Rate limit exceeded
/// - 503 Service Unavailable: Redis failure
pub async fn rate_limit_layer(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(limiter) = state.rate_limiter.as_ref() else {
        return Ok(next.run(request).await);
    };

    let result = limiter.check(&bucket_key(&session)).await.map_err(|e| {
        tracing::error!(error = %e, user_id = %session.user_id, "Rate limit check failed");
        ApiError::ServiceUnavailable("Rate limit service unavailable".to_string())
    })?;

    if !result.ok {
        tracing::warn!(
            user_id = %session.user_id,
            organization_id = %session.organization_id,
            retry_after = result.reset_after,
            "Rate limit exceeded"
        );
        return Err(result.into_error());
    }

    let mut response = next.run(request).await;
    apply_headers(&mut response, limiter.limit(), result, chrono::Utc::now().timestamp());
    Ok(response)
}
