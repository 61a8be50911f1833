/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use tutorhub_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config)?;
/// let app = tutorhub_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```
use crate::{
    config::Config,
    error::ApiError,
    middleware::{
        rate_limit::{rate_limit_layer, RateLimiter},
        security::SecurityHeadersLayer,
    },
};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use tutorhub_shared::auth::validate_token;
use tutorhub_shared::providers::{OpenAiClient, ResendClient};

/// Timeout applied to every outgoing provider request
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    pub openai: OpenAiClient,

    /// `None` when email is not configured
    pub resend: Option<ResendClient>,

    /// `None` disables rate limiting
    pub rate_limiter: Option<RateLimiter>,
}

impl AppState {
    /// Creates new application state
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(db: PgPool, config: Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(PROVIDER_TIMEOUT)
            .user_agent(concat!("tutorhub-api/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let openai = OpenAiClient::new(http.clone(), config.openai.clone());
        let resend = config
            .email
            .as_ref()
            .map(|email| ResendClient::new(http.clone(), email.resend_api_key.clone(), email.from.clone()));

        Ok(Self {
            db,
            config: Arc::new(config),
            openai,
            resend,
            rate_limiter: None,
        })
    }

    /// Enables rate limiting
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET /health                          # Health check (public)
/// └── /v1/                                 # JWT required
///     ├── POST /tokens/rtc                 # Lesson room token
///     ├── POST /tokens/rtm                 # Lesson messaging token
///     ├── POST /tokens/chat                # Chat user / app token
///     ├── POST /tokens/education           # Classroom token
///     ├── POST /realtime/sessions          # Voice tutor credential (rate limited)
///     ├── POST /realtime/sessions/usage    # Voice tutor usage report
///     ├── POST /assessments/generate       # Queue a generation job (rate limited)
///     ├── GET  /assessments/jobs/:id       # Job progress and questions
///     ├── GET  /earnings                   # Payroll aggregation
///     └── POST /notifications/email        # Transactional email
/// ```
///
/// # Middleware Stack
///
/// Outermost first: security headers, CORS, tracing, JWT authentication
/// (`/v1` only), rate limiting (limited routes only).
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let limited_routes = Router::new()
        .route("/realtime/sessions", post(routes::realtime::create_session))
        .route("/assessments/generate", post(routes::assessments::generate))
        .route_layer(from_fn_with_state(state.clone(), rate_limit_layer));

    let v1_routes = Router::new()
        .route("/tokens/rtc", post(routes::tokens::rtc_token))
        .route("/tokens/rtm", post(routes::tokens::rtm_token))
        .route("/tokens/chat", post(routes::tokens::chat_token))
        .route("/tokens/education", post(routes::tokens::education_token))
        .route("/realtime/sessions/usage", post(routes::realtime::record_usage))
        .route("/assessments/jobs/:id", get(routes::assessments::get_job))
        .route("/earnings", get(routes::earnings::get_earnings))
        .route("/notifications/email", post(routes::notifications::send_email))
        .merge(limited_routes)
        .layer(from_fn_with_state(state.clone(), jwt_auth_layer));

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// Extracts the bearer token from the Authorization header
fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".to_string()))?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Expected Bearer token".to_string()))
}

/// JWT authentication middleware layer
///
/// Validates the session JWT and injects the caller's
/// [`SessionContext`](tutorhub_shared::auth::SessionContext) into request
/// extensions.
async fn jwt_auth_layer(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())?;
    let claims = validate_token(token, state.jwt_secret())?;

    req.extensions_mut().insert(claims.session());

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, value.parse().unwrap());
        headers
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_bearer_token_rejections() {
        assert!(matches!(bearer_token(&HeaderMap::new()), Err(ApiError::Unauthorized(_))));
        assert!(matches!(bearer_token(&headers("Basic dXNlcjpwYXNz")), Err(ApiError::Unauthorized(_))));
        assert!(matches!(bearer_token(&headers("Bearer ")), Err(ApiError::Unauthorized(_))));
    }
}
