/// Configuration management for the API server
///
/// Configuration is read from environment variables; a `.env` file is loaded
/// first when present.
///
/// # Environment Variables
///
/// - `API_HOST` / `API_PORT`: bind address (default: 0.0.0.0:8080)
/// - `API_PRODUCTION`: enables HSTS (default: false)
/// - `CORS_ORIGINS`: comma-separated origins, `*` for any (default: *)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 10)
/// - `JWT_SECRET`: session token secret, at least 32 characters (required)
/// - `AGORA_APP_ID` / `AGORA_APP_CERTIFICATE`: 32 hex characters each (required)
/// - `AGORA_TOKEN_TTL_SECONDS`: access token lifetime (default: 3600)
/// - `OPENAI_API_KEY` (required), `OPENAI_BASE_URL`, `OPENAI_REALTIME_MODEL`,
///   `OPENAI_REALTIME_VOICE`
/// - `RESEND_API_KEY` / `EMAIL_FROM`: email sending, disabled when unset
/// - `REDIS_URL`: rate limiting, disabled when unset
/// - `RATE_LIMIT_PER_MINUTE`: requests per user per minute on limited routes (default: 20)
///
/// # Example
///
/// ```no_run
/// use tutorhub_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```
use std::collections::HashMap;
use std::env;
use std::str::FromStr;

use tutorhub_shared::db::pool::DatabaseConfig;
use tutorhub_shared::providers::OpenAiConfig;
use tutorhub_shared::token::access_token::is_app_key;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub agora: AgoraConfig,
    pub openai: OpenAiConfig,

    /// `None` when email sending is not configured
    pub email: Option<EmailConfig>,

    /// `None` disables rate limiting
    pub redis_url: Option<String>,

    pub rate_limit_per_minute: u32,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Production mode (enables HSTS)
    pub production: bool,

    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Shared secret of the auth provider
    pub secret: String,
}

/// Agora project credentials
#[derive(Clone)]
pub struct AgoraConfig {
    pub app_id: String,
    pub app_certificate: String,
    pub token_ttl_seconds: u32,
}

impl std::fmt::Debug for AgoraConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgoraConfig")
            .field("app_id", &self.app_id)
            .field("app_certificate", &"<redacted>")
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .finish()
    }
}

#[derive(Clone)]
pub struct EmailConfig {
    pub resend_api_key: String,
    pub from: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("resend_api_key", &"<redacted>")
            .field("from", &self.from)
            .finish()
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value: {}", key, e)),
        None => Ok(default),
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<String> {
    lookup(key)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| anyhow::anyhow!("{} environment variable is required", key))
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value is invalid.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration from an in-memory map
    pub fn from_map(vars: &HashMap<String, String>) -> anyhow::Result<Self> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let host = lookup("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(&lookup, "API_PORT", 8080u16)?;
        let production = parse_or(&lookup, "API_PRODUCTION", false)?;
        let cors_origins = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let database_url = required(&lookup, "DATABASE_URL")?;
        let max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10u32)?;

        let jwt_secret = required(&lookup, "JWT_SECRET")?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let app_id = required(&lookup, "AGORA_APP_ID")?;
        if !is_app_key(&app_id) {
            anyhow::bail!("AGORA_APP_ID must be 32 hex characters");
        }
        let app_certificate = required(&lookup, "AGORA_APP_CERTIFICATE")?;
        if !is_app_key(&app_certificate) {
            anyhow::bail!("AGORA_APP_CERTIFICATE must be 32 hex characters");
        }
        let token_ttl_seconds = parse_or(&lookup, "AGORA_TOKEN_TTL_SECONDS", 3600u32)?;

        let openai_defaults = OpenAiConfig::default();
        let openai = OpenAiConfig {
            api_key: required(&lookup, "OPENAI_API_KEY")?,
            base_url: lookup("OPENAI_BASE_URL").unwrap_or(openai_defaults.base_url),
            realtime_model: lookup("OPENAI_REALTIME_MODEL").unwrap_or(openai_defaults.realtime_model),
            realtime_voice: lookup("OPENAI_REALTIME_VOICE").unwrap_or(openai_defaults.realtime_voice),
            chat_model: lookup("OPENAI_CHAT_MODEL").unwrap_or(openai_defaults.chat_model),
        };

        let email = match (lookup("RESEND_API_KEY"), lookup("EMAIL_FROM")) {
            (Some(resend_api_key), Some(from)) if !resend_api_key.is_empty() && !from.is_empty() => {
                Some(EmailConfig { resend_api_key, from })
            }
            _ => None,
        };

        let redis_url = lookup("REDIS_URL").filter(|v| !v.is_empty());
        let rate_limit_per_minute = parse_or(&lookup, "RATE_LIMIT_PER_MINUTE", 20u32)?;
        if rate_limit_per_minute == 0 {
            anyhow::bail!("RATE_LIMIT_PER_MINUTE must be greater than zero");
        }

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                production,
                cors_origins,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
                ..Default::default()
            },
            jwt: JwtConfig { secret: jwt_secret },
            agora: AgoraConfig {
                app_id,
                app_certificate,
                token_ttl_seconds,
            },
            openai,
            email,
            redis_url,
            rate_limit_per_minute,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}
