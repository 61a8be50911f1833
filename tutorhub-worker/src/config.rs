/// Worker configuration
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required), `DATABASE_MAX_CONNECTIONS` (default: 10)
/// - `OPENAI_API_KEY` (required), `OPENAI_BASE_URL`, `OPENAI_CHAT_MODEL`
/// - `WORKER_POLL_INTERVAL_SECS`: queue poll interval (default: 2)
/// - `WORKER_MAX_CONCURRENT_JOBS`: jobs run at once (default: 2)
/// - `WORKER_BATCH_DELAY_MS`: pause between batches of one job (default: 2000)
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use tutorhub_shared::db::pool::DatabaseConfig;
use tutorhub_shared::providers::OpenAiConfig;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database: DatabaseConfig,
    pub openai: OpenAiConfig,
    pub poll_interval_secs: u64,
    pub max_concurrent_jobs: usize,
    pub batch_delay_ms: u64,
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

impl WorkerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_map(vars: &HashMap<String, String>) -> anyhow::Result<Self> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database = DatabaseConfig {
            url: required(&lookup, "DATABASE_URL")?,
            max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10u32)?,
            ..Default::default()
        };

        let defaults = OpenAiConfig::default();
        let openai = OpenAiConfig {
            api_key: required(&lookup, "OPENAI_API_KEY")?,
            base_url: lookup("OPENAI_BASE_URL").unwrap_or(defaults.base_url),
            chat_model: lookup("OPENAI_CHAT_MODEL").unwrap_or(defaults.chat_model),
            ..defaults
        };

        let poll_interval_secs = parse_or(&lookup, "WORKER_POLL_INTERVAL_SECS", 2u64)?;
        let max_concurrent_jobs = parse_or(&lookup, "WORKER_MAX_CONCURRENT_JOBS", 2usize)?;
        if max_concurrent_jobs == 0 {
            anyhow::bail!("WORKER_MAX_CONCURRENT_JOBS must be greater than zero");
        }
        let batch_delay_ms = parse_or(&lookup, "WORKER_BATCH_DELAY_MS", 2000u64)?;

        Ok(Self {
            database,
            openai,
            poll_interval_secs,
            max_concurrent_jobs,
            batch_delay_ms,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        [
            ("DATABASE_URL", "postgresql://localhost/tutorhub_test"),
            ("OPENAI_API_KEY", "sk-test"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::from_map(&base_vars()).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.max_concurrent_jobs, 2);
        assert_eq!(config.batch_delay(), Duration::from_millis(2000));
        assert_eq!(config.openai.chat_model, "gpt-4o-mini");
        assert_eq!(config.database.max_connections, 10);
    }

    #[test]
    fn test_overrides() {
        let mut vars = base_vars();
        vars.insert("WORKER_MAX_CONCURRENT_JOBS".into(), "4".into());
        vars.insert("WORKER_BATCH_DELAY_MS".into(), "0".into());
        vars.insert("OPENAI_CHAT_MODEL".into(), "gpt-4o".into());

        let config = WorkerConfig::from_map(&vars).unwrap();
        assert_eq!(config.max_concurrent_jobs, 4);
        assert_eq!(config.batch_delay(), Duration::ZERO);
        assert_eq!(config.openai.chat_model, "gpt-4o");
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut vars = base_vars();
        vars.insert("WORKER_MAX_CONCURRENT_JOBS".into(), "0".into());
        assert!(WorkerConfig::from_map(&vars).is_err());
    }

    #[test]
    fn test_missing_openai_key() {
        let mut vars = base_vars();
        vars.remove("OPENAI_API_KEY");
        assert!(WorkerConfig::from_map(&vars).is_err());
    }
}
