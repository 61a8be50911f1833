//! HTTP-backed credential source and usage reporter
//!
//! Both talk to the TutorHub API with the caller's session token:
//! `POST /v1/realtime/sessions` and `POST /v1/realtime/sessions/usage`.

use async_trait::async_trait;
use reqwest::Client;

use super::protocol::EphemeralCredential;
use super::session::{CredentialSource, SessionError, SessionUsage, UsageReporter};

#[derive(Debug, Clone)]
struct ApiEndpoint {
    http: Client,
    base_url: String,
    bearer: String,
}

impl ApiEndpoint {
    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

/// Fetches ephemeral credentials from the API
#[derive(Debug, Clone)]
pub struct HttpCredentialSource {
    endpoint: ApiEndpoint,
}

impl HttpCredentialSource {
    pub fn new(http: Client, base_url: impl Into<String>, bearer: impl Into<String>) -> Self {
        Self {
            endpoint: ApiEndpoint {
                http,
                base_url: base_url.into(),
                bearer: bearer.into(),
            },
        }
    }

    pub fn url(&self) -> String {
        self.endpoint.url("/v1/realtime/sessions")
    }
}

#[async_trait]
impl CredentialSource for HttpCredentialSource {
    async fn fetch(&self) -> Result<EphemeralCredential, SessionError> {
        let response = self
            .endpoint
            .http
            .post(self.url())
            .bearer_auth(&self.endpoint.bearer)
            .send()
            .await
            .map_err(|e| SessionError::Credential(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::Credential(format!("API returned {}", status)));
        }

        response
            .json::<EphemeralCredential>()
            .await
            .map_err(|e| SessionError::Credential(e.to_string()))
    }
}

/// Reports session usage to the API
#[derive(Debug, Clone)]
pub struct HttpUsageReporter {
    endpoint: ApiEndpoint,
}

impl HttpUsageReporter {
    pub fn new(http: Client, base_url: impl Into<String>, bearer: impl Into<String>) -> Self {
        Self {
            endpoint: ApiEndpoint {
                http,
                base_url: base_url.into(),
                bearer: bearer.into(),
            },
        }
    }

    pub fn url(&self) -> String {
        self.endpoint.url("/v1/realtime/sessions/usage")
    }
}

#[async_trait]
impl UsageReporter for HttpUsageReporter {
    async fn report(&self, usage: &SessionUsage) -> Result<(), SessionError> {
        let response = self
            .endpoint
            .http
            .post(self.url())
            .bearer_auth(&self.endpoint.bearer)
            .json(usage)
            .send()
            .await
            .map_err(|e| SessionError::Usage(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(SessionError::Usage(format!("API returned {}", response.status())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let source = HttpCredentialSource::new(Client::new(), "http://localhost:8080/", "token");
        assert_eq!(source.url(), "http://localhost:8080/v1/realtime/sessions");

        let reporter = HttpUsageReporter::new(Client::new(), "http://localhost:8080", "token");
        assert_eq!(reporter.url(), "http://localhost:8080/v1/realtime/sessions/usage");
    }

    #[tokio::test]
    async fn test_unreachable_api_is_credential_error() {
        let source = HttpCredentialSource::new(Client::new(), "http://127.0.0.1:1", "token");
        assert!(matches!(source.fetch().await, Err(SessionError::Credential(_))));
    }
}
