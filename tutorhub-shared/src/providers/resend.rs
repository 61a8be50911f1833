//! Resend email client

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{check_status, ProviderError};

const PROVIDER: &str = "resend";

pub const DEFAULT_BASE_URL: &str = "https://api.resend.com";

/// Outgoing email
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Serialize)]
struct SendEmailBody<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendEmailResponse {
    id: String,
}

#[derive(Debug, Clone)]
pub struct ResendClient {
    http: Client,
    api_key: String,
    from: String,
    base_url: String,
}

impl ResendClient {
    pub fn new(http: Client, api_key: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            from: from.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn from_address(&self) -> &str {
        &self.from
    }

    /// Sends an email and returns the provider's message id
    pub async fn send(&self, message: &EmailMessage) -> Result<String, ProviderError> {
        let body = SendEmailBody {
            from: &self.from,
            to: &message.to,
            subject: &message.subject,
            html: &message.html,
        };

        let response = self
            .http
            .post(format!("{}/emails", self.base_url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|source| ProviderError::Request {
                provider: PROVIDER,
                source,
            })?;

        let response = check_status(PROVIDER, response).await?;
        let sent: SendEmailResponse = response.json().await.map_err(|e| ProviderError::InvalidResponse {
            provider: PROVIDER,
            message: e.to_string(),
        })?;

        debug!(email_id = %sent.id, recipients = message.to.len(), "Email sent");
        Ok(sent.id)
    }
}
