//! Third-party HTTP providers
//!
//! - [`openai`]: realtime session minting and JSON chat completions
//! - [`resend`]: transactional email
//!
//! Calls are made once; a failed request is returned to the caller.

pub mod openai;
pub mod resend;

pub use openai::{OpenAiClient, OpenAiConfig};
pub use resend::{EmailMessage, ResendClient};

/// Error type for provider calls
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Transport-level failure
    #[error("{provider} request failed: {source}")]
    Request {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success status from the provider
    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },

    /// Response did not have the expected shape
    #[error("{provider} returned an invalid response: {message}")]
    InvalidResponse { provider: &'static str, message: String },
}

impl ProviderError {
    pub fn provider(&self) -> &'static str {
        match self {
            ProviderError::Request { provider, .. }
            | ProviderError::Status { provider, .. }
            | ProviderError::InvalidResponse { provider, .. } => provider,
        }
    }
}

/// Longest provider error body kept in errors and logs
const MAX_ERROR_BODY: usize = 512;

/// Turns a non-success response into [`ProviderError::Status`]
pub(crate) async fn check_status(
    provider: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }

    Err(ProviderError::Status {
        provider,
        status: status.as_u16(),
        body,
    })
}
