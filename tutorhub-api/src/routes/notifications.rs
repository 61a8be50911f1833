/// Email notification endpoint
///
/// `POST /v1/notifications/email` forwards a message to Resend with the
/// configured sender address.
///
/// # Example Request
///
/// ```json
/// {
///   "to": ["parent@example.com"],
///   "subject": "Lesson reminder",
///   "html": "<p>Your lesson starts at 4pm.</p>"
/// }
/// ```
use crate::app::AppState;
use crate::error::{ApiError, ApiResult, ValidationErrorDetail};
use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use tutorhub_shared::auth::{Capability, SessionContext};
use tutorhub_shared::providers::EmailMessage;
use validator::{Validate, ValidateEmail};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EmailRequest {
    #[validate(length(min = 1, max = 50))]
    pub to: Vec<String>,

    #[validate(length(min = 1, max = 998))]
    pub subject: String,

    #[validate(length(min = 1, max = 500000))]
    pub html: String,
}

impl EmailRequest {
    fn check_recipients(&self) -> Result<(), ApiError> {
        let invalid: Vec<ValidationErrorDetail> = self
            .to
            .iter()
            .filter(|address| !address.validate_email())
            .map(|address| ValidationErrorDetail {
                field: "to".to_string(),
                message: format!("{} is not a valid email address", address),
            })
            .collect();

        if invalid.is_empty() {
            Ok(())
        } else {
            Err(ApiError::ValidationError(invalid))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailResponse {
    /// Provider message id
    pub id: String,
}

/// Sends an email
///
/// # Errors
///
/// - 403 Forbidden: missing SendEmail
/// - 422 Unprocessable Entity: validation errors
/// - 502 Bad Gateway: Resend request failed
/// - 503 Service Unavailable: email is not configured
pub async fn send_email(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Json(request): Json<EmailRequest>,
) -> ApiResult<(StatusCode, Json<EmailResponse>)> {
    session.require(Capability::SendEmail)?;

    let resend = state
        .resend
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable("Email is not configured".to_string()))?;

    request.validate()?;
    request.check_recipients()?;

    let message = EmailMessage {
        to: request.to,
        subject: request.subject,
        html: request.html,
    };
    let id = resend.send(&message).await?;

    tracing::info!(
        user_id = %session.user_id,
        email_id = %id,
        recipients = message.to.len(),
        "Email sent"
    );

    Ok((StatusCode::ACCEPTED, Json(EmailResponse { id })))
}
