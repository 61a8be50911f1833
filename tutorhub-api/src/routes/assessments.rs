/// Assessment generation endpoints
///
/// Generating a full assessment takes several provider calls, so the
/// request only queues a job; the worker fills it batch by batch and the
/// client polls the job for progress.
///
/// # Endpoints
///
/// - `POST /v1/assessments/generate`: queue a job (202)
/// - `GET /v1/assessments/jobs/:id`: job state, progress and questions
///
/// # Example Request
///
/// ```json
/// {
///   "subject": "Mathematics",
///   "topic": "Quadratic equations",
///   "level": "Grade 9",
///   "total_questions": 30,
///   "batch_size": 5
/// }
/// ```
use crate::app::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tutorhub_shared::auth::{Capability, SessionContext};
use tutorhub_shared::models::assessment::{AssessmentJob, AssessmentQuestion, CreateAssessmentJob};
use uuid::Uuid;
use validator::Validate;

/// Default number of questions requested per provider call
pub const DEFAULT_BATCH_SIZE: i32 = 5;

/// Generate request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GenerateRequest {
    #[validate(length(min = 1, max = 200))]
    pub subject: String,

    #[validate(length(min = 1, max = 500))]
    pub topic: String,

    /// Grade or proficiency level
    #[validate(length(min = 1, max = 100))]
    pub level: String,

    #[validate(range(min = 1, max = 100))]
    pub total_questions: i32,

    #[validate(range(min = 1, max = 20))]
    pub batch_size: Option<i32>,
}

/// Job with its generated questions
#[derive(Debug, Clone, Serialize)]
pub struct JobResponse {
    #[serde(flatten)]
    pub job: AssessmentJob,

    /// Percentage of requested questions generated so far
    pub progress: u8,

    pub questions: Vec<AssessmentQuestion>,
}

/// Share of the job already generated, in whole percent
pub fn progress_percent(generated: i32, total: i32) -> u8 {
    if total <= 0 {
        return 0;
    }
    ((generated.clamp(0, total) as i64 * 100) / total as i64) as u8
}

/// Queues an assessment generation job
///
/// # Errors
///
/// - 403 Forbidden: missing GenerateAssessment
/// - 422 Unprocessable Entity: validation errors
/// - 429 Too Many Requests: rate limit exceeded
pub async fn generate(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Json(request): Json<GenerateRequest>,
) -> ApiResult<(StatusCode, Json<JobResponse>)> {
    session.require(Capability::GenerateAssessment)?;
    request.validate()?;

    let job = AssessmentJob::create(
        &state.db,
        CreateAssessmentJob {
            organization_id: session.organization_id,
            requested_by: session.user_id,
            subject: request.subject,
            topic: request.topic,
            level: request.level,
            total_questions: request.total_questions,
            batch_size: request.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
        },
    )
    .await?;

    tracing::info!(
        job_id = %job.id,
        user_id = %session.user_id,
        organization_id = %session.organization_id,
        total_questions = job.total_questions,
        batch_size = job.batch_size,
        "Queued assessment job"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(JobResponse {
            progress: 0,
            job,
            questions: Vec::new(),
        }),
    ))
}

/// Returns a job of the caller's organization
///
/// # Errors
///
/// - 403 Forbidden: missing GenerateAssessment
/// - 404 Not Found: no such job in the caller's organization
pub async fn get_job(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<JobResponse>> {
    session.require(Capability::GenerateAssessment)?;

    let job = AssessmentJob::find_by_id_and_organization(&state.db, job_id, session.organization_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Assessment job {} not found", job_id)))?;

    let questions = AssessmentQuestion::list_for_job(&state.db, job.id).await?;

    Ok(Json(JobResponse {
        progress: progress_percent(job.generated_count, job.total_questions),
        job,
        questions,
    }))
}
