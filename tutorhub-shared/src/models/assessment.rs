/// Assessment generation jobs and their questions
///
/// A job asks for `total_questions` questions on a topic. The worker fills
/// it in batches of `batch_size`, persisting each batch and the running
/// `generated_count` before requesting the next one, so a restarted job
/// resumes where it stopped.
///
/// # State Machine
///
/// ```text
/// pending → running → completed
///                   → failed
/// running → pending   (worker shutdown)
/// ```
///
/// # Schema
///
/// ```sql
/// CREATE TYPE assessment_job_state AS ENUM ('pending', 'running', 'completed', 'failed');
///
/// CREATE TABLE assessment_jobs (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     organization_id UUID NOT NULL,
///     requested_by UUID NOT NULL,
///     subject VARCHAR(200) NOT NULL,
///     topic VARCHAR(500) NOT NULL,
///     level VARCHAR(100) NOT NULL,
///     total_questions INTEGER NOT NULL,
///     batch_size INTEGER NOT NULL,
///     generated_count INTEGER NOT NULL DEFAULT 0,
///     state assessment_job_state NOT NULL DEFAULT 'pending',
///     error TEXT,
///     started_at TIMESTAMPTZ,
///     finished_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE assessment_questions (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     job_id UUID NOT NULL REFERENCES assessment_jobs(id) ON DELETE CASCADE,
///     position INTEGER NOT NULL,
///     prompt TEXT NOT NULL,
///     options JSONB NOT NULL DEFAULT '[]',
///     answer TEXT NOT NULL,
///     explanation TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     UNIQUE (job_id, position)
/// );
/// ```
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

/// Job execution state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "assessment_job_state", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Waiting for a worker
    Pending,

    /// Claimed by a worker
    Running,

    /// All questions generated
    Completed,

    /// A batch failed; earlier batches are kept
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// Assessment job row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AssessmentJob {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub requested_by: Uuid,
    pub subject: String,
    pub topic: String,
    pub level: String,
    pub total_questions: i32,
    pub batch_size: i32,
    pub generated_count: i32,
    pub state: JobState,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a job
#[derive(Debug, Clone)]
pub struct CreateAssessmentJob {
    pub organization_id: Uuid,
    pub requested_by: Uuid,
    pub subject: String,
    pub topic: String,
    pub level: String,
    pub total_questions: i32,
    pub batch_size: i32,
}

/// Question as produced by a question source, before it is stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewQuestion {
    pub prompt: String,
    #[serde(default)]
    pub options: Vec<String>,
    pub answer: String,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Stored question row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AssessmentQuestion {
    pub id: Uuid,
    pub job_id: Uuid,
    pub position: i32,
    pub prompt: String,
    pub options: Json<Vec<String>>,
    pub answer: String,
    pub explanation: Option<String>,
}

const JOB_COLUMNS: &str = "id, organization_id, requested_by, subject, topic, level, total_questions, \
     batch_size, generated_count, state, error, started_at, finished_at, created_at, updated_at";

impl AssessmentJob {
    /// Number of questions still to generate
    pub fn remaining(&self) -> i32 {
        (self.total_questions - self.generated_count).max(0)
    }

    /// Creates a job in pending state
    pub async fn create(pool: &PgPool, data: CreateAssessmentJob) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO assessment_jobs
                (organization_id, requested_by, subject, topic, level, total_questions, batch_size)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {JOB_COLUMNS}
            "#
        );

        sqlx::query_as::<_, AssessmentJob>(&query)
            .bind(data.organization_id)
            .bind(data.requested_by)
            .bind(data.subject)
            .bind(data.topic)
            .bind(data.level)
            .bind(data.total_questions)
            .bind(data.batch_size)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {JOB_COLUMNS} FROM assessment_jobs WHERE id = $1");

        sqlx::query_as::<_, AssessmentJob>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a job by ID with organization isolation
    ///
    /// This is the lookup API handlers use.
    pub async fn find_by_id_and_organization(
        pool: &PgPool,
        id: Uuid,
        organization_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {JOB_COLUMNS} FROM assessment_jobs WHERE id = $1 AND organization_id = $2");

        sqlx::query_as::<_, AssessmentJob>(&query)
            .bind(id)
            .bind(organization_id)
            .fetch_optional(pool)
            .await
    }

    /// Stores a batch of questions and advances `generated_count`
    ///
    /// Runs in one transaction so progress and stored questions never
    /// disagree. Returns the new `generated_count`, or `None` without storing
    /// anything when the job is no longer `running` (released or finished
    /// elsewhere).
    pub async fn record_batch(
        pool: &PgPool,
        id: Uuid,
        questions: &[NewQuestion],
    ) -> Result<Option<i32>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let (start, state): (i32, JobState) =
            sqlx::query_as("SELECT generated_count, state FROM assessment_jobs WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

        if state != JobState::Running {
            tx.rollback().await?;
            return Ok(None);
        }

        for (offset, question) in questions.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO assessment_questions (job_id, position, prompt, options, answer, explanation)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(id)
            .bind(start + offset as i32)
            .bind(&question.prompt)
            .bind(Json(&question.options))
            .bind(&question.answer)
            .bind(&question.explanation)
            .execute(&mut *tx)
            .await?;
        }

        let updated: Option<(i32,)> = sqlx::query_as(
            r#"
            UPDATE assessment_jobs
            SET generated_count = generated_count + $2,
                updated_at = NOW()
            WHERE id = $1 AND state = 'running'
            RETURNING generated_count
            "#,
        )
        .bind(id)
        .bind(questions.len() as i32)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((generated_count,)) = updated else {
            tx.rollback().await?;
            return Ok(None);
        };

        tx.commit().await?;
        Ok(Some(generated_count))
    }

    pub async fn mark_completed(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE assessment_jobs
            SET state = 'completed', error = NULL, finished_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND state = 'running'
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn mark_failed(pool: &PgPool, id: Uuid, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE assessment_jobs
            SET state = 'failed', error = $2, finished_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND state = 'running'
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Returns a running job to the queue
    pub async fn release(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE assessment_jobs
            SET state = 'pending', updated_at = NOW()
            WHERE id = $1 AND state = 'running'
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }
}

impl AssessmentQuestion {
    /// Questions of a job in generation order
    pub async fn list_for_job(pool: &PgPool, job_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, AssessmentQuestion>(
            r#"
            SELECT id, job_id, position, prompt, options, answer, explanation
            FROM assessment_questions
            WHERE job_id = $1
            ORDER BY position
            "#,
        )
        .bind(job_id)
        .fetch_all(pool)
        .await
    }

    /// Prompts already generated for a job
    pub async fn prompts_for_job(pool: &PgPool, job_id: Uuid) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT prompt FROM assessment_questions WHERE job_id = $1 ORDER BY position")
            .bind(job_id)
            .fetch_all(pool)
            .await
    }
}
