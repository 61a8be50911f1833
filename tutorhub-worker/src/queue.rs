/// Assessment job queue reader
///
/// Pending jobs are claimed atomically with `FOR UPDATE SKIP LOCKED`, so
/// several workers can poll the same table without claiming a job twice.
/// Claimed jobs move to `running`; jobs that restart keep their original
/// `started_at`.
///
/// # Example
///
/// ```no_run
/// use tutorhub_worker::queue::JobQueue;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let queue = JobQueue::new(pool);
/// for job in queue.claim_jobs(2).await? {
///     println!("Claimed job {} ({}/{})", job.id, job.generated_count, job.total_questions);
/// }
/// # Ok(())
/// # }
/// ```
use std::time::Duration;

use sqlx::PgPool;
use thiserror::Error;
use tutorhub_shared::models::assessment::AssessmentJob;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct JobQueue {
    db: PgPool,
}

impl JobQueue {
    pub fn new(db: PgPool) -> Self {
        JobQueue { db }
    }

    /// Claims up to `limit` pending jobs, oldest first
    pub async fn claim_jobs(&self, limit: usize) -> Result<Vec<AssessmentJob>, QueueError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let jobs = sqlx::query_as::<_, AssessmentJob>(
            r#"
            WITH pending_jobs AS (
                SELECT id
                FROM assessment_jobs
                WHERE state = 'pending'
                ORDER BY created_at ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE assessment_jobs
            SET
                state = 'running',
                started_at = COALESCE(assessment_jobs.started_at, NOW()),
                updated_at = NOW()
            FROM pending_jobs
            WHERE assessment_jobs.id = pending_jobs.id
            RETURNING
                assessment_jobs.id,
                assessment_jobs.organization_id,
                assessment_jobs.requested_by,
                assessment_jobs.subject,
                assessment_jobs.topic,
                assessment_jobs.level,
                assessment_jobs.total_questions,
                assessment_jobs.batch_size,
                assessment_jobs.generated_count,
                assessment_jobs.state,
                assessment_jobs.error,
                assessment_jobs.started_at,
                assessment_jobs.finished_at,
                assessment_jobs.created_at,
                assessment_jobs.updated_at
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.db)
        .await?;

        if !jobs.is_empty() {
            tracing::info!(count = jobs.len(), "Claimed jobs");
        }

        Ok(jobs)
    }

    pub async fn pending_count(&self) -> Result<i64, QueueError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM assessment_jobs WHERE state = 'pending'")
            .fetch_one(&self.db)
            .await?;

        Ok(count)
    }

    /// Returns running jobs untouched for longer than `max_age` to pending
    ///
    /// Covers workers that died without releasing their jobs. Stored
    /// progress is kept, so the next claim resumes.
    pub async fn release_stale(&self, max_age: Duration) -> Result<u64, QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE assessment_jobs
            SET state = 'pending', updated_at = NOW()
            WHERE state = 'running'
              AND updated_at < NOW() - make_interval(secs => $1)
            "#,
        )
        .bind(max_age.as_secs_f64())
        .execute(&self.db)
        .await?;

        let released = result.rows_affected();
        if released > 0 {
            tracing::warn!(released, "Released stale running jobs");
        }

        Ok(released)
    }
}
