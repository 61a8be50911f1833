//! PostgreSQL progress store

use async_trait::async_trait;
use sqlx::PgPool;
use tutorhub_shared::models::assessment::{AssessmentJob, AssessmentQuestion, NewQuestion};
use uuid::Uuid;

use crate::generator::ProgressStore;

#[derive(Debug, Clone)]
pub struct PgProgressStore {
    db: PgPool,
}

impl PgProgressStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProgressStore for PgProgressStore {
    async fn existing_prompts(&self, job_id: Uuid) -> Result<Vec<String>, sqlx::Error> {
        AssessmentQuestion::prompts_for_job(&self.db, job_id).await
    }

    async fn record_batch(&self, job_id: Uuid, questions: &[NewQuestion]) -> Result<Option<i32>, sqlx::Error> {
        AssessmentJob::record_batch(&self.db, job_id, questions).await
    }

    async fn mark_completed(&self, job_id: Uuid) -> Result<(), sqlx::Error> {
        AssessmentJob::mark_completed(&self.db, job_id).await
    }

    async fn mark_failed(&self, job_id: Uuid, error: &str) -> Result<(), sqlx::Error> {
        AssessmentJob::mark_failed(&self.db, job_id, error).await
    }

    async fn release(&self, job_id: Uuid) -> Result<(), sqlx::Error> {
        AssessmentJob::release(&self.db, job_id).await
    }
}
