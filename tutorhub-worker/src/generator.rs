/// Chunked assessment generation
///
/// A job is filled in sequential batches. Each batch asks the
/// [`QuestionSource`] for `min(batch_size, remaining)` questions, persists
/// them through the [`ProgressStore`] together with the new
/// `generated_count`, then waits a fixed delay before the next batch.
///
/// ```text
/// resume at generated_count
///   └─> loop while generated < total
///         ├─> cancelled?            → release (back to pending)
///         ├─> source.generate(n)    → error / empty → mark_failed
///         ├─> store.record_batch    → job not running → abandon
///         └─> sleep(batch_delay)    (skipped after the last batch)
///   └─> mark_completed
/// ```
///
/// Batches are never retried. Questions stored by earlier batches remain
/// when a later one fails.
use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tutorhub_shared::models::assessment::{AssessmentJob, NewQuestion};
use tutorhub_shared::providers::ProviderError;
use uuid::Uuid;

/// Request for one batch of questions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub subject: String,
    pub topic: String,
    pub level: String,

    /// Number of questions wanted
    pub count: usize,

    /// Prompts already generated for the job
    pub avoid: Vec<String>,
}

/// Produces questions for a batch
#[async_trait]
pub trait QuestionSource: Send + Sync {
    async fn generate(&self, request: &BatchRequest) -> Result<Vec<NewQuestion>, ProviderError>;
}

/// Persists job progress
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Prompts stored so far, in generation order
    async fn existing_prompts(&self, job_id: Uuid) -> Result<Vec<String>, sqlx::Error>;

    /// Stores a batch and returns the new `generated_count`, `None` when the
    /// job is no longer running
    async fn record_batch(&self, job_id: Uuid, questions: &[NewQuestion]) -> Result<Option<i32>, sqlx::Error>;

    async fn mark_completed(&self, job_id: Uuid) -> Result<(), sqlx::Error>;

    async fn mark_failed(&self, job_id: Uuid, error: &str) -> Result<(), sqlx::Error>;

    /// Returns the job to the queue
    async fn release(&self, job_id: Uuid) -> Result<(), sqlx::Error>;
}

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Question source failed: {0}")]
    Source(#[from] ProviderError),

    #[error("Question source returned no usable questions (requested {requested})")]
    EmptyBatch { requested: usize },

    #[error("Progress store failed: {0}")]
    Store(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Pause between two batches of the same job
    pub batch_delay: Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            batch_delay: Duration::from_secs(2),
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// All questions generated
    Completed,

    /// A batch failed; the job is marked failed with this message
    Failed(String),

    /// Stopped at a batch boundary and returned to pending
    Released,

    /// The job stopped being `running` under this worker; nothing was
    /// stored or changed
    Abandoned,
}

fn normalize(prompt: &str) -> String {
    prompt.trim().to_lowercase()
}

/// Keeps at most `count` questions whose prompts are not empty and not
/// already in `seen`
fn accept_batch(batch: Vec<NewQuestion>, count: usize, seen: &mut HashSet<String>) -> Vec<NewQuestion> {
    let mut accepted = Vec::with_capacity(count.min(batch.len()));

    for question in batch {
        if accepted.len() == count {
            break;
        }
        let key = normalize(&question.prompt);
        if key.is_empty() || !seen.insert(key) {
            continue;
        }
        accepted.push(question);
    }

    accepted
}

/// Runs one claimed job to completion, failure or cancellation
///
/// Batch failures end the job as [`JobOutcome::Failed`]. An `Err` is only
/// returned when the store itself fails.
pub async fn run_job<S, P>(
    job: &AssessmentJob,
    source: &S,
    store: &P,
    config: &GeneratorConfig,
    cancel: &CancellationToken,
) -> Result<JobOutcome, GeneratorError>
where
    S: QuestionSource + ?Sized,
    P: ProgressStore + ?Sized,
{
    let total = job.total_questions;
    let batch_size = job.batch_size.max(1);
    let mut generated = job.generated_count;

    let mut avoid = if generated > 0 {
        store.existing_prompts(job.id).await?
    } else {
        Vec::new()
    };
    let mut seen: HashSet<String> = avoid.iter().map(|p| normalize(p)).collect();

    if generated > 0 {
        info!(job_id = %job.id, generated, total, "Resuming job");
    }

    while generated < total {
        if cancel.is_cancelled() {
            store.release(job.id).await?;
            info!(job_id = %job.id, generated, "Job released");
            return Ok(JobOutcome::Released);
        }

        let count = batch_size.min(total - generated) as usize;
        let request = BatchRequest {
            subject: job.subject.clone(),
            topic: job.topic.clone(),
            level: job.level.clone(),
            count,
            avoid: avoid.clone(),
        };

        let questions = match source.generate(&request).await {
            Ok(batch) => {
                let received = batch.len();
                let accepted = accept_batch(batch, count, &mut seen);
                if accepted.len() != received {
                    debug!(job_id = %job.id, received, kept = accepted.len(), "Dropped surplus or duplicate questions");
                }
                if accepted.is_empty() {
                    Err(GeneratorError::EmptyBatch { requested: count })
                } else {
                    Ok(accepted)
                }
            }
            Err(e) => Err(GeneratorError::Source(e)),
        };

        let questions = match questions {
            Ok(questions) => questions,
            Err(e) => {
                let message = e.to_string();
                warn!(job_id = %job.id, generated, error = %message, "Batch failed");
                store.mark_failed(job.id, &message).await?;
                return Ok(JobOutcome::Failed(message));
            }
        };

        generated = match store.record_batch(job.id, &questions).await? {
            Some(count) => count,
            None => {
                warn!(job_id = %job.id, generated, "Job no longer running, dropping batch");
                return Ok(JobOutcome::Abandoned);
            }
        };
        avoid.extend(questions.into_iter().map(|q| q.prompt));
        info!(job_id = %job.id, generated, total, "Batch stored");

        if generated >= total || config.batch_delay.is_zero() {
            continue;
        }

        tokio::select! {
            _ = tokio::time::sleep(config.batch_delay) => {}
            _ = cancel.cancelled() => {
                store.release(job.id).await?;
                info!(job_id = %job.id, generated, "Job released during batch delay");
                return Ok(JobOutcome::Released);
            }
        }
    }

    store.mark_completed(job.id).await?;
    info!(job_id = %job.id, generated, "Job completed");
    Ok(JobOutcome::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(prompt: &str) -> NewQuestion {
        NewQuestion {
            prompt: prompt.to_string(),
            options: vec![],
            answer: "a".to_string(),
            explanation: None,
        }
    }

    #[test]
    fn test_accept_batch_truncates() {
        let mut seen = HashSet::new();
        let batch = vec![question("1"), question("2"), question("3")];
        let accepted = accept_batch(batch, 2, &mut seen);
        assert_eq!(accepted.len(), 2);
        assert_eq!(accepted[1].prompt, "2");
    }

    #[test]
    fn test_accept_batch_drops_duplicates() {
        let mut seen: HashSet<String> = ["what is 1/2?".to_string()].into_iter().collect();
        let batch = vec![
            question("What is 1/2? "),
            question("What is 1/3?"),
            question("what is 1/3?"),
            question("  "),
        ];
        let accepted = accept_batch(batch, 5, &mut seen);
        assert_eq!(accepted, vec![question("What is 1/3?")]);
    }

    #[test]
    fn test_error_messages() {
        let err = GeneratorError::EmptyBatch { requested: 5 };
        assert_eq!(
            err.to_string(),
            "Question source returned no usable questions (requested 5)"
        );
    }
}
