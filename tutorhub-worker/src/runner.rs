/// Worker loop
///
/// Polls the job queue and runs claimed jobs concurrently, up to
/// `max_concurrent_jobs`. Each job is driven by [`run_job`] in its own
/// Tokio task.
///
/// ```text
/// JobRunner
///   ├─> JobQueue: claim pending jobs for free slots
///   ├─> run_job: batches through QuestionSource / ProgressStore
///   └─> wait for shutdown, a finished job or the poll interval
/// ```
///
/// # Shutdown
///
/// Cancelling the shutdown token stops claiming. Running jobs see the
/// cancellation at their next batch boundary, keep the progress already
/// stored and go back to `pending`. Jobs still running after the grace
/// period are aborted.
///
/// # Stale jobs
///
/// Every `stale_check_interval` the loop returns `running` jobs untouched
/// for `stale_after` to `pending`. This recovers jobs aborted on shutdown or
/// left behind by a crashed worker, without waiting for a restart.
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tutorhub_shared::models::assessment::AssessmentJob;

use crate::generator::{run_job, GeneratorConfig, ProgressStore, QuestionSource};
use crate::queue::JobQueue;

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub poll_interval: Duration,
    pub max_concurrent_jobs: usize,

    /// How long running jobs get to reach a batch boundary on shutdown
    pub shutdown_grace: Duration,

    /// Running jobs not updated for this long belong to no live worker
    pub stale_after: Duration,

    pub stale_check_interval: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            poll_interval: Duration::from_secs(2),
            max_concurrent_jobs: 2,
            shutdown_grace: Duration::from_secs(30),
            stale_after: Duration::from_secs(15 * 60),
            stale_check_interval: Duration::from_secs(60),
        }
    }
}

/// Schedule of stale-job sweeps; the first one is due immediately
#[derive(Debug)]
struct StaleSweep {
    every: Duration,
    next: Instant,
}

impl StaleSweep {
    fn new(every: Duration, now: Instant) -> Self {
        StaleSweep { every, next: now }
    }

    fn due(&mut self, now: Instant) -> bool {
        if now < self.next {
            return false;
        }
        self.next = now + self.every;
        true
    }
}

pub struct JobRunner {
    queue: JobQueue,
    source: Arc<dyn QuestionSource>,
    store: Arc<dyn ProgressStore>,
    config: RunnerConfig,
    generator: GeneratorConfig,
    shutdown_token: CancellationToken,
}

impl JobRunner {
    pub fn new(
        queue: JobQueue,
        source: Arc<dyn QuestionSource>,
        store: Arc<dyn ProgressStore>,
        config: RunnerConfig,
        generator: GeneratorConfig,
    ) -> Self {
        JobRunner {
            queue,
            source,
            store,
            config,
            generator,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Token that stops the loop when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        tracing::info!(
            max_concurrent_jobs = self.config.max_concurrent_jobs,
            "Job runner starting"
        );

        let mut active: JoinSet<()> = JoinSet::new();
        let mut sweep = StaleSweep::new(self.config.stale_check_interval, Instant::now());

        loop {
            if self.shutdown_token.is_cancelled() {
                break;
            }

            if sweep.due(Instant::now()) {
                if let Err(e) = self.queue.release_stale(self.config.stale_after).await {
                    tracing::error!(error = %e, "Failed to release stale jobs");
                }
            }

            let slots = self.config.max_concurrent_jobs.saturating_sub(active.len());
            if slots > 0 {
                match self.queue.claim_jobs(slots).await {
                    Ok(jobs) => {
                        for job in jobs {
                            self.spawn_job(&mut active, job);
                        }
                    }
                    Err(e) => tracing::error!(error = %e, "Failed to claim jobs"),
                }
            }

            tokio::select! {
                _ = self.shutdown_token.cancelled() => break,
                Some(result) = active.join_next(), if !active.is_empty() => {
                    if let Err(e) = result {
                        tracing::error!(error = %e, "Job task panicked");
                    }
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        self.drain(active).await;
        tracing::info!("Job runner stopped");
        Ok(())
    }

    fn spawn_job(&self, active: &mut JoinSet<()>, job: AssessmentJob) {
        let source = self.source.clone();
        let store = self.store.clone();
        let config = self.generator.clone();
        let cancel = self.shutdown_token.child_token();

        tracing::info!(
            job_id = %job.id,
            generated = job.generated_count,
            total = job.total_questions,
            "Starting job"
        );

        active.spawn(async move {
            process_job(job, source, store, config, cancel).await;
        });
    }

    async fn drain(&self, mut active: JoinSet<()>) {
        if active.is_empty() {
            return;
        }

        tracing::info!(count = active.len(), "Waiting for running jobs to stop");
        let deadline = tokio::time::sleep(self.config.shutdown_grace);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                next = active.join_next() => match next {
                    Some(Err(e)) => tracing::error!(error = %e, "Job task panicked"),
                    Some(Ok(())) => {}
                    None => break,
                },
                _ = &mut deadline => {
                    tracing::warn!(count = active.len(), "Aborting jobs still running after grace period");
                    active.abort_all();
                    break;
                }
            }
        }
    }
}

/// Runs one job and records store failures on the job
pub async fn process_job(
    job: AssessmentJob,
    source: Arc<dyn QuestionSource>,
    store: Arc<dyn ProgressStore>,
    config: GeneratorConfig,
    cancel: CancellationToken,
) {
    let job_id = job.id;

    match run_job(&job, source.as_ref(), store.as_ref(), &config, &cancel).await {
        Ok(outcome) => tracing::debug!(job_id = %job_id, ?outcome, "Job finished"),
        Err(e) => {
            tracing::error!(job_id = %job_id, error = %e, "Job aborted");
            if let Err(e) = store.mark_failed(job_id, &e.to_string()).await {
                tracing::error!(job_id = %job_id, error = %e, "Failed to mark job as failed");
            }
        }
    }
}
