//! # TutorHub Worker
//!
//! Claims pending assessment jobs and generates their questions in batches.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p tutorhub-worker
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tutorhub_shared::db::{migrations::run_migrations, pool::create_pool};
use tutorhub_shared::providers::OpenAiClient;
use tutorhub_worker::{
    config::WorkerConfig,
    generator::GeneratorConfig,
    queue::JobQueue,
    runner::{JobRunner, RunnerConfig},
    source::OpenAiQuestionSource,
    store::PgProgressStore,
};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "tutorhub_worker=debug".into());
    let json = std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    tracing::info!("TutorHub Worker v{} starting", env!("CARGO_PKG_VERSION"));

    let config = WorkerConfig::from_env()?;

    let pool = create_pool(&config.database).await?;
    run_migrations(&pool).await?;

    let queue = JobQueue::new(pool.clone());
    tracing::info!(pending = queue.pending_count().await?, "Queue ready");

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(120))
        .user_agent(concat!("tutorhub-worker/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let source = OpenAiQuestionSource::new(OpenAiClient::new(http, config.openai.clone()));

    let runner = JobRunner::new(
        queue,
        Arc::new(source),
        Arc::new(PgProgressStore::new(pool)),
        RunnerConfig {
            poll_interval: config.poll_interval(),
            max_concurrent_jobs: config.max_concurrent_jobs,
            ..Default::default()
        },
        GeneratorConfig {
            batch_delay: config.batch_delay(),
        },
    );

    let shutdown = runner.shutdown_token();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.cancel();
    });

    runner.run().await?;

    tracing::info!("Worker stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping at the next batch boundary");
}
