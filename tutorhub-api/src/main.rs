//! # TutorHub API Server
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p tutorhub-api
//! ```
//!
//! Set `LOG_FORMAT=json` for JSON logs and `RUST_LOG` to adjust filtering.

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tutorhub_api::{
    app::{build_router, AppState},
    config::Config,
    middleware::rate_limit::RateLimiter,
};
use tutorhub_shared::db::{migrations::run_migrations, pool::create_pool};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "tutorhub_api=debug,tower_http=debug".into());
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

    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    tracing::info!("TutorHub API Server v{} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let pool = create_pool(&config.database).await?;
    run_migrations(&pool).await?;
    tracing::info!("Database ready");

    let rate_limiter = match config.redis_url.as_deref() {
        Some(url) => {
            let limiter = RateLimiter::connect(url, config.rate_limit_per_minute).await?;
            tracing::info!(per_minute = config.rate_limit_per_minute, "Rate limiting enabled");
            Some(limiter)
        }
        None => {
            tracing::warn!("REDIS_URL not set, rate limiting disabled");
            None
        }
    };

    if config.email.is_none() {
        tracing::warn!("RESEND_API_KEY or EMAIL_FROM not set, email sending disabled");
    }

    let bind_address = config.bind_address();
    let mut state = AppState::new(pool, config)?;
    if let Some(limiter) = rate_limiter {
        state = state.with_rate_limiter(limiter);
    }

    let app = build_router(state);
    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
