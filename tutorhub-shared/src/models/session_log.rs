/// Realtime voice session usage log
///
/// One row per finished voice-tutor session, written when the client reports
/// its duration on disconnect.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RealtimeSessionLog {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub session_id: String,
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: i64,
    pub created_at: DateTime<Utc>,
}

/// Input for recording a session
#[derive(Debug, Clone)]
pub struct CreateSessionLog {
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub session_id: String,
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: i64,
}

impl RealtimeSessionLog {
    pub async fn create(pool: &PgPool, data: CreateSessionLog) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, RealtimeSessionLog>(
            r#"
            INSERT INTO realtime_session_logs
                (organization_id, user_id, session_id, model, started_at, ended_at, duration_seconds)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, organization_id, user_id, session_id, model,
                      started_at, ended_at, duration_seconds, created_at
            "#,
        )
        .bind(data.organization_id)
        .bind(data.user_id)
        .bind(data.session_id)
        .bind(data.model)
        .bind(data.started_at)
        .bind(data.ended_at)
        .bind(data.duration_seconds)
        .fetch_one(pool)
        .await
    }
}
