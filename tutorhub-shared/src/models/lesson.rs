/// Lesson rows and the per-organization earnings policy
///
/// Lessons are scheduled and completed through the hosted backend; this
/// workspace only reads them to compute tutor earnings.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE lesson_status AS ENUM ('scheduled', 'completed', 'cancelled', 'no_show');
///
/// CREATE TABLE lessons (
///     id UUID PRIMARY KEY,
///     organization_id UUID NOT NULL,
///     tutor_id UUID NOT NULL,
///     student_id UUID NOT NULL,
///     starts_at TIMESTAMPTZ NOT NULL,
///     duration_minutes INTEGER NOT NULL,
///     rate_cents BIGINT NOT NULL,
///     status lesson_status NOT NULL
/// );
/// ```
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Lesson lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "lesson_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LessonStatus {
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
}

/// Lesson row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Lesson {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub tutor_id: Uuid,
    pub student_id: Uuid,
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub rate_cents: i64,
    pub status: LessonStatus,
}

/// Filter for [`Lesson::list_for_earnings`]
#[derive(Debug, Clone, Default)]
pub struct LessonFilter {
    /// Inclusive lower bound on `starts_at`
    pub from: Option<DateTime<Utc>>,

    /// Exclusive upper bound on `starts_at`
    pub to: Option<DateTime<Utc>>,

    /// Restrict to a single tutor
    pub tutor_id: Option<Uuid>,
}

impl Lesson {
    /// Lessons of an organization that may carry earnings
    ///
    /// Scheduled and cancelled lessons never earn and are filtered out in SQL.
    pub async fn list_for_earnings(
        pool: &PgPool,
        organization_id: Uuid,
        filter: &LessonFilter,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Lesson>(
            r#"
            SELECT id, organization_id, tutor_id, student_id, starts_at,
                   duration_minutes, rate_cents, status
            FROM lessons
            WHERE organization_id = $1
              AND status IN ('completed', 'no_show')
              AND ($2::timestamptz IS NULL OR starts_at >= $2)
              AND ($3::timestamptz IS NULL OR starts_at < $3)
              AND ($4::uuid IS NULL OR tutor_id = $4)
            ORDER BY tutor_id, starts_at
            "#,
        )
        .bind(organization_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.tutor_id)
        .fetch_all(pool)
        .await
    }
}

/// Organization-level earnings policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct EarningsPolicy {
    /// Whether tutors are paid for lessons the student missed
    pub pay_no_shows: bool,
}

impl EarningsPolicy {
    /// Loads the policy, falling back to the default when none is stored
    pub async fn for_organization(pool: &PgPool, organization_id: Uuid) -> Result<Self, sqlx::Error> {
        let policy = sqlx::query_as::<_, EarningsPolicy>(
            "SELECT pay_no_shows FROM organization_earnings_policies WHERE organization_id = $1",
        )
        .bind(organization_id)
        .fetch_optional(pool)
        .await?;

        Ok(policy.unwrap_or_default())
    }
}
