//! Tutor earnings aggregation
//!
//! Turns lesson records into per-tutor payroll summaries. Only completed
//! lessons earn; no-shows earn when the organization pays for them.
//! Each lesson earns `rate_cents * duration_minutes / 60`, rounded half-up
//! to the cent, and rounding happens per lesson before summing.
//!
//! # Example
//!
//! ```
//! use tutorhub_shared::earnings::{aggregate, GroupBy};
//! use tutorhub_shared::models::lesson::EarningsPolicy;
//!
//! let report = aggregate(&[], EarningsPolicy::default(), GroupBy::Tutor);
//! assert_eq!(report.total_cents, 0);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::lesson::{EarningsPolicy, Lesson, LessonStatus};

/// How summaries are bucketed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    /// One summary per tutor
    #[default]
    Tutor,

    /// One summary per tutor and calendar month (UTC)
    Month,
}

/// Earnings of one tutor, optionally within one month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TutorEarnings {
    pub tutor_id: Uuid,

    /// `YYYY-MM` when grouped by month
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,

    pub lesson_count: u32,
    pub total_minutes: i64,
    pub total_cents: i64,
}

/// Aggregated earnings for an organization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarningsReport {
    /// Sorted by tutor id, then period
    pub tutors: Vec<TutorEarnings>,
    pub lesson_count: u32,
    pub total_minutes: i64,
    pub total_cents: i64,
}

/// Whether a lesson earns under the policy
pub fn is_billable(status: LessonStatus, policy: EarningsPolicy) -> bool {
    match status {
        LessonStatus::Completed => true,
        LessonStatus::NoShow => policy.pay_no_shows,
        LessonStatus::Scheduled | LessonStatus::Cancelled => false,
    }
}

/// Amount earned for one lesson, rounded half-up to the cent
pub fn lesson_amount_cents(rate_cents: i64, duration_minutes: i32) -> i64 {
    let numerator = rate_cents * i64::from(duration_minutes);
    (numerator + 30).div_euclid(60)
}

/// Aggregates lessons into a report
pub fn aggregate(lessons: &[Lesson], policy: EarningsPolicy, group_by: GroupBy) -> EarningsReport {
    let mut buckets: BTreeMap<(Uuid, Option<String>), TutorEarnings> = BTreeMap::new();

    for lesson in lessons.iter().filter(|l| is_billable(l.status, policy)) {
        let period = match group_by {
            GroupBy::Tutor => None,
            GroupBy::Month => Some(lesson.starts_at.format("%Y-%m").to_string()),
        };

        let entry = buckets
            .entry((lesson.tutor_id, period.clone()))
            .or_insert_with(|| TutorEarnings {
                tutor_id: lesson.tutor_id,
                period,
                lesson_count: 0,
                total_minutes: 0,
                total_cents: 0,
            });

        entry.lesson_count += 1;
        entry.total_minutes += i64::from(lesson.duration_minutes);
        entry.total_cents += lesson_amount_cents(lesson.rate_cents, lesson.duration_minutes);
    }

    let tutors: Vec<TutorEarnings> = buckets.into_values().collect();

    EarningsReport {
        lesson_count: tutors.iter().map(|t| t.lesson_count).sum(),
        total_minutes: tutors.iter().map(|t| t.total_minutes).sum(),
        total_cents: tutors.iter().map(|t| t.total_cents).sum(),
        tutors,
    }
}
