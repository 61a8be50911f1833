/// Earnings (payroll) endpoint
///
/// `GET /v1/earnings?from=&to=&tutor_id=&group_by=tutor|month`
///
/// Owners and admins see every tutor of their organization and may filter
/// by `tutor_id`. Tutors only see their own earnings. `from` is inclusive,
/// `to` exclusive, both RFC 3339.
use crate::app::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tutorhub_shared::auth::{Capability, SessionContext};
use tutorhub_shared::earnings::{aggregate, EarningsReport, GroupBy};
use tutorhub_shared::models::lesson::{EarningsPolicy, Lesson, LessonFilter};
use uuid::Uuid;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EarningsQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub tutor_id: Option<Uuid>,

    #[serde(default)]
    pub group_by: GroupBy,
}

/// Decides which tutor the report covers
///
/// Returns `None` for all tutors.
pub fn resolve_tutor_scope(session: &SessionContext, requested: Option<Uuid>) -> Result<Option<Uuid>, ApiError> {
    if session.can(Capability::ViewAllEarnings) {
        return Ok(requested);
    }

    session.require(Capability::ViewOwnEarnings)?;
    match requested {
        Some(tutor_id) if tutor_id != session.user_id => Err(ApiError::Forbidden(
            "Tutors can only view their own earnings".to_string(),
        )),
        _ => Ok(Some(session.user_id)),
    }
}

/// Aggregates earnings for the caller's organization
///
/// # Errors
///
/// - 400 Bad Request: `from` after `to`
/// - 403 Forbidden: missing capability, or a tutor asking for someone else
pub async fn get_earnings(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Query(query): Query<EarningsQuery>,
) -> ApiResult<Json<EarningsReport>> {
    let tutor_id = resolve_tutor_scope(&session, query.tutor_id)?;

    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return Err(ApiError::BadRequest("from must not be after to".to_string()));
        }
    }

    let filter = LessonFilter {
        from: query.from,
        to: query.to,
        tutor_id,
    };

    let policy = EarningsPolicy::for_organization(&state.db, session.organization_id).await?;
    let lessons = Lesson::list_for_earnings(&state.db, session.organization_id, &filter).await?;
    let report = aggregate(&lessons, policy, query.group_by);

    tracing::debug!(
        organization_id = %session.organization_id,
        lessons = lessons.len(),
        tutors = report.tutors.len(),
        total_cents = report.total_cents,
        "Aggregated earnings"
    );

    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutorhub_shared::auth::Role;

    fn session(role: Role) -> SessionContext {
        SessionContext::new(Uuid::new_v4(), Uuid::new_v4(), role)
    }

    #[test]
    fn test_admin_sees_requested_scope() {
        let admin = session(Role::Admin);
        let tutor = Uuid::new_v4();
        assert_eq!(resolve_tutor_scope(&admin, None).unwrap(), None);
        assert_eq!(resolve_tutor_scope(&admin, Some(tutor)).unwrap(), Some(tutor));
    }

    #[test]
    fn test_tutor_scoped_to_self() {
        let tutor = session(Role::Tutor);
        assert_eq!(resolve_tutor_scope(&tutor, None).unwrap(), Some(tutor.user_id));
        assert_eq!(
            resolve_tutor_scope(&tutor, Some(tutor.user_id)).unwrap(),
            Some(tutor.user_id)
        );
        assert!(matches!(
            resolve_tutor_scope(&tutor, Some(Uuid::new_v4())),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn test_students_and_parents_rejected() {
        assert!(matches!(resolve_tutor_scope(&session(Role::Student), None), Err(ApiError::Forbidden(_))));
        assert!(matches!(resolve_tutor_scope(&session(Role::Parent), None), Err(ApiError::Forbidden(_))));
    }

    #[test]
    fn test_query_parsing() {
        let query: EarningsQuery =
            serde_json::from_str(r#"{"from": "2025-01-01T00:00:00Z", "group_by": "month"}"#).unwrap();
        assert_eq!(query.group_by, GroupBy::Month);
        assert!(query.to.is_none());

        let query: EarningsQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.group_by, GroupBy::Tutor);
    }
}
