//! Point event log: validation and append-only writes.

use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use crate::models::{NewPointEvent, PointEvent, PointEventDraft, PointKind, Profile};
use crate::store::{LedgerStore, RecordOutcome, StoreError};

/// Longest accepted description, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 500;

/// Longest accepted idempotency key, in characters.
const MAX_IDEMPOTENCY_KEY_CHARS: usize = 128;

pub struct PointEventLog {
    store: Arc<dyn LedgerStore>,
}

impl PointEventLog {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Check a draft and turn it into a writable event issued by `issuer`.
    ///
    /// Does not authorize; the caller has already consulted the policy gate.
    pub fn validate(issuer: &Profile, draft: &PointEventDraft) -> LedgerResult<NewPointEvent> {
        if !issuer.is_teacher() {
            return Err(LedgerError::Validation(
                "point events can only be issued by a teacher".to_string(),
            ));
        }
        if draft.points <= 0 {
            return Err(LedgerError::Validation(format!(
                "points must be greater than zero (got {})",
                draft.points
            )));
        }
        let points = u32::try_from(draft.points).map_err(|_| {
            LedgerError::Validation(format!("points value {} is too large", draft.points))
        })?;

        let description = draft.description.trim();
        if description.is_empty() {
            return Err(LedgerError::Validation("description is required".to_string()));
        }
        if description.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(LedgerError::Validation(format!(
                "description is longer than {} characters",
                MAX_DESCRIPTION_CHARS
            )));
        }

        let idempotency_key = match draft.idempotency_key.as_deref().map(str::trim) {
            Some("") => {
                return Err(LedgerError::Validation("idempotency key must not be blank".to_string()))
            }
            Some(key) if key.chars().count() > MAX_IDEMPOTENCY_KEY_CHARS => {
                return Err(LedgerError::Validation("idempotency key is too long".to_string()))
            }
            Some(key) => key.to_string(),
            None => Uuid::new_v4().to_string(),
        };

        Ok(NewPointEvent {
            student_id: draft.student_id.clone(),
            issued_by_teacher_id: issuer.id.clone(),
            description: description.to_string(),
            points,
            kind: draft.kind,
            idempotency_key,
        })
    }

    /// Record a validated event together with its total increment.
    pub async fn append(&self, event: &NewPointEvent) -> LedgerResult<RecordOutcome> {
        match self.store.record_point_event(event).await {
            Ok(outcome) => Ok(outcome),
            Err(StoreError::Conflict(detail)) => {
                warn!(key = %event.idempotency_key, detail = %detail, "Idempotency key reused");
                Err(LedgerError::Validation(
                    "this submission key was already used for a different record".to_string(),
                ))
            }
            Err(StoreError::NotFound { entity: "student", id }) => {
                Err(LedgerError::Validation(format!("unknown student {}", id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, event_id: &str) -> LedgerResult<PointEvent> {
        self.store
            .get_event(event_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("point event", event_id))
    }

    /// All events for a student, most recent first.
    pub async fn events_for(&self, student_id: &str) -> LedgerResult<Vec<PointEvent>> {
        let mut events = self.store.list_events_for_student(student_id).await?;
        sort_most_recent_first(&mut events);
        Ok(events)
    }
}

/// Newest first; ties (only possible with legacy data) broken by id.
pub fn sort_most_recent_first(events: &mut [PointEvent]) {
    events.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
}

/// Split events into (violations, achievements), keeping their order.
pub fn split_by_kind(events: &[PointEvent]) -> (Vec<PointEvent>, Vec<PointEvent>) {
    events
        .iter()
        .cloned()
        .partition(|e| e.kind == PointKind::Violation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use chrono::{Duration, Utc};

    fn teacher() -> Profile {
        Profile {
            id: "t-1".to_string(),
            name: "Pak Budi".to_string(),
            role: Role::Teacher,
            classroom_id: Some("k-1".to_string()),
            student_identifier: None,
        }
    }

    fn draft(points: i64, description: &str) -> PointEventDraft {
        PointEventDraft::new("s-1", PointKind::Violation, points, description)
    }

    #[test]
    fn test_validate_accepts_and_trims() {
        let event = PointEventLog::validate(&teacher(), &draft(10, "  Terlambat  ")).unwrap();
        assert_eq!(event.points, 10);
        assert_eq!(event.description, "Terlambat");
        assert_eq!(event.issued_by_teacher_id, "t-1");
        assert!(!event.idempotency_key.is_empty());
    }

    #[test]
    fn test_validate_rejects_non_positive_points() {
        for points in [0, -1, -100] {
            let err = PointEventLog::validate(&teacher(), &draft(points, "x")).unwrap_err();
            assert!(matches!(err, LedgerError::Validation(_)), "points {}", points);
        }
    }

    #[test]
    fn test_validate_rejects_oversized_points() {
        let err = PointEventLog::validate(&teacher(), &draft(i64::from(u32::MAX) + 1, "x")).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn test_validate_rejects_blank_or_long_description() {
        assert!(PointEventLog::validate(&teacher(), &draft(1, "   ")).is_err());
        let long = "a".repeat(MAX_DESCRIPTION_CHARS + 1);
        assert!(PointEventLog::validate(&teacher(), &draft(1, &long)).is_err());
    }

    #[test]
    fn test_validate_requires_teacher_issuer() {
        let mut admin = teacher();
        admin.role = Role::Admin;
        let err = PointEventLog::validate(&admin, &draft(1, "x")).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn test_validate_keeps_client_key() {
        let d = draft(5, "x").with_idempotency_key("form-123");
        let event = PointEventLog::validate(&teacher(), &d).unwrap();
        assert_eq!(event.idempotency_key, "form-123");

        let blank = draft(5, "x").with_idempotency_key(" ");
        assert!(PointEventLog::validate(&teacher(), &blank).is_err());
    }

    #[test]
    fn test_sort_and_split() {
        let now = Utc::now();
        let make = |id: &str, kind, offset: i64| PointEvent {
            id: id.to_string(),
            student_id: "s-1".to_string(),
            issued_by_teacher_id: "t-1".to_string(),
            description: "x".to_string(),
            points: 1,
            kind,
            created_at: now + Duration::seconds(offset),
            idempotency_key: None,
        };
        let mut events = vec![
            make("a", PointKind::Violation, 0),
            make("b", PointKind::Achievement, 20),
            make("c", PointKind::Violation, 10),
        ];
        sort_most_recent_first(&mut events);
        let ids: Vec<_> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);

        let (violations, achievements) = split_by_kind(&events);
        assert_eq!(violations.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), vec!["c", "a"]);
        assert_eq!(achievements.len(), 1);
    }
}
