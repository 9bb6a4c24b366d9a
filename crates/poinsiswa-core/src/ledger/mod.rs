//! The point ledger service.
//!
//! `PointLedger` is the only entry point for reading and writing points.
//! Every operation takes the caller's profile explicitly, consults the
//! policy gate, and only then touches storage.

pub mod aggregate;
mod dashboard;
pub mod log;

use std::sync::Arc;

use tracing::{info, warn};

use crate::advice::{Advice, AdviceService};
use crate::error::{LedgerError, LedgerResult};
use crate::models::{PointEvent, PointEventDraft, PointTotals, Profile, Student};
use crate::policy::{authorize, Action, Resource};
use crate::store::LedgerStore;

pub use aggregate::{AggregateMaintainer, Reconciliation};
pub use log::{sort_most_recent_first, split_by_kind, PointEventLog};

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedEvent {
    pub event: PointEvent,
    /// The student's totals as stored once the write finished. On a replay
    /// these are the current totals, which may include later events.
    pub totals: PointTotals,
    /// The student as loaded before the write.
    pub student: Student,
    /// True when the submission key had already been recorded.
    pub replayed: bool,
}

/// A student's events split by kind, each list most recent first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventsByKind {
    pub violations: Vec<PointEvent>,
    pub achievements: Vec<PointEvent>,
}

pub struct PointLedger {
    store: Arc<dyn LedgerStore>,
    log: PointEventLog,
    aggregates: AggregateMaintainer,
}

impl PointLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            log: PointEventLog::new(store.clone()),
            aggregates: AggregateMaintainer::new(store.clone()),
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    async fn load_student(&self, student_id: &str) -> LedgerResult<Student> {
        self.store
            .get_student(student_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("student", student_id))
    }

    fn check(caller: &Profile, action: Action, resource: Resource<'_>) -> LedgerResult<()> {
        authorize(caller, action, resource).into_result().map_err(|e| {
            warn!(caller = %caller.id, role = %caller.role, ?action, error = %e, "Access denied");
            e
        })
    }

    /// Record a violation or achievement for a student.
    ///
    /// The event and the matching total change commit together. Resubmitting
    /// with the same idempotency key returns the first event unchanged.
    pub async fn submit_point_event(&self, caller: &Profile, draft: PointEventDraft) -> LedgerResult<SubmittedEvent> {
        let student = self
            .store
            .get_student(&draft.student_id)
            .await?
            .ok_or_else(|| LedgerError::Validation(format!("unknown student {}", draft.student_id)))?;

        Self::check(caller, Action::CreatePointEvent, Resource::Student(&student))?;

        let new_event = PointEventLog::validate(caller, &draft)?;
        let outcome = self.log.append(&new_event).await?;

        if outcome.replayed {
            info!(
                event_id = %outcome.event.id,
                key = %new_event.idempotency_key,
                "Duplicate submission, returning recorded event"
            );
        } else {
            info!(
                event_id = %outcome.event.id,
                student_id = %student.id,
                teacher_id = %caller.id,
                kind = %outcome.event.kind,
                points = outcome.event.points,
                "Point event recorded"
            );
        }

        Ok(SubmittedEvent {
            event: outcome.event,
            totals: outcome.totals,
            student,
            replayed: outcome.replayed,
        })
    }

    /// A student's events, most recent first.
    pub async fn list_events_for_student(&self, caller: &Profile, student_id: &str) -> LedgerResult<Vec<PointEvent>> {
        let student = self.load_student(student_id).await?;
        Self::check(caller, Action::ReadPointEvents, Resource::Student(&student))?;
        self.log.events_for(student_id).await
    }

    pub async fn events_by_kind(&self, caller: &Profile, student_id: &str) -> LedgerResult<EventsByKind> {
        let events = self.list_events_for_student(caller, student_id).await?;
        let (violations, achievements) = split_by_kind(&events);
        Ok(EventsByKind {
            violations,
            achievements,
        })
    }

    pub async fn get_aggregates(&self, caller: &Profile, student_id: &str) -> LedgerResult<PointTotals> {
        let student = self.load_student(student_id).await?;
        Self::check(caller, Action::ReadAggregates, Resource::Student(&student))?;
        Ok(student.totals())
    }

    pub async fn get_student(&self, caller: &Profile, student_id: &str) -> LedgerResult<Student> {
        let student = self.load_student(student_id).await?;
        Self::check(caller, Action::ReadStudent, Resource::Student(&student))?;
        Ok(student)
    }

    /// The student record linked to a STUDENT caller.
    pub async fn my_student(&self, caller: &Profile) -> LedgerResult<Student> {
        let student = self
            .store
            .find_student_by_profile(&caller.id)
            .await?
            .ok_or_else(|| LedgerError::not_found("student", &caller.id))?;
        Self::check(caller, Action::ReadAggregates, Resource::Student(&student))?;
        Ok(student)
    }

    /// Students of a classroom, sorted by name.
    pub async fn list_students(&self, caller: &Profile, classroom_id: &str) -> LedgerResult<Vec<Student>> {
        Self::check(caller, Action::ReadClassroom, Resource::Classroom(classroom_id))?;
        Ok(self.store.list_students_in_classroom(classroom_id).await?)
    }

    /// Follow-up advice for a recorded event.
    ///
    /// Anyone who may read the event may ask. Advice failures come back as
    /// a degraded `Advice`, never as an error.
    pub async fn request_advice(&self, caller: &Profile, event_id: &str, advisor: &AdviceService) -> LedgerResult<Advice> {
        let event = self.log.get(event_id).await?;
        let student = self.load_student(&event.student_id).await?;
        Self::check(caller, Action::ReadPointEvents, Resource::Student(&student))?;
        Ok(advisor.advise(&event, &student).await)
    }

    /// Follow-up advice for an event this caller just submitted.
    ///
    /// Works from the submission alone and never touches storage, so a
    /// committed write is never followed by a failing read.
    pub async fn advice_for_submission(&self, submitted: &SubmittedEvent, advisor: &AdviceService) -> Advice {
        advisor.advise(&submitted.event, &submitted.student).await
    }

    /// Recompute a student's totals from the event log and repair drift.
    pub async fn reconcile_totals(&self, caller: &Profile, student_id: &str) -> LedgerResult<Reconciliation> {
        let student = self.load_student(student_id).await?;
        Self::check(caller, Action::ReconcileTotals, Resource::Student(&student))?;
        let report = self.aggregates.reconcile(student_id).await?;
        info!(
            student_id = %student_id,
            consistent = report.was_consistent(),
            "Reconciliation finished"
        );
        Ok(report)
    }
}
