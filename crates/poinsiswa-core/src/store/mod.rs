//! Storage backends for the ledger.
//!
//! `LedgerStore` is the seam between the ledger service and wherever the
//! four tables live. Two implementations exist:
//!
//! - `MemoryStore`: in-process maps for tests and local runs
//! - `RestStore`: the hosted backend over its REST interface
//!
//! Writes to the event log and to student totals only happen through
//! `record_point_event` and `increment_totals`; both are atomic in every
//! implementation.

pub mod error;
pub mod memory;
pub mod rest;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Classroom, NewPointEvent, PointEvent, PointKind, PointTotals, Profile, Student};

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use rest::RestStore;

/// Result of `record_point_event`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    pub event: PointEvent,
    /// Student totals right after the write (or current totals on replay).
    pub totals: PointTotals,
    /// True when the idempotency key was already recorded and nothing changed.
    pub replayed: bool,
}

/// A student row and all of its events read at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub student: Student,
    pub events: Vec<PointEvent>,
}

/// Storage operations needed by the ledger.
///
/// Implementations must be `Send + Sync` to be shared across tasks.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // ==================== Directory ====================

    async fn get_profile(&self, id: &str) -> StoreResult<Option<Profile>>;

    async fn get_classroom(&self, id: &str) -> StoreResult<Option<Classroom>>;

    async fn get_student(&self, id: &str) -> StoreResult<Option<Student>>;

    /// The student record linked to a STUDENT profile.
    async fn find_student_by_profile(&self, profile_id: &str) -> StoreResult<Option<Student>>;

    async fn list_students_in_classroom(&self, classroom_id: &str) -> StoreResult<Vec<Student>>;

    // ==================== Event log ====================

    async fn get_event(&self, id: &str) -> StoreResult<Option<PointEvent>>;

    async fn list_events_for_student(&self, student_id: &str) -> StoreResult<Vec<PointEvent>>;

    /// Append an event and add its points to the student's matching total
    /// as one unit of work: both happen or neither does.
    ///
    /// If `event.idempotency_key` was recorded before, nothing is written and
    /// the earlier event comes back with `replayed = true`; if the earlier
    /// event differs from `event`, the call fails with `StoreError::Conflict`.
    /// A missing student yields `StoreError::NotFound`.
    async fn record_point_event(&self, event: &NewPointEvent) -> StoreResult<RecordOutcome>;

    // ==================== Aggregates ====================

    /// Atomically add `delta` to one total (`total = total + delta`, never a
    /// read-modify-write from the caller). Rejects results below zero.
    async fn increment_totals(&self, student_id: &str, kind: PointKind, delta: i64) -> StoreResult<PointTotals>;

    async fn student_ledger_snapshot(&self, student_id: &str) -> StoreResult<LedgerSnapshot>;

    // ==================== Counts ====================

    async fn count_students(&self) -> StoreResult<u64>;

    async fn count_classrooms(&self) -> StoreResult<u64>;

    async fn count_students_in_classroom(&self, classroom_id: &str) -> StoreResult<u64>;

    /// Events of `kind` created at or after `since`.
    async fn count_events_since(&self, kind: PointKind, since: DateTime<Utc>) -> StoreResult<u64>;
}
