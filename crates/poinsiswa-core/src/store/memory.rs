//! In-memory store implementation.
//!
//! All tables live in `HashMap`s and a `Vec` behind one lock, which makes
//! every trait method a single critical section. That is what gives
//! `record_point_event` and `increment_totals` their atomicity here.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::{LedgerSnapshot, LedgerStore, RecordOutcome, StoreError, StoreResult};
use crate::models::{Classroom, NewPointEvent, PointEvent, PointKind, PointTotals, Profile, Student};

/// In-memory ledger store.
///
/// Cloning shares the same underlying data.
#[derive(Clone)]
pub struct MemoryStore {
    data: Arc<RwLock<MemoryData>>,
}

struct MemoryData {
    profiles: HashMap<String, Profile>,
    classrooms: HashMap<String, Classroom>,
    students: HashMap<String, Student>,
    events: Vec<PointEvent>,
    // idempotency key -> index into `events`
    event_keys: HashMap<String, usize>,
    last_timestamp: Option<DateTime<Utc>>,
    is_healthy: bool,
}

impl Default for MemoryData {
    fn default() -> Self {
        Self {
            profiles: HashMap::new(),
            classrooms: HashMap::new(),
            students: HashMap::new(),
            events: Vec::new(),
            event_keys: HashMap::new(),
            last_timestamp: None,
            is_healthy: true,
        }
    }
}

impl MemoryData {
    /// Server clock that never repeats a value.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let ts = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(ts);
        ts
    }

    fn student_mut(&mut self, id: &str) -> StoreResult<&mut Student> {
        self.students
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("student", id))
    }
}

fn store_totals(student: &mut Student, totals: PointTotals) {
    student.points_violation_total = totals.violation_total;
    student.points_achievement_total = totals.achievement_total;
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(MemoryData::default())),
        }
    }

    // Nothing panics while holding the lock, so a poisoned lock still holds
    // consistent data.
    fn read(&self) -> StoreResult<RwLockReadGuard<'_, MemoryData>> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        if !data.is_healthy {
            return Err(StoreError::Unavailable("memory store marked unhealthy".to_string()));
        }
        Ok(data)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, MemoryData>> {
        let data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        if !data.is_healthy {
            return Err(StoreError::Unavailable("memory store marked unhealthy".to_string()));
        }
        Ok(data)
    }

    fn seed(&self) -> RwLockWriteGuard<'_, MemoryData> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ===== Seeding =====

    pub fn insert_profile(&self, profile: Profile) {
        self.seed().profiles.insert(profile.id.clone(), profile);
    }

    pub fn insert_classroom(&self, classroom: Classroom) {
        self.seed().classrooms.insert(classroom.id.clone(), classroom);
    }

    pub fn insert_student(&self, student: Student) {
        self.seed().students.insert(student.id.clone(), student);
    }

    /// Append an event without touching the student's totals, the way a
    /// failed second write used to leave the data.
    pub fn insert_legacy_event(&self, event: PointEvent) {
        let mut data = self.seed();
        if let Some(key) = event.idempotency_key.clone() {
            let index = data.events.len();
            data.event_keys.insert(key, index);
        }
        data.events.push(event);
    }

    /// Simulate the backend going away (`false`) or coming back (`true`).
    pub fn set_healthy(&self, healthy: bool) {
        self.seed().is_healthy = healthy;
    }

    pub fn event_count(&self) -> usize {
        self.seed().events.len()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn get_profile(&self, id: &str) -> StoreResult<Option<Profile>> {
        Ok(self.read()?.profiles.get(id).cloned())
    }

    async fn get_classroom(&self, id: &str) -> StoreResult<Option<Classroom>> {
        Ok(self.read()?.classrooms.get(id).cloned())
    }

    async fn get_student(&self, id: &str) -> StoreResult<Option<Student>> {
        Ok(self.read()?.students.get(id).cloned())
    }

    async fn find_student_by_profile(&self, profile_id: &str) -> StoreResult<Option<Student>> {
        Ok(self
            .read()?
            .students
            .values()
            .find(|s| s.linked_profile_id == profile_id)
            .cloned())
    }

    async fn list_students_in_classroom(&self, classroom_id: &str) -> StoreResult<Vec<Student>> {
        let data = self.read()?;
        let mut students: Vec<Student> = data
            .students
            .values()
            .filter(|s| s.classroom_id == classroom_id)
            .cloned()
            .collect();
        students.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(students)
    }

    async fn get_event(&self, id: &str) -> StoreResult<Option<PointEvent>> {
        Ok(self.read()?.events.iter().find(|e| e.id == id).cloned())
    }

    async fn list_events_for_student(&self, student_id: &str) -> StoreResult<Vec<PointEvent>> {
        Ok(self
            .read()?
            .events
            .iter()
            .filter(|e| e.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn record_point_event(&self, new: &NewPointEvent) -> StoreResult<RecordOutcome> {
        let mut data = self.write()?;

        if let Some(&index) = data.event_keys.get(&new.idempotency_key) {
            let existing = data.events[index].clone();
            if !new.matches(&existing) {
                return Err(StoreError::Conflict(format!(
                    "idempotency key {} already used for event {}",
                    new.idempotency_key, existing.id
                )));
            }
            let totals = data.student_mut(&existing.student_id)?.totals();
            return Ok(RecordOutcome {
                event: existing,
                totals,
                replayed: true,
            });
        }

        // Compute everything that can fail before mutating anything.
        let current = data.student_mut(&new.student_id)?.totals();
        let totals = current
            .checked_apply(new.kind, i64::from(new.points))
            .ok_or_else(|| StoreError::Rejected("point total overflow".to_string()))?;

        let event = PointEvent {
            id: Uuid::new_v4().to_string(),
            student_id: new.student_id.clone(),
            issued_by_teacher_id: new.issued_by_teacher_id.clone(),
            description: new.description.clone(),
            points: new.points,
            kind: new.kind,
            created_at: data.next_timestamp(),
            idempotency_key: Some(new.idempotency_key.clone()),
        };

        store_totals(data.student_mut(&new.student_id)?, totals);
        let index = data.events.len();
        data.events.push(event.clone());
        data.event_keys.insert(new.idempotency_key.clone(), index);

        Ok(RecordOutcome {
            event,
            totals,
            replayed: false,
        })
    }

    async fn increment_totals(&self, student_id: &str, kind: PointKind, delta: i64) -> StoreResult<PointTotals> {
        let mut data = self.write()?;
        let student = data.student_mut(student_id)?;
        let totals = student
            .totals()
            .checked_apply(kind, delta)
            .ok_or_else(|| StoreError::Rejected(format!("{} total would become negative", kind)))?;
        store_totals(student, totals);
        Ok(totals)
    }

    async fn student_ledger_snapshot(&self, student_id: &str) -> StoreResult<LedgerSnapshot> {
        let data = self.read()?;
        let student = data
            .students
            .get(student_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("student", student_id))?;
        let events = data
            .events
            .iter()
            .filter(|e| e.student_id == student_id)
            .cloned()
            .collect();
        Ok(LedgerSnapshot { student, events })
    }

    async fn count_students(&self) -> StoreResult<u64> {
        Ok(self.read()?.students.len() as u64)
    }

    async fn count_classrooms(&self) -> StoreResult<u64> {
        Ok(self.read()?.classrooms.len() as u64)
    }

    async fn count_students_in_classroom(&self, classroom_id: &str) -> StoreResult<u64> {
        Ok(self
            .read()?
            .students
            .values()
            .filter(|s| s.classroom_id == classroom_id)
            .count() as u64)
    }

    async fn count_events_since(&self, kind: PointKind, since: DateTime<Utc>) -> StoreResult<u64> {
        Ok(self
            .read()?
            .events
            .iter()
            .filter(|e| e.kind == kind && e.created_at >= since)
            .count() as u64)
    }
}
