//! Store backed by the hosted backend's REST interface.
//!
//! Reads go straight to the tables. The two writes call stored functions
//! (see `sql/ledger_functions.sql`) so that the event insert and the total
//! increment run inside one database transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{LedgerSnapshot, LedgerStore, RecordOutcome, StoreError, StoreResult};
use crate::api::query::{eq, gte_time, order_desc, select};
use crate::api::{ApiError, BackendClient};
use crate::models::{Classroom, NewPointEvent, PointEvent, PointKind, PointTotals, Profile, Student};

const PROFILES: &str = "profiles";
const CLASSROOMS: &str = "kelas";
const STUDENTS: &str = "siswa";
const EVENTS: &str = "poin_records";

const RECORD_FUNCTION: &str = "record_point_event";
const INCREMENT_FUNCTION: &str = "increment_student_totals";

// Markers raised by the stored functions.
const STUDENT_NOT_FOUND: &str = "student_not_found";
const IDEMPOTENCY_CONFLICT: &str = "idempotency_conflict";
const NEGATIVE_TOTAL: &str = "negative_total";

#[derive(Debug, Serialize)]
struct RecordArgs<'a> {
    p_siswa_id: &'a str,
    p_guru_id: &'a str,
    p_deskripsi: &'a str,
    p_poin: u32,
    p_tipe: PointKind,
    p_idempotency_key: &'a str,
}

#[derive(Debug, Deserialize)]
struct RecordResponse {
    record: PointEvent,
    #[serde(flatten)]
    totals: TotalsRow,
    #[serde(default)]
    replayed: bool,
}

#[derive(Debug, Serialize)]
struct IncrementArgs<'a> {
    p_siswa_id: &'a str,
    p_tipe: PointKind,
    p_delta: i64,
}

#[derive(Debug, Deserialize)]
struct TotalsRow {
    total_poin_pelanggaran: u64,
    total_poin_prestasi: u64,
}

impl From<TotalsRow> for PointTotals {
    fn from(row: TotalsRow) -> Self {
        PointTotals {
            violation_total: row.total_poin_pelanggaran,
            achievement_total: row.total_poin_prestasi,
        }
    }
}

/// `siswa` row with its events embedded by PostgREST in the same query.
#[derive(Debug, Deserialize)]
struct StudentWithEvents {
    #[serde(flatten)]
    student: Student,
    #[serde(rename = "poin_records", default)]
    events: Vec<PointEvent>,
}

/// Translate a client error into a store error. `student_id` names the
/// student the request was about, for not-found reporting.
fn map_api_error(err: ApiError, student_id: Option<&str>) -> StoreError {
    if err.is_transient() {
        return StoreError::Unavailable(err.to_string());
    }
    if let Some(body) = err.body() {
        if body.contains(STUDENT_NOT_FOUND) {
            return StoreError::not_found("student", student_id.unwrap_or_default());
        }
        if body.contains(IDEMPOTENCY_CONFLICT) {
            return StoreError::Conflict(body.to_string());
        }
        if body.contains(NEGATIVE_TOTAL) {
            return StoreError::Rejected(body.to_string());
        }
    }
    match err {
        ApiError::Unauthorized => StoreError::Unauthorized,
        ApiError::AccessDenied(body) => StoreError::Forbidden(body),
        ApiError::Conflict(body) => StoreError::Conflict(body),
        ApiError::InvalidResponse(msg) => StoreError::Decode(msg),
        ApiError::NetworkError(e) if e.is_decode() => StoreError::Decode(e.to_string()),
        ApiError::NetworkError(e) => StoreError::Unavailable(e.to_string()),
        other => StoreError::Rejected(other.to_string()),
    }
}

pub(crate) fn map_err(err: ApiError) -> StoreError {
    map_api_error(err, None)
}

pub struct RestStore {
    client: BackendClient,
}

impl RestStore {
    /// `client` should carry the signed-in user's token so row-level rules apply.
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LedgerStore for RestStore {
    async fn get_profile(&self, id: &str) -> StoreResult<Option<Profile>> {
        self.client
            .select_one(PROFILES, &[select("*"), eq("id", id)])
            .await
            .map_err(map_err)
    }

    async fn get_classroom(&self, id: &str) -> StoreResult<Option<Classroom>> {
        self.client
            .select_one(CLASSROOMS, &[select("*"), eq("id", id)])
            .await
            .map_err(map_err)
    }

    async fn get_student(&self, id: &str) -> StoreResult<Option<Student>> {
        self.client
            .select_one(STUDENTS, &[select("*"), eq("id", id)])
            .await
            .map_err(map_err)
    }

    async fn find_student_by_profile(&self, profile_id: &str) -> StoreResult<Option<Student>> {
        self.client
            .select_one(STUDENTS, &[select("*"), eq("user_id", profile_id)])
            .await
            .map_err(map_err)
    }

    async fn list_students_in_classroom(&self, classroom_id: &str) -> StoreResult<Vec<Student>> {
        self.client
            .select(
                STUDENTS,
                &[select("*"), eq("kelas_id", classroom_id), ("order".to_string(), "nama.asc".to_string())],
            )
            .await
            .map_err(map_err)
    }

    async fn get_event(&self, id: &str) -> StoreResult<Option<PointEvent>> {
        self.client
            .select_one(EVENTS, &[select("*"), eq("id", id)])
            .await
            .map_err(map_err)
    }

    async fn list_events_for_student(&self, student_id: &str) -> StoreResult<Vec<PointEvent>> {
        self.client
            .select(
                EVENTS,
                &[select("*"), eq("siswa_id", student_id), order_desc("created_at")],
            )
            .await
            .map_err(map_err)
    }

    async fn record_point_event(&self, event: &NewPointEvent) -> StoreResult<RecordOutcome> {
        let args = RecordArgs {
            p_siswa_id: &event.student_id,
            p_guru_id: &event.issued_by_teacher_id,
            p_deskripsi: &event.description,
            p_poin: event.points,
            p_tipe: event.kind,
            p_idempotency_key: &event.idempotency_key,
        };
        let response: RecordResponse = self
            .client
            .rpc(RECORD_FUNCTION, &args)
            .await
            .map_err(|e| map_api_error(e, Some(&event.student_id)))?;

        debug!(
            event_id = %response.record.id,
            replayed = response.replayed,
            "Recorded point event via stored function"
        );

        Ok(RecordOutcome {
            event: response.record,
            totals: response.totals.into(),
            replayed: response.replayed,
        })
    }

    async fn increment_totals(&self, student_id: &str, kind: PointKind, delta: i64) -> StoreResult<PointTotals> {
        let args = IncrementArgs {
            p_siswa_id: student_id,
            p_tipe: kind,
            p_delta: delta,
        };
        let row: TotalsRow = self
            .client
            .rpc(INCREMENT_FUNCTION, &args)
            .await
            .map_err(|e| map_api_error(e, Some(student_id)))?;
        Ok(row.into())
    }

    async fn student_ledger_snapshot(&self, student_id: &str) -> StoreResult<LedgerSnapshot> {
        let row: Option<StudentWithEvents> = self
            .client
            .select_one(STUDENTS, &[select("*,poin_records(*)"), eq("id", student_id)])
            .await
            .map_err(map_err)?;
        let row = row.ok_or_else(|| StoreError::not_found("student", student_id))?;
        Ok(LedgerSnapshot {
            student: row.student,
            events: row.events,
        })
    }

    async fn count_students(&self) -> StoreResult<u64> {
        self.client.count(STUDENTS, &[]).await.map_err(map_err)
    }

    async fn count_classrooms(&self) -> StoreResult<u64> {
        self.client.count(CLASSROOMS, &[]).await.map_err(map_err)
    }

    async fn count_students_in_classroom(&self, classroom_id: &str) -> StoreResult<u64> {
        self.client
            .count(STUDENTS, &[eq("kelas_id", classroom_id)])
            .await
            .map_err(map_err)
    }

    async fn count_events_since(&self, kind: PointKind, since: DateTime<Utc>) -> StoreResult<u64> {
        self.client
            .count(EVENTS, &[eq("tipe", kind.as_str()), gte_time("created_at", since)])
            .await
            .map_err(map_err)
    }
}
