use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Whether a point event counts against or for the student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum PointKind {
    #[serde(rename = "pelanggaran")]
    Violation,
    #[serde(rename = "prestasi")]
    Achievement,
}

impl PointKind {
    pub const ALL: [PointKind; 2] = [PointKind::Violation, PointKind::Achievement];

    /// Backend label (`tipe` column value).
    pub fn as_str(&self) -> &'static str {
        match self {
            PointKind::Violation => "pelanggaran",
            PointKind::Achievement => "prestasi",
        }
    }
}

impl fmt::Display for PointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointKind::Violation => write!(f, "Violation"),
            PointKind::Achievement => write!(f, "Achievement"),
        }
    }
}

impl FromStr for PointKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pelanggaran" | "violation" => Ok(PointKind::Violation),
            "prestasi" | "achievement" => Ok(PointKind::Achievement),
            other => Err(LedgerError::Validation(format!(
                "unknown point kind '{}', expected violation or achievement",
                other
            ))),
        }
    }
}

/// A row of the `poin_records` table. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct PointEvent {
    pub id: String,
    #[serde(rename = "siswa_id")]
    pub student_id: String,
    #[serde(rename = "guru_id")]
    pub issued_by_teacher_id: String,
    #[serde(rename = "deskripsi")]
    pub description: String,
    #[serde(rename = "poin")]
    pub points: u32,
    #[serde(rename = "tipe")]
    pub kind: PointKind,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// What a teacher submits. Unvalidated: `points` is signed so that
/// non-positive input reaches validation instead of failing to parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct PointEventDraft {
    pub student_id: String,
    pub description: String,
    pub points: i64,
    pub kind: PointKind,
    /// Client-chosen token; resubmitting with the same token never records twice.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl PointEventDraft {
    pub fn new(student_id: impl Into<String>, kind: PointKind, points: i64, description: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            description: description.into(),
            points,
            kind,
            idempotency_key: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// A validated event ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPointEvent {
    pub student_id: String,
    pub issued_by_teacher_id: String,
    pub description: String,
    pub points: u32,
    pub kind: PointKind,
    pub idempotency_key: String,
}

impl NewPointEvent {
    /// True when `event` records the same submission as `self`.
    pub fn matches(&self, event: &PointEvent) -> bool {
        event.student_id == self.student_id
            && event.issued_by_teacher_id == self.issued_by_teacher_id
            && event.description == self.description
            && event.points == self.points
            && event.kind == self.kind
    }
}

/// Running totals for one student, split by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct PointTotals {
    pub violation_total: u64,
    pub achievement_total: u64,
}

impl PointTotals {
    pub fn get(&self, kind: PointKind) -> u64 {
        match kind {
            PointKind::Violation => self.violation_total,
            PointKind::Achievement => self.achievement_total,
        }
    }

    /// Add a signed delta to one side. `None` if the total would drop below
    /// zero or overflow.
    pub fn checked_apply(&self, kind: PointKind, delta: i64) -> Option<PointTotals> {
        let current = self.get(kind);
        let updated = if delta >= 0 {
            current.checked_add(delta.unsigned_abs())?
        } else {
            current.checked_sub(delta.unsigned_abs())?
        };
        let mut next = *self;
        match kind {
            PointKind::Violation => next.violation_total = updated,
            PointKind::Achievement => next.achievement_total = updated,
        }
        Some(next)
    }

    /// Sum a sequence of events.
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a PointEvent>) -> PointTotals {
        events.into_iter().fold(PointTotals::default(), |mut acc, e| {
            match e.kind {
                PointKind::Violation => acc.violation_total += u64::from(e.points),
                PointKind::Achievement => acc.achievement_total += u64::from(e.points),
            }
            acc
        })
    }
}
