//! Per-role dashboard aggregates.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::point::PointTotals;

/// School-wide counts shown to administrators.
///
/// The monthly figures count events, not points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct AdminDashboardStats {
    pub total_students: u64,
    pub total_classrooms: u64,
    pub violations_this_month: u64,
    pub achievements_this_month: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct TeacherDashboardStats {
    /// Empty when the teacher has no classroom assigned.
    pub classroom_name: String,
    pub student_count: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct StudentDashboardStats {
    pub totals: PointTotals,
}

/// First instant of the calendar month containing `now`, where the month
/// boundary is midnight in `now`'s own time zone.
pub fn month_start<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    let local = now.naive_local();
    NaiveDate::from_ymd_opt(local.year(), local.month(), 1)
        .and_then(|first| first.and_hms_opt(0, 0, 0))
        .and_then(|midnight| now.timezone().from_local_datetime(&midnight).earliest())
        .map(|start| start.with_timezone(&Utc))
        .unwrap_or_else(|| now.with_timezone(&Utc))
}
