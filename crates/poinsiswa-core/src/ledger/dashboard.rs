//! Per-role dashboard figures.

use chrono::{DateTime, FixedOffset};
use tracing::{debug, warn};

use super::PointLedger;
use crate::error::{LedgerError, LedgerResult};
use crate::models::{
    month_start, AdminDashboardStats, PointKind, PointTotals, Profile, StudentDashboardStats,
    TeacherDashboardStats,
};
use crate::policy::{Action, DenyReason, Resource};

impl PointLedger {
    /// School-wide counts. Monthly figures count events created since
    /// midnight on the first of `now`'s month, read in `now`'s offset, which
    /// should be the school's.
    pub async fn admin_dashboard(
        &self,
        caller: &Profile,
        now: DateTime<FixedOffset>,
    ) -> LedgerResult<AdminDashboardStats> {
        Self::check(caller, Action::ReadSchoolStats, Resource::School)?;

        let since = month_start(&now);
        let store = self.store();
        let (total_students, total_classrooms, violations_this_month, achievements_this_month) = futures::try_join!(
            store.count_students(),
            store.count_classrooms(),
            store.count_events_since(PointKind::Violation, since),
            store.count_events_since(PointKind::Achievement, since),
        )?;

        Ok(AdminDashboardStats {
            total_students,
            total_classrooms,
            violations_this_month,
            achievements_this_month,
        })
    }

    /// The caller's homeroom and its size. A teacher with no classroom gets
    /// empty figures rather than an error.
    pub async fn teacher_dashboard(&self, caller: &Profile) -> LedgerResult<TeacherDashboardStats> {
        if !caller.is_teacher() {
            return Err(LedgerError::forbidden(DenyReason::Forbidden));
        }
        let Some(classroom_id) = caller.classroom_id.as_deref() else {
            debug!(teacher_id = %caller.id, "Teacher has no classroom assigned");
            return Ok(TeacherDashboardStats::default());
        };
        Self::check(caller, Action::ReadClassroom, Resource::Classroom(classroom_id))?;

        let store = self.store();
        let (classroom, student_count) = futures::try_join!(
            store.get_classroom(classroom_id),
            store.count_students_in_classroom(classroom_id),
        )?;

        let classroom_name = match classroom {
            Some(c) => c.name,
            None => {
                warn!(teacher_id = %caller.id, classroom_id = %classroom_id, "Assigned classroom does not exist");
                String::new()
            }
        };

        Ok(TeacherDashboardStats {
            classroom_name,
            student_count,
        })
    }

    /// The caller's own totals. A student account with no linked student
    /// record sees zeros.
    pub async fn student_dashboard(&self, caller: &Profile) -> LedgerResult<StudentDashboardStats> {
        if !caller.is_student() {
            return Err(LedgerError::forbidden(DenyReason::Forbidden));
        }
        match self.store().find_student_by_profile(&caller.id).await? {
            Some(student) => {
                Self::check(caller, Action::ReadAggregates, Resource::Student(&student))?;
                Ok(StudentDashboardStats {
                    totals: student.totals(),
                })
            }
            None => {
                warn!(profile_id = %caller.id, "No student record linked to this profile");
                Ok(StudentDashboardStats {
                    totals: PointTotals::default(),
                })
            }
        }
    }
}
