//! Data models for the point ledger.
//!
//! Rows mirror the hosted backend's tables (`profiles`, `kelas`, `siswa`,
//! `poin_records`) and keep the backend column names on the wire through
//! `serde` renames, so the same types decode REST responses and feed the
//! in-memory store.
//!
//! - `Profile`, `Role`: identity-to-role-to-classroom association
//! - `Classroom`: a named class under a homeroom teacher
//! - `Student`: an enrolled student with stored running totals
//! - `PointEvent`, `PointEventDraft`, `NewPointEvent`, `PointKind`, `PointTotals`
//! - Dashboard aggregates per role

pub mod classroom;
pub mod dashboard;
pub mod point;
pub mod profile;
pub mod student;

pub use classroom::Classroom;
pub use dashboard::{month_start, AdminDashboardStats, StudentDashboardStats, TeacherDashboardStats};
pub use point::{NewPointEvent, PointEvent, PointEventDraft, PointKind, PointTotals};
pub use profile::{Profile, Role};
pub use student::Student;
