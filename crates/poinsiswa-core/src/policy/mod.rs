//! Access policy gate.
//!
//! `authorize` is a pure decision over the caller's profile, the requested
//! action and the resource it touches. It never performs I/O; the ledger
//! loads the resource first and asks afterwards. Rules are evaluated in
//! order and the first match wins:
//!
//! 1. ADMIN may do anything.
//! 2. TEACHER may record events for, and read, students of their own classroom.
//! 3. STUDENT may read events and totals of the student record linked to them.
//! 4. Everything else is denied.

pub mod routes;

use std::fmt;

use crate::error::LedgerError;
use crate::models::{Profile, Role, Student};

pub use routes::{guard, nav_links, NavLink, Route, RouteDecision};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreatePointEvent,
    ReadStudent,
    ReadPointEvents,
    ReadAggregates,
    /// List a classroom's roster or its dashboard.
    ReadClassroom,
    /// School-wide dashboard counts.
    ReadSchoolStats,
    /// Recompute stored totals from the event log.
    ReconcileTotals,
}

#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    Student(&'a Student),
    Classroom(&'a str),
    School,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Forbidden,
    NotInClassroom,
    NoClassroomAssigned,
    NotOwner,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::Forbidden => write!(f, "forbidden"),
            DenyReason::NotInClassroom => write!(f, "student is not in your classroom"),
            DenyReason::NoClassroomAssigned => write!(f, "no classroom is assigned to your account"),
            DenyReason::NotOwner => write!(f, "these records belong to another student"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Turn a denial into an authorization error.
    pub fn into_result(self) -> Result<(), LedgerError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(LedgerError::forbidden(reason)),
        }
    }
}

pub fn authorize(caller: &Profile, action: Action, resource: Resource<'_>) -> Decision {
    match caller.role {
        Role::Admin => Decision::Allow,
        Role::Teacher => authorize_teacher(caller, action, resource),
        Role::Student => authorize_student(caller, action, resource),
    }
}

fn authorize_teacher(caller: &Profile, action: Action, resource: Resource<'_>) -> Decision {
    let classroom_id = match (action, resource) {
        (
            Action::CreatePointEvent
            | Action::ReadStudent
            | Action::ReadPointEvents
            | Action::ReadAggregates,
            Resource::Student(student),
        ) => student.classroom_id.as_str(),
        (Action::ReadClassroom, Resource::Classroom(id)) => id,
        _ => return Decision::Deny(DenyReason::Forbidden),
    };

    match caller.classroom_id.as_deref() {
        None => Decision::Deny(DenyReason::NoClassroomAssigned),
        Some(own) if own == classroom_id => Decision::Allow,
        Some(_) => Decision::Deny(DenyReason::NotInClassroom),
    }
}

fn authorize_student(caller: &Profile, action: Action, resource: Resource<'_>) -> Decision {
    match (action, resource) {
        (Action::ReadPointEvents | Action::ReadAggregates, Resource::Student(student)) => {
            if student.linked_profile_id == caller.id {
                Decision::Allow
            } else {
                Decision::Deny(DenyReason::NotOwner)
            }
        }
        _ => Decision::Deny(DenyReason::Forbidden),
    }
}
