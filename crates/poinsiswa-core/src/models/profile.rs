use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Caller role. Wire values are the backend's enum labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum Role {
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "guru")]
    Teacher,
    #[serde(rename = "siswa")]
    Student,
}

impl Role {
    /// Label used by the backend and accepted on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "guru",
            Role::Student => "siswa",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "Admin"),
            Role::Teacher => write!(f, "Teacher"),
            Role::Student => write!(f, "Student"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "guru" | "teacher" => Ok(Role::Teacher),
            "siswa" | "student" => Ok(Role::Student),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// A row of the `profiles` table.
///
/// Owned by the identity system. `classroom_id` is set for teachers (their
/// homeroom) and `student_identifier` for students.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Profile {
    pub id: String,
    #[serde(rename = "nama")]
    pub name: String,
    pub role: Role,
    #[serde(rename = "kelas_id", default)]
    pub classroom_id: Option<String>,
    #[serde(rename = "nisn", default)]
    pub student_identifier: Option<String>,
}

impl Profile {
    pub fn is_teacher(&self) -> bool {
        self.role == Role::Teacher
    }

    pub fn is_student(&self) -> bool {
        self.role == Role::Student
    }

    pub fn display_name(&self) -> String {
        format!("{} ({})", self.name, self.role)
    }
}
