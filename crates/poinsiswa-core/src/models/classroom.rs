use serde::{Deserialize, Serialize};

/// A row of the `kelas` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Classroom {
    pub id: String,
    #[serde(rename = "nama")]
    pub name: String,
    #[serde(rename = "wali_kelas_id")]
    pub homeroom_teacher_id: String,
}
