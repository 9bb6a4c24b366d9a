use serde::{Deserialize, Serialize};

use super::point::PointTotals;

/// A row of the `siswa` table.
///
/// The two totals are maintained by the ledger only; nothing else writes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Student {
    pub id: String,
    #[serde(rename = "nisn")]
    pub external_identifier: String,
    #[serde(rename = "nama")]
    pub name: String,
    #[serde(rename = "kelas_id")]
    pub classroom_id: String,
    #[serde(rename = "total_poin_pelanggaran", default)]
    pub points_violation_total: u64,
    #[serde(rename = "total_poin_prestasi", default)]
    pub points_achievement_total: u64,
    #[serde(rename = "user_id")]
    pub linked_profile_id: String,
}

impl Student {
    pub fn totals(&self) -> PointTotals {
        PointTotals {
            violation_total: self.points_violation_total,
            achievement_total: self.points_achievement_total,
        }
    }

    /// "Name (NISN)" as shown in student pickers.
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.name, self.external_identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_student_decodes_with_missing_totals() {
        let json = r#"{"id":"s-1","nisn":"0051234","nama":"Andi","kelas_id":"k-1","user_id":"p-9"}"#;
        let student: Student = serde_json::from_str(json).unwrap();
        assert_eq!(student.totals(), PointTotals::default());
        assert_eq!(student.display_name(), "Andi (0051234)");
        assert_eq!(student.linked_profile_id, "p-9");
    }
}
