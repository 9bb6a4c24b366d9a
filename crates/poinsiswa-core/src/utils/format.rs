use chrono::{DateTime, Datelike, Utc};

use crate::models::PointTotals;

const MONTHS_ID: [&str; 12] = [
    "Januari",
    "Februari",
    "Maret",
    "April",
    "Mei",
    "Juni",
    "Juli",
    "Agustus",
    "September",
    "Oktober",
    "November",
    "Desember",
];

/// Long Indonesian date, e.g. "5 Maret 2025"
pub fn format_date(date: DateTime<Utc>) -> String {
    let month = MONTHS_ID[date.month0() as usize];
    format!("{} {} {}", date.day(), month, date.year())
}

/// Date plus time of day, e.g. "5 Maret 2025 14:07"
pub fn format_timestamp(date: DateTime<Utc>) -> String {
    format!("{} {}", format_date(date), date.format("%H:%M"))
}

/// Truncate a string to a maximum length in characters, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format an optional string, returning a default if None
pub fn format_optional(value: Option<&str>, default: &str) -> String {
    value.unwrap_or(default).to_string()
}

pub fn format_totals(totals: &PointTotals) -> String {
    format!(
        "Pelanggaran: {} poin | Prestasi: {} poin",
        totals.violation_total, totals.achievement_total
    )
}
